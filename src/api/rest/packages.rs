use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::rest::run_blocking;
use crate::api::rest::session::CurrentUser;
use crate::engine::filter::{self, Category, PackageQuery, SortOrder};
use crate::engine::route::current_point;
use crate::error::AppError;
use crate::models::location::GeoPoint;
use crate::models::package::{Package, PackageStatus};
use crate::registry::packages::{self, NewPackage};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/packages", post(create_package).get(list_packages))
        .route("/packages/:id", get(get_package).delete(delete_package))
        .route("/packages/:id/status", patch(update_status))
        .route("/packages/:id/cancel", post(cancel_package))
        .route("/tracking/:code", get(track))
}

#[derive(Deserialize)]
pub struct CreatePackageRequest {
    pub recipient_name: String,
    pub recipient_phone: String,
    pub address: String,
    pub location: GeoPoint,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: PackageStatus,
}

#[derive(Debug, Clone, Copy, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CategoryParam {
    #[default]
    All,
    Active,
    Delivered,
    Cancelled,
    DateRange,
}

#[derive(Deserialize, Default)]
pub struct ListQuery {
    pub search: Option<String>,
    #[serde(default)]
    pub category: CategoryParam,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    #[serde(default)]
    pub sort: SortOrder,
}

/// What anyone holding a tracking code may see.
#[derive(Serialize)]
pub struct TrackingView {
    pub tracking_code: String,
    pub status: PackageStatus,
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub delivery_date: DateTime<Utc>,
    pub cancelled: bool,
    pub current_location: Option<String>,
}

impl ListQuery {
    fn into_package_query(self) -> Result<PackageQuery, AppError> {
        let category = match self.category {
            CategoryParam::All => Category::All,
            CategoryParam::Active => Category::Active,
            CategoryParam::Delivered => Category::Delivered,
            CategoryParam::Cancelled => Category::Cancelled,
            CategoryParam::DateRange => {
                let (Some(start), Some(end)) = (self.start, self.end) else {
                    return Err(AppError::Validation(
                        "date_range needs both start and end".to_string(),
                    ));
                };
                if start > end {
                    return Err(AppError::Validation(format!(
                        "start {start} is after end {end}"
                    )));
                }
                Category::DateRange {
                    start: day_bound(start, 0, 0, 0, 0)?,
                    end: day_bound(end, 23, 59, 59, 999_999_999)?,
                }
            }
        };

        Ok(PackageQuery {
            search: self.search,
            category,
            sort: self.sort,
        })
    }
}

fn day_bound(
    date: NaiveDate,
    hour: u32,
    min: u32,
    sec: u32,
    nano: u32,
) -> Result<DateTime<Utc>, AppError> {
    date.and_hms_nano_opt(hour, min, sec, nano)
        .map(|naive| naive.and_utc())
        .ok_or_else(|| AppError::Internal(format!("invalid time on {date}")))
}

async fn create_package(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(payload): Json<CreatePackageRequest>,
) -> Result<(StatusCode, Json<Package>), AppError> {
    let input = NewPackage {
        recipient_name: payload.recipient_name,
        recipient_phone: payload.recipient_phone,
        address: payload.address,
        location: payload.location,
    };
    let package = run_blocking(&state, move |state| packages::create(state, user.user_id, input)).await?;

    Ok((StatusCode::CREATED, Json(package)))
}

async fn list_packages(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Package>>, AppError> {
    let query = query.into_package_query()?;
    let all = packages::list_for_user(&state, user.user_id);
    Ok(Json(filter::apply(&all, &query)))
}

async fn get_package(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Package>, AppError> {
    Ok(Json(packages::owned(&state, user.user_id, id)?))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Package>, AppError> {
    let package = run_blocking(&state, move |state| {
        packages::update_status(state, user.user_id, id, payload.status)
    })
    .await?;
    Ok(Json(package))
}

async fn cancel_package(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Package>, AppError> {
    let package = run_blocking(&state, move |state| packages::cancel(state, user.user_id, id)).await?;
    Ok(Json(package))
}

async fn delete_package(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    run_blocking(&state, move |state| packages::delete(state, user.user_id, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn track(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Path(code): Path<String>,
) -> Result<Json<TrackingView>, AppError> {
    let package = packages::find_by_tracking_code(&state, &code)?;

    let current_location = package
        .route_id
        .and_then(|route_id| state.store.routes.get(&route_id).map(|entry| entry.value().clone()))
        .and_then(|route| current_point(&route).map(|point| point.location_name.clone()));

    Ok(Json(TrackingView {
        tracking_code: package.tracking_code,
        status: package.status,
        address: package.address,
        created_at: package.created_at,
        delivery_date: package.delivery_date,
        cancelled: package.cancelled,
        current_location,
    }))
}
