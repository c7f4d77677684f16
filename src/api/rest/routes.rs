use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::rest::run_blocking;
use crate::api::rest::session::CurrentUser;
use crate::engine::route::{self, Advance};
use crate::error::AppError;
use crate::models::location::GeoPoint;
use crate::models::route::{MapRegion, PointStatus, Route, RoutePoint};
use crate::registry::routes;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/packages/:id/route", get(get_route))
        .route("/packages/:id/route/advance", post(advance))
        .route("/packages/:id/route/points", post(add_point))
        .route(
            "/packages/:id/route/points/:point_id",
            patch(update_point_status).delete(remove_point),
        )
}

#[derive(Deserialize)]
pub struct AddPointRequest {
    pub location_name: String,
    pub location: GeoPoint,
    pub order: usize,
}

#[derive(Deserialize)]
pub struct UpdatePointStatusRequest {
    pub status: PointStatus,
    pub description: Option<String>,
}

#[derive(Serialize)]
pub struct RouteView {
    #[serde(flatten)]
    pub route: Route,
    pub current_point_id: Option<Uuid>,
    pub polyline: Vec<GeoPoint>,
    pub region: Option<MapRegion>,
}

impl From<Route> for RouteView {
    fn from(route: Route) -> Self {
        Self {
            current_point_id: route::current_point(&route).map(|point| point.id),
            polyline: route::polyline(&route),
            region: route::region(&route),
            route,
        }
    }
}

#[derive(Serialize)]
pub struct AdvanceResponse {
    pub advance: Advance,
    pub route: RouteView,
}

#[derive(Serialize)]
pub struct AddPointResponse {
    pub point: RoutePoint,
    pub route: RouteView,
}

// The route is seeded the first time a package's route is viewed.
async fn get_route(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<RouteView>, AppError> {
    let route = run_blocking(&state, move |state| {
        routes::create_for_package(state, user.user_id, id)
    })
    .await?;
    Ok(Json(route.into()))
}

async fn advance(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<AdvanceResponse>, AppError> {
    let (route, advance) =
        run_blocking(&state, move |state| routes::advance(state, user.user_id, id)).await?;
    Ok(Json(AdvanceResponse {
        advance,
        route: route.into(),
    }))
}

async fn add_point(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddPointRequest>,
) -> Result<(StatusCode, Json<AddPointResponse>), AppError> {
    let (route, point) = run_blocking(&state, move |state| {
        routes::add_point(
            state,
            user.user_id,
            id,
            &payload.location_name,
            payload.location,
            payload.order,
        )
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(AddPointResponse {
            point,
            route: route.into(),
        }),
    ))
}

async fn update_point_status(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path((id, point_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdatePointStatusRequest>,
) -> Result<Json<RoutePoint>, AppError> {
    let point = run_blocking(&state, move |state| {
        routes::update_point_status(
            state,
            user.user_id,
            id,
            point_id,
            payload.status,
            payload.description,
        )
    })
    .await?;
    Ok(Json(point))
}

async fn remove_point(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path((id, point_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<RouteView>, AppError> {
    let route = run_blocking(&state, move |state| {
        routes::remove_point(state, user.user_id, id, point_id)
    })
    .await?;
    Ok(Json(route.into()))
}
