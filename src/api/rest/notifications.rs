use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::rest::run_blocking;
use crate::api::rest::session::CurrentUser;
use crate::api::rest::ws;
use crate::error::AppError;
use crate::models::notification::Notification;
use crate::registry::{notifications, packages};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/notifications",
            get(list_notifications).post(create_notification),
        )
        .route("/notifications/unread-count", get(unread_count))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/ws", get(ws::ws_handler))
        .route("/notifications/:id/read", post(mark_read))
        .route("/notifications/:id", delete(delete_notification))
}

#[derive(Deserialize)]
pub struct CreateNotificationRequest {
    pub package_id: Option<Uuid>,
    pub title: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct UnreadCountResponse {
    pub unread: usize,
}

#[derive(Serialize)]
pub struct MarkAllReadResponse {
    pub updated: usize,
}

async fn list_notifications(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Json<Vec<Notification>> {
    Json(notifications::list_for_user(&state, user.user_id))
}

async fn create_notification(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(payload): Json<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<Notification>), AppError> {
    if let Some(package_id) = payload.package_id {
        packages::owned(&state, user.user_id, package_id)?;
    }

    let notification = run_blocking(&state, move |state| {
        notifications::create(
            state,
            user.user_id,
            payload.package_id,
            &payload.title,
            &payload.message,
        )
    })
    .await?;
    Ok((StatusCode::CREATED, Json(notification)))
}

async fn unread_count(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Json<UnreadCountResponse> {
    Json(UnreadCountResponse {
        unread: notifications::unread_count(&state, user.user_id),
    })
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>, AppError> {
    let notification =
        run_blocking(&state, move |state| notifications::mark_read(state, user.user_id, id)).await?;
    Ok(Json(notification))
}

async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<MarkAllReadResponse>, AppError> {
    let updated =
        run_blocking(&state, move |state| notifications::mark_all_read(state, user.user_id)).await?;
    Ok(Json(MarkAllReadResponse { updated }))
}

async fn delete_notification(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    run_blocking(&state, move |state| notifications::delete(state, user.user_id, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
