use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::rest::run_blocking;
use crate::api::rest::session::CurrentUser;
use crate::error::AppError;
use crate::models::user::{Session, UserProfile};
use crate::registry::auth::{self, Registration};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/password-reset", post(request_password_reset))
        .route("/auth/password-reset/confirm", post(confirm_password_reset))
        .route("/me", get(me).patch(update_me))
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub phone: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct ConfirmPasswordResetRequest {
    pub email: String,
    pub token: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub token: Uuid,
    pub user: UserProfile,
}

#[derive(Serialize)]
pub struct PasswordResetResponse {
    pub reset_token: String,
}

impl SessionResponse {
    fn new(session: Session, user: UserProfile) -> Self {
        Self {
            token: session.token,
            user,
        }
    }
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let registration = Registration {
        name: payload.name,
        email: payload.email,
        password: payload.password,
        confirm_password: payload.confirm_password,
        phone: payload.phone,
    };
    let (session, user) = run_blocking(&state, move |state| auth::register(state, registration)).await?;

    Ok((StatusCode::CREATED, Json(SessionResponse::new(session, user))))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let (session, user) = run_blocking(&state, move |state| {
        auth::login(state, &payload.email, &payload.password)
    })
    .await?;
    Ok(Json(SessionResponse::new(session, user)))
}

async fn logout(State(state): State<Arc<AppState>>, user: CurrentUser) -> StatusCode {
    auth::logout(&state, user.token);
    StatusCode::NO_CONTENT
}

async fn me(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<UserProfile>, AppError> {
    Ok(Json(auth::profile(&state, user.user_id)?))
}

async fn update_me(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, AppError> {
    let profile = run_blocking(&state, move |state| {
        auth::update_profile(state, user.user_id, payload.name, payload.phone)
    })
    .await?;
    Ok(Json(profile))
}

// No delivery channel exists yet, so the token goes back to the caller.
async fn request_password_reset(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PasswordResetRequest>,
) -> Result<Json<PasswordResetResponse>, AppError> {
    let reset_token = run_blocking(&state, move |state| {
        auth::initiate_password_reset(state, &payload.email)
    })
    .await?;
    Ok(Json(PasswordResetResponse { reset_token }))
}

async fn confirm_password_reset(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ConfirmPasswordResetRequest>,
) -> Result<StatusCode, AppError> {
    run_blocking(&state, move |state| {
        auth::reset_password(
            state,
            &payload.email,
            &payload.token,
            &payload.new_password,
            &payload.confirm_password,
        )
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
