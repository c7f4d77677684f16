use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::Json;
use axum::Router;

use crate::api::rest::session::CurrentUser;
use crate::registry::dashboard::{self, Dashboard};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/dashboard", get(get_dashboard))
}

async fn get_dashboard(State(state): State<Arc<AppState>>, user: CurrentUser) -> Json<Dashboard> {
    Json(dashboard::summary(&state, user.user_id))
}
