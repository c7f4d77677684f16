//! Record-level operations over the store.
//!
//! Every function takes the shared [`AppState`](crate::state::AppState) and
//! the acting user explicitly, reads and mutates within the call, and flushes
//! before returning.

pub mod auth;
pub mod dashboard;
pub mod notifications;
pub mod packages;
pub mod routes;

use crate::error::AppError;
use crate::models::location::GeoPoint;

pub(crate) fn require(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

pub(crate) fn require_coordinates(location: &GeoPoint) -> Result<(), AppError> {
    if !(-90.0..=90.0).contains(&location.lat) || !(-180.0..=180.0).contains(&location.lng) {
        return Err(AppError::Validation(format!(
            "coordinates out of range: {}, {}",
            location.lat, location.lng
        )));
    }
    Ok(())
}
