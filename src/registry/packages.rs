use chrono::{Duration, Utc};
use tracing::info;
use uuid::Uuid;

use crate::engine::tracking::{generate_tracking_code, is_tracking_code};
use crate::error::AppError;
use crate::models::location::GeoPoint;
use crate::models::notification::Notification;
use crate::models::package::{Package, PackageStatus};
use crate::registry::notifications::publish_unread;
use crate::registry::{require, require_coordinates};
use crate::state::AppState;
use crate::store::restore;

const EXPECTED_DELIVERY_DAYS: i64 = 7;

#[derive(Debug, Clone)]
pub struct NewPackage {
    pub recipient_name: String,
    pub recipient_phone: String,
    pub address: String,
    pub location: GeoPoint,
}

pub fn create(state: &AppState, user_id: Uuid, input: NewPackage) -> Result<Package, AppError> {
    require("recipient name", &input.recipient_name)?;
    require("recipient phone", &input.recipient_phone)?;
    require("address", &input.address)?;
    require_coordinates(&input.location)?;

    let guard = state.store.lock();
    if !state.store.users.contains_key(&user_id) {
        return Err(AppError::NotFound(format!("user {user_id} not found")));
    }

    let now = Utc::now();
    let package = Package {
        id: Uuid::new_v4(),
        tracking_code: unused_tracking_code(state),
        recipient_name: input.recipient_name,
        recipient_phone: input.recipient_phone,
        address: input.address,
        location: input.location,
        status: PackageStatus::AwaitingShipment,
        created_at: now,
        delivery_date: now + Duration::days(EXPECTED_DELIVERY_DAYS),
        cancelled_at: None,
        cancelled: false,
        user_id,
        route_id: None,
    };

    state
        .store
        .commit(&guard, &state.store.packages, package.id, package.clone())?;
    state.metrics.packages_created_total.inc();

    info!(
        package_id = %package.id,
        tracking_code = %package.tracking_code,
        user_id = %user_id,
        "package created"
    );

    Ok(package)
}

/// Newest first.
pub fn list_for_user(state: &AppState, user_id: Uuid) -> Vec<Package> {
    let mut packages: Vec<Package> = state
        .store
        .packages
        .iter()
        .filter(|entry| entry.value().user_id == user_id)
        .map(|entry| entry.value().clone())
        .collect();

    packages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    packages
}

/// Looks a package up by id; packages of other users are reported as missing.
pub fn owned(state: &AppState, user_id: Uuid, id: Uuid) -> Result<Package, AppError> {
    state
        .store
        .packages
        .get(&id)
        .map(|entry| entry.value().clone())
        .filter(|package| package.user_id == user_id)
        .ok_or_else(|| AppError::NotFound(format!("package {id} not found")))
}

pub fn find_by_tracking_code(state: &AppState, code: &str) -> Result<Package, AppError> {
    let code = code.trim();
    if !is_tracking_code(code) {
        return Err(AppError::Validation(format!("malformed tracking code {code}")));
    }

    state
        .store
        .packages
        .iter()
        .find(|entry| entry.value().tracking_code == code)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("no package with tracking code {code}")))
}

/// Sets the status. `Cancelled` goes through [`cancel`] so the flag and
/// timestamp stay consistent with it. Cancelled packages keep their status.
pub fn update_status(
    state: &AppState,
    user_id: Uuid,
    id: Uuid,
    status: PackageStatus,
) -> Result<Package, AppError> {
    if status == PackageStatus::Cancelled {
        return cancel(state, user_id, id);
    }

    let guard = state.store.lock();
    let mut package = owned(state, user_id, id)?;
    ensure_not_cancelled(&package)?;

    package.status = status;
    state
        .store
        .commit(&guard, &state.store.packages, package.id, package.clone())?;

    info!(package_id = %package.id, status = ?status, "package status updated");
    Ok(package)
}

pub fn cancel(state: &AppState, user_id: Uuid, id: Uuid) -> Result<Package, AppError> {
    let guard = state.store.lock();
    let mut package = owned(state, user_id, id)?;
    ensure_not_cancelled(&package)?;

    package.status = PackageStatus::Cancelled;
    package.cancelled = true;
    package.cancelled_at = Some(Utc::now());
    state
        .store
        .commit(&guard, &state.store.packages, package.id, package.clone())?;
    state.metrics.packages_cancelled_total.inc();

    info!(package_id = %package.id, "package cancelled");
    Ok(package)
}

/// Deletes the package together with its notifications and route.
pub fn delete(state: &AppState, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
    let guard = state.store.lock();
    let package = owned(state, user_id, id)?;

    let notification_ids: Vec<Uuid> = state
        .store
        .notifications
        .iter()
        .filter(|entry| entry.value().package_id == Some(id))
        .map(|entry| *entry.key())
        .collect();

    let removed_notifications: Vec<Notification> = notification_ids
        .iter()
        .filter_map(|nid| state.store.notifications.remove(nid).map(|(_, value)| value))
        .collect();
    let removed_route = package
        .route_id
        .and_then(|route_id| state.store.routes.remove(&route_id))
        .map(|(_, route)| route);
    let removed_package = state.store.packages.remove(&id).map(|(_, value)| value);

    if let Err(err) = state.store.flush(&guard) {
        restore(&state.store.packages, id, removed_package);
        if let Some(route) = removed_route {
            state.store.routes.insert(route.id, route);
        }
        for notification in removed_notifications {
            state.store.notifications.insert(notification.id, notification);
        }
        return Err(err);
    }
    drop(guard);

    if !removed_notifications.is_empty() {
        publish_unread(state, user_id);
    }

    info!(
        package_id = %id,
        notifications = removed_notifications.len(),
        "package deleted"
    );
    Ok(())
}

pub(crate) fn ensure_not_cancelled(package: &Package) -> Result<(), AppError> {
    if package.cancelled {
        return Err(AppError::Conflict(format!(
            "package {} is already cancelled",
            package.tracking_code
        )));
    }
    Ok(())
}

fn unused_tracking_code(state: &AppState) -> String {
    let mut rng = rand::thread_rng();
    loop {
        let code = generate_tracking_code(&mut rng);
        let taken = state
            .store
            .packages
            .iter()
            .any(|entry| entry.value().tracking_code == code);
        if !taken {
            return code;
        }
    }
}
