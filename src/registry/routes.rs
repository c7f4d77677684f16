use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::route::{self, Advance, RouteError};
use crate::error::AppError;
use crate::models::location::GeoPoint;
use crate::models::package::{Package, PackageStatus};
use crate::models::route::{PointStatus, Route, RoutePoint};
use crate::registry::notifications::{compose, publish_unread};
use crate::registry::packages::{ensure_not_cancelled, owned};
use crate::registry::{require, require_coordinates};
use crate::state::AppState;
use crate::store::restore;

pub fn get_for_package(state: &AppState, user_id: Uuid, package_id: Uuid) -> Result<Route, AppError> {
    let package = owned(state, user_id, package_id)?;
    existing_route(state, &package)
        .ok_or_else(|| AppError::NotFound(format!("package {package_id} has no route yet")))
}

/// Returns the package's route, seeding it on first use.
pub fn create_for_package(
    state: &AppState,
    user_id: Uuid,
    package_id: Uuid,
) -> Result<Route, AppError> {
    let guard = state.store.lock();
    let mut package = owned(state, user_id, package_id)?;
    if let Some(route) = existing_route(state, &package) {
        return Ok(route);
    }

    let route = route::seed_route(&package, Utc::now());
    package.route_id = Some(route.id);

    let previous_route = state.store.routes.insert(route.id, route.clone());
    let previous_package = state.store.packages.insert(package.id, package.clone());
    if let Err(err) = state.store.flush(&guard) {
        restore(&state.store.routes, route.id, previous_route);
        restore(&state.store.packages, package.id, previous_package);
        return Err(err);
    }

    info!(
        package_id = %package.id,
        route_id = %route.id,
        total_distance_km = route.total_distance_km,
        "route created"
    );
    Ok(route)
}

/// Moves the package to its next route point and notifies the owner.
/// Arriving at the last point marks the package delivered. Cancelled
/// packages do not move.
pub fn advance(
    state: &AppState,
    user_id: Uuid,
    package_id: Uuid,
) -> Result<(Route, Advance), AppError> {
    let guard = state.store.lock();
    let mut package = owned(state, user_id, package_id)?;
    if let Err(err) = ensure_not_cancelled(&package) {
        return Err(rejected(state, package_id, err));
    }

    let attempt = match existing_route(state, &package) {
        Some(mut route) => route::advance(&mut route, Utc::now()).map(|outcome| (route, outcome)),
        None => Err(RouteError::NoCurrentPoint),
    };
    let (route, outcome) = match attempt {
        Ok(advanced) => advanced,
        Err(err) => return Err(rejected(state, package_id, err.into())),
    };

    let notification = if outcome.reached_destination {
        package.status = PackageStatus::Delivered;
        compose(
            user_id,
            Some(package.id),
            "Package delivered",
            format!(
                "Package {} has been delivered to {}",
                package.tracking_code, outcome.location_name
            ),
        )
    } else {
        compose(
            user_id,
            Some(package.id),
            "Status update",
            format!(
                "Package {} arrived at {}",
                package.tracking_code, outcome.location_name
            ),
        )
    };

    let previous_route = state.store.routes.insert(route.id, route.clone());
    let previous_package = state.store.packages.insert(package.id, package.clone());
    let previous_notification = state
        .store
        .notifications
        .insert(notification.id, notification.clone());
    if let Err(err) = state.store.flush(&guard) {
        restore(&state.store.routes, route.id, previous_route);
        restore(&state.store.packages, package.id, previous_package);
        restore(&state.store.notifications, notification.id, previous_notification);
        return Err(err);
    }
    drop(guard);

    state
        .metrics
        .route_advances_total
        .with_label_values(&["success"])
        .inc();
    publish_unread(state, user_id);

    info!(
        package_id = %package.id,
        order = outcome.order,
        delivered = outcome.reached_destination,
        "route advanced"
    );
    Ok((route, outcome))
}

pub fn add_point(
    state: &AppState,
    user_id: Uuid,
    package_id: Uuid,
    location_name: &str,
    location: GeoPoint,
    order: usize,
) -> Result<(Route, RoutePoint), AppError> {
    require("location name", location_name)?;
    require_coordinates(&location)?;

    let guard = state.store.lock();
    let mut route = get_for_package(state, user_id, package_id)?;
    let point = route::add_point(&mut route, location_name, location, order, Utc::now())?;
    state
        .store
        .commit(&guard, &state.store.routes, route.id, route.clone())?;

    info!(route_id = %route.id, point_id = %point.id, order, "route point added");
    Ok((route, point))
}

pub fn remove_point(
    state: &AppState,
    user_id: Uuid,
    package_id: Uuid,
    point_id: Uuid,
) -> Result<Route, AppError> {
    let guard = state.store.lock();
    let mut route = get_for_package(state, user_id, package_id)?;
    route::remove_point(&mut route, point_id, Utc::now())?;
    state
        .store
        .commit(&guard, &state.store.routes, route.id, route.clone())?;

    info!(route_id = %route.id, point_id = %point_id, "route point removed");
    Ok(route)
}

pub fn update_point_status(
    state: &AppState,
    user_id: Uuid,
    package_id: Uuid,
    point_id: Uuid,
    status: PointStatus,
    description: Option<String>,
) -> Result<RoutePoint, AppError> {
    let guard = state.store.lock();
    let mut route = get_for_package(state, user_id, package_id)?;
    let point = route::update_point_status(&mut route, point_id, status, description, Utc::now())?;
    state
        .store
        .commit(&guard, &state.store.routes, route.id, route.clone())?;

    Ok(point)
}

fn rejected(state: &AppState, package_id: Uuid, err: AppError) -> AppError {
    state
        .metrics
        .route_advances_total
        .with_label_values(&["rejected"])
        .inc();
    warn!(package_id = %package_id, error = %err, "route advance rejected");
    err
}

fn existing_route(state: &AppState, package: &Package) -> Option<Route> {
    let route_id = package.route_id?;
    state
        .store
        .routes
        .get(&route_id)
        .map(|entry| entry.value().clone())
}
