//! Delivery route state machine.
//!
//! A route is an ordered list of waypoints with a single current-location
//! pointer. Points move `pending -> shipped/arrived -> completed` and the
//! pointer only ever moves forward by order.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::geo::{bounding_region, path_length_km};
use crate::models::location::GeoPoint;
use crate::models::package::Package;
use crate::models::route::{MapRegion, PointStatus, Route, RoutePoint};

pub const ORIGIN_NAME: &str = "Dispatch warehouse";
pub const ORIGIN_LOCATION: GeoPoint = GeoPoint {
    lat: 55.7558,
    lng: 37.6173,
};
pub const SORTING_CENTER_NAME: &str = "Sorting center";
pub const SORTING_CENTER_LOCATION: GeoPoint = GeoPoint {
    lat: 55.8304,
    lng: 37.4963,
};

#[derive(Debug, Error, PartialEq)]
pub enum RouteError {
    #[error("route has no current location")]
    NoCurrentPoint,

    #[error("package is already at the final point of its route")]
    AtLastPoint,

    #[error("the first and last route points cannot be removed")]
    ProtectedEndpoint,

    #[error("the current location cannot be removed")]
    CurrentPointProtected,

    #[error("route point {0} not found")]
    PointNotFound(Uuid),

    #[error("order {order} is out of range for a route of {len} points")]
    OrderOutOfRange { order: usize, len: usize },
}

/// Outcome of a successful [`advance`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Advance {
    pub point_id: Uuid,
    pub order: usize,
    pub location_name: String,
    pub reached_destination: bool,
}

/// Builds the initial three-point route for `package`: origin warehouse
/// (current, already shipped), sorting center, and the recipient address.
pub fn seed_route(package: &Package, now: DateTime<Utc>) -> Route {
    let mut origin = RoutePoint::pending(0, ORIGIN_NAME, ORIGIN_LOCATION);
    origin.status = PointStatus::Shipped;
    origin.departure_date = Some(now);
    origin.is_current_location = true;

    let sorting_center = RoutePoint::pending(1, SORTING_CENTER_NAME, SORTING_CENTER_LOCATION);
    let destination = RoutePoint::pending(2, package.address.clone(), package.location);

    let mut route = Route {
        id: Uuid::new_v4(),
        package_id: package.id,
        last_updated: now,
        total_distance_km: 0.0,
        points: vec![origin, sorting_center, destination],
    };
    recompute_distance(&mut route);
    route
}

pub fn current_point(route: &Route) -> Option<&RoutePoint> {
    route.points.iter().find(|point| point.is_current_location)
}

/// Moves the current-location pointer to the next point by order.
///
/// Fails without touching the route when there is no current point or it is
/// already the last one.
pub fn advance(route: &mut Route, now: DateTime<Utc>) -> Result<Advance, RouteError> {
    let current = route
        .points
        .iter()
        .position(|point| point.is_current_location)
        .ok_or(RouteError::NoCurrentPoint)?;

    let last = route.points.len() - 1;
    let next = current + 1;
    if next > last {
        return Err(RouteError::AtLastPoint);
    }

    {
        let point = &mut route.points[current];
        point.is_current_location = false;
        set_status(point, PointStatus::Completed, None, now);
    }

    let point = &mut route.points[next];
    point.is_current_location = true;
    set_status(point, PointStatus::Arrived, None, now);

    let outcome = Advance {
        point_id: point.id,
        order: point.order,
        location_name: point.location_name.clone(),
        reached_destination: next == last,
    };

    route.last_updated = now;
    Ok(outcome)
}

/// Inserts a pending point at `order`, shifting every point at or after it
/// one position to the right.
pub fn add_point(
    route: &mut Route,
    location_name: impl Into<String>,
    location: GeoPoint,
    order: usize,
    now: DateTime<Utc>,
) -> Result<RoutePoint, RouteError> {
    let len = route.points.len();
    if order > len {
        return Err(RouteError::OrderOutOfRange { order, len });
    }

    let point = RoutePoint::pending(order, location_name, location);
    route.points.insert(order, point.clone());
    renumber(route);
    recompute_distance(route);
    route.last_updated = now;

    Ok(point)
}

/// Removes an intermediate point and closes the gap it leaves in the order.
pub fn remove_point(
    route: &mut Route,
    point_id: Uuid,
    now: DateTime<Utc>,
) -> Result<RoutePoint, RouteError> {
    let index = route
        .points
        .iter()
        .position(|point| point.id == point_id)
        .ok_or(RouteError::PointNotFound(point_id))?;

    if index == 0 || index == route.points.len() - 1 {
        return Err(RouteError::ProtectedEndpoint);
    }
    if route.points[index].is_current_location {
        return Err(RouteError::CurrentPointProtected);
    }

    let removed = route.points.remove(index);
    renumber(route);
    recompute_distance(route);
    route.last_updated = now;

    Ok(removed)
}

pub fn update_point_status(
    route: &mut Route,
    point_id: Uuid,
    status: PointStatus,
    description: Option<String>,
    now: DateTime<Utc>,
) -> Result<RoutePoint, RouteError> {
    let point = route
        .points
        .iter_mut()
        .find(|point| point.id == point_id)
        .ok_or(RouteError::PointNotFound(point_id))?;

    set_status(point, status, description, now);
    let updated = point.clone();
    route.last_updated = now;
    Ok(updated)
}

pub fn recompute_distance(route: &mut Route) {
    route.total_distance_km = path_length_km(route.points.iter().map(|point| &point.location));
}

/// Coordinates of the route in travel order.
pub fn polyline(route: &Route) -> Vec<GeoPoint> {
    route.points.iter().map(|point| point.location).collect()
}

pub fn region(route: &Route) -> Option<MapRegion> {
    bounding_region(route.points.iter().map(|point| &point.location))
}

fn set_status(
    point: &mut RoutePoint,
    status: PointStatus,
    description: Option<String>,
    now: DateTime<Utc>,
) {
    point.status = status;
    point.status_description = description;

    match status {
        PointStatus::Shipped => point.departure_date = Some(now),
        PointStatus::Arrived => point.arrival_date = Some(now),
        PointStatus::Pending | PointStatus::Completed => {}
    }
}

fn renumber(route: &mut Route) {
    for (order, point) in route.points.iter_mut().enumerate() {
        point.order = order;
    }
}
