use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::location::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PointStatus {
    Pending,
    Shipped,
    Arrived,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutePoint {
    pub id: Uuid,
    pub order: usize,
    pub location_name: String,
    pub location: GeoPoint,
    pub status: PointStatus,
    pub status_description: Option<String>,
    pub arrival_date: Option<DateTime<Utc>>,
    pub departure_date: Option<DateTime<Utc>>,
    pub is_current_location: bool,
}

impl RoutePoint {
    pub fn pending(order: usize, location_name: impl Into<String>, location: GeoPoint) -> Self {
        Self {
            id: Uuid::new_v4(),
            order,
            location_name: location_name.into(),
            location,
            status: PointStatus::Pending,
            status_description: None,
            arrival_date: None,
            departure_date: None,
            is_current_location: false,
        }
    }
}

/// Delivery route of a single package. `points` is kept sorted by `order`,
/// so `points[i].order == i` for every point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: Uuid,
    pub package_id: Uuid,
    pub last_updated: DateTime<Utc>,
    pub total_distance_km: f64,
    pub points: Vec<RoutePoint>,
}

/// Bounding box of a route, padded for display.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MapRegion {
    pub center: GeoPoint,
    pub lat_span: f64,
    pub lng_span: f64,
}
