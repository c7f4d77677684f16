use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::location::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PackageStatus {
    AwaitingShipment,
    Processing,
    Shipped,
    InTransit,
    Delivered,
    Cancelled,
}

impl PackageStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, PackageStatus::Delivered | PackageStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub id: Uuid,
    pub tracking_code: String,
    pub recipient_name: String,
    pub recipient_phone: String,
    pub address: String,
    pub location: GeoPoint,
    pub status: PackageStatus,
    pub created_at: DateTime<Utc>,
    pub delivery_date: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled: bool,
    pub user_id: Uuid,
    pub route_id: Option<Uuid>,
}
