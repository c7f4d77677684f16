use serde::Serialize;
use uuid::Uuid;

use crate::engine::filter::{self, Category, PackageQuery};
use crate::models::notification::Notification;
use crate::models::package::Package;
use crate::registry::{notifications, packages};
use crate::state::AppState;

const RECENT_PACKAGES: usize = 3;
const LATEST_NOTIFICATIONS: usize = 2;

/// Home-screen overview for one user.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub active: usize,
    pub delivered: usize,
    pub cancelled: usize,
    pub recent_packages: Vec<Package>,
    pub latest_notifications: Vec<Notification>,
}

pub fn summary(state: &AppState, user_id: Uuid) -> Dashboard {
    let mut all = packages::list_for_user(state, user_id);
    let count = |category: Category| {
        let query = PackageQuery {
            category,
            ..PackageQuery::default()
        };
        filter::apply(&all, &query).len()
    };

    let active = count(Category::Active);
    let delivered = count(Category::Delivered);
    let cancelled = count(Category::Cancelled);

    all.truncate(RECENT_PACKAGES);
    let mut latest_notifications = notifications::list_for_user(state, user_id);
    latest_notifications.truncate(LATEST_NOTIFICATIONS);

    Dashboard {
        active,
        delivered,
        cancelled,
        recent_packages: all,
        latest_notifications,
    }
}
