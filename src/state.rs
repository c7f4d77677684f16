use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::notification::UnreadCount;
use crate::observability::metrics::Metrics;
use crate::store::Store;

pub struct AppState {
    pub store: Store,
    /// Session token -> user id.
    pub sessions: DashMap<Uuid, Uuid>,
    pub unread_tx: broadcast::Sender<UnreadCount>,
    pub metrics: Metrics,
    pub bcrypt_cost: u32,
}

impl AppState {
    pub fn new(store: Store, event_buffer_size: usize, bcrypt_cost: u32) -> Self {
        let (unread_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            store,
            sessions: DashMap::new(),
            unread_tx,
            metrics: Metrics::new(),
            bcrypt_cost,
        }
    }
}
