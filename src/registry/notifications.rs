use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::notification::{Notification, UnreadCount};
use crate::registry::require;
use crate::state::AppState;
use crate::store::restore;

/// Builds an unread notification without storing it.
pub fn compose(
    user_id: Uuid,
    package_id: Option<Uuid>,
    title: impl Into<String>,
    message: impl Into<String>,
) -> Notification {
    Notification {
        id: Uuid::new_v4(),
        title: title.into(),
        message: message.into(),
        created_at: Utc::now(),
        read: false,
        user_id,
        package_id,
    }
}

pub fn create(
    state: &AppState,
    user_id: Uuid,
    package_id: Option<Uuid>,
    title: &str,
    message: &str,
) -> Result<Notification, AppError> {
    require("title", title)?;
    require("message", message)?;

    let notification = compose(user_id, package_id, title, message);
    let guard = state.store.lock();
    state
        .store
        .commit(&guard, &state.store.notifications, notification.id, notification.clone())?;
    drop(guard);

    publish_unread(state, user_id);
    Ok(notification)
}

/// Newest first.
pub fn list_for_user(state: &AppState, user_id: Uuid) -> Vec<Notification> {
    let mut notifications: Vec<Notification> = state
        .store
        .notifications
        .iter()
        .filter(|entry| entry.value().user_id == user_id)
        .map(|entry| entry.value().clone())
        .collect();

    notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    notifications
}

pub fn unread_count(state: &AppState, user_id: Uuid) -> usize {
    state
        .store
        .notifications
        .iter()
        .filter(|entry| entry.value().user_id == user_id && !entry.value().read)
        .count()
}

pub fn mark_read(state: &AppState, user_id: Uuid, id: Uuid) -> Result<Notification, AppError> {
    let guard = state.store.lock();
    let mut notification = owned(state, user_id, id)?;
    notification.read = true;

    state
        .store
        .commit(&guard, &state.store.notifications, notification.id, notification.clone())?;
    drop(guard);

    publish_unread(state, user_id);
    Ok(notification)
}

/// Returns how many notifications were changed.
pub fn mark_all_read(state: &AppState, user_id: Uuid) -> Result<usize, AppError> {
    let guard = state.store.lock();
    let unread: Vec<Notification> = state
        .store
        .notifications
        .iter()
        .filter(|entry| entry.value().user_id == user_id && !entry.value().read)
        .map(|entry| entry.value().clone())
        .collect();

    let mut previous = Vec::with_capacity(unread.len());
    for mut notification in unread {
        notification.read = true;
        let id = notification.id;
        previous.push((id, state.store.notifications.insert(id, notification)));
    }

    if let Err(err) = state.store.flush(&guard) {
        for (id, old) in previous {
            restore(&state.store.notifications, id, old);
        }
        return Err(err);
    }
    drop(guard);

    publish_unread(state, user_id);
    Ok(previous.len())
}

pub fn delete(state: &AppState, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
    let guard = state.store.lock();
    owned(state, user_id, id)?;

    let previous = state.store.notifications.remove(&id).map(|(_, value)| value);
    if let Err(err) = state.store.flush(&guard) {
        restore(&state.store.notifications, id, previous);
        return Err(err);
    }
    drop(guard);

    publish_unread(state, user_id);
    Ok(())
}

/// Recomputes the user's unread counter and broadcasts it. Nobody listening
/// is not an error.
pub fn publish_unread(state: &AppState, user_id: Uuid) {
    let unread = unread_count(state, user_id);
    state.metrics.notifications_unread.set(unread as i64);

    let delivered = state.unread_tx.send(UnreadCount { user_id, unread }).unwrap_or(0);
    debug!(user_id = %user_id, unread, receivers = delivered, "unread count published");
}

fn owned(state: &AppState, user_id: Uuid, id: Uuid) -> Result<Notification, AppError> {
    state
        .store
        .notifications
        .get(&id)
        .map(|entry| entry.value().clone())
        .filter(|notification| notification.user_id == user_id)
        .ok_or_else(|| AppError::NotFound(format!("notification {id} not found")))
}
