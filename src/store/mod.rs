//! In-memory record store with an optional JSON snapshot on disk.
//!
//! Tables are `DashMap`s keyed by record id. Registries take the write lock,
//! mutate the tables and then call [`Store::flush`]; when the snapshot cannot
//! be written they put back the previous values so the call has no visible
//! effect. The lock is held until the rollback is done.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::notification::Notification;
use crate::models::package::Package;
use crate::models::route::Route;
use crate::models::user::User;

#[derive(Default)]
pub struct Store {
    pub users: DashMap<Uuid, User>,
    pub packages: DashMap<Uuid, Package>,
    pub notifications: DashMap<Uuid, Notification>,
    pub routes: DashMap<Uuid, Route>,
    snapshot_path: Option<PathBuf>,
    writes: Mutex<()>,
}

/// Proof that the caller holds the store's write lock.
pub struct WriteGuard<'a> {
    _held: MutexGuard<'a, ()>,
}

#[derive(Default, Serialize, Deserialize)]
struct Snapshot {
    users: Vec<User>,
    packages: Vec<Package>,
    notifications: Vec<Notification>,
    routes: Vec<Route>,
}

impl Store {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens a store backed by `path`, loading the existing snapshot if any.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let path = path.into();
        let store = Self {
            snapshot_path: Some(path.clone()),
            ..Self::default()
        };

        let snapshot = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice::<Snapshot>(&bytes).map_err(|err| {
                AppError::Persistence(format!("corrupt snapshot {}: {err}", path.display()))
            })?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => Snapshot::default(),
            Err(err) => {
                return Err(AppError::Persistence(format!(
                    "failed to read {}: {err}",
                    path.display()
                )));
            }
        };

        for user in snapshot.users {
            store.users.insert(user.id, user);
        }
        for package in snapshot.packages {
            store.packages.insert(package.id, package);
        }
        for notification in snapshot.notifications {
            store.notifications.insert(notification.id, notification);
        }
        for route in snapshot.routes {
            store.routes.insert(route.id, route);
        }

        info!(
            path = %path.display(),
            users = store.users.len(),
            packages = store.packages.len(),
            "store loaded"
        );

        Ok(store)
    }

    /// Serializes writers. Hold the guard from the first read a write depends
    /// on until after any rollback.
    pub fn lock(&self) -> WriteGuard<'_> {
        WriteGuard {
            _held: self.writes.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Writes the snapshot, if this store has one. No-op for in-memory stores.
    pub fn flush(&self, _guard: &WriteGuard<'_>) -> Result<(), AppError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        write_snapshot(path, &self.snapshot()).map_err(|err| {
            error!(path = %path.display(), error = %err, "failed to write snapshot");
            AppError::Persistence(err.to_string())
        })
    }

    /// Inserts a single record and flushes, reverting the insert on failure.
    pub fn commit<V>(
        &self,
        guard: &WriteGuard<'_>,
        table: &DashMap<Uuid, V>,
        id: Uuid,
        value: V,
    ) -> Result<(), AppError> {
        let previous = table.insert(id, value);
        if let Err(err) = self.flush(guard) {
            restore(table, id, previous);
            return Err(err);
        }
        Ok(())
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            users: self.users.iter().map(|entry| entry.value().clone()).collect(),
            packages: self.packages.iter().map(|entry| entry.value().clone()).collect(),
            notifications: self
                .notifications
                .iter()
                .map(|entry| entry.value().clone())
                .collect(),
            routes: self.routes.iter().map(|entry| entry.value().clone()).collect(),
        }
    }
}

/// Puts `previous` back under `id`, or removes the key when there was none.
pub fn restore<V>(table: &DashMap<Uuid, V>, id: Uuid, previous: Option<V>) {
    match previous {
        Some(value) => {
            table.insert(id, value);
        }
        None => {
            table.remove(&id);
        }
    }
}

/// Helpers for exercising rollback paths against a snapshot directory that
/// disappears mid-test.
#[cfg(test)]
pub(crate) mod test_support {
    use std::fs;
    use std::path::{Path, PathBuf};

    use dashmap::DashMap;
    use serde::Serialize;
    use serde_json::Value;
    use uuid::Uuid;

    use super::Store;

    fn data_dir(root: &Path) -> PathBuf {
        root.join("data")
    }

    pub(crate) fn file_backed(root: &Path) -> Store {
        fs::create_dir(data_dir(root)).unwrap();
        Store::open(data_dir(root).join("store.json")).unwrap()
    }

    /// Every later flush fails once the snapshot directory is gone.
    pub(crate) fn break_disk(root: &Path) {
        fs::remove_dir_all(data_dir(root)).unwrap();
    }

    /// Table contents ordered by id, for before/after comparisons.
    pub(crate) fn table_json<V: Serialize + Clone>(table: &DashMap<Uuid, V>) -> Value {
        let mut rows: Vec<(Uuid, V)> = table
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        rows.sort_by_key(|(id, _)| *id);
        serde_json::to_value(rows).unwrap()
    }
}

fn write_snapshot(path: &Path, snapshot: &Snapshot) -> io::Result<()> {
    let bytes = serde_json::to_vec_pretty(snapshot)?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}
