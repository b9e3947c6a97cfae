//! Last definitive authentication result, persisted for offline startup.

use crate::{StorageKeys, TieredStorage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Role {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Profile returned by `GET /users/me`. Fields the client does not model are
/// kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: serde_json::Value,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl User {
    pub fn display_name(&self) -> String {
        self.username
            .clone()
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| self.id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSnapshot {
    pub user: Option<User>,
    #[serde(default)]
    pub roles: Vec<Role>,
    pub is_auth: bool,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl AuthSnapshot {
    /// The logged-out snapshot: no user, no roles.
    pub fn empty() -> Self {
        Self {
            user: None,
            roles: Vec::new(),
            is_auth: false,
            updated_at: None,
        }
    }

    pub fn authenticated(user: User) -> Self {
        Self {
            roles: user.roles.clone(),
            user: Some(user),
            is_auth: true,
            updated_at: Some(Utc::now()),
        }
    }

    /// Equal to [`AuthSnapshot::empty`] ignoring the timestamp.
    pub fn is_empty(&self) -> bool {
        self.user.is_none() && self.roles.is_empty() && !self.is_auth
    }
}

impl Default for AuthSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Clone)]
pub struct SnapshotStore {
    storage: Arc<TieredStorage>,
}

impl SnapshotStore {
    pub fn new(storage: Arc<TieredStorage>) -> Self {
        Self { storage }
    }

    /// `None` when nothing is stored or the stored JSON is unreadable.
    pub fn load(&self) -> Option<AuthSnapshot> {
        let raw = self.storage.get(StorageKeys::AUTH_SNAPSHOT)?;
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable auth snapshot");
                None
            }
        }
    }

    pub fn persist(&self, snapshot: &AuthSnapshot) {
        match serde_json::to_string(snapshot) {
            Ok(json) => self.storage.set(StorageKeys::AUTH_SNAPSHOT, &json),
            Err(e) => warn!(error = %e, "Failed to encode auth snapshot"),
        }
    }

    /// Store the empty snapshot.
    pub fn clear(&self) {
        self.persist(&AuthSnapshot {
            updated_at: Some(Utc::now()),
            ..AuthSnapshot::empty()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorage;
    use serde_json::json;

    fn store() -> (SnapshotStore, Arc<TieredStorage>) {
        let tiers = Arc::new(TieredStorage::new(vec![Box::new(MemoryStorage::new())]));
        (SnapshotStore::new(tiers.clone()), tiers)
    }

    fn runner() -> User {
        serde_json::from_value(json!({
            "id": 7,
            "username": "runner",
            "email": "runner@stride.fit",
            "roles": [{ "name": "athlete", "level": 2 }],
            "timezone": "Europe/Berlin"
        }))
        .unwrap()
    }

    #[test]
    fn test_user_keeps_unknown_fields() {
        let user = runner();
        assert_eq!(user.roles[0].name, "athlete");
        assert_eq!(user.roles[0].extra["level"], json!(2));
        assert_eq!(user.extra["timezone"], json!("Europe/Berlin"));
        assert_eq!(user.display_name(), "runner");
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let (store, _) = store();
        assert!(store.load().is_none());

        let snapshot = AuthSnapshot::authenticated(runner());
        store.persist(&snapshot);
        assert_eq!(store.load(), Some(snapshot));
    }

    #[test]
    fn test_clear_stores_empty_snapshot() {
        let (store, _) = store();
        store.persist(&AuthSnapshot::authenticated(runner()));
        store.clear();

        let loaded = store.load().unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_corrupt_snapshot_reads_as_none() {
        let (store, tiers) = store();
        tiers.set(StorageKeys::AUTH_SNAPSHOT, "{broken");
        assert!(store.load().is_none());
    }
}
