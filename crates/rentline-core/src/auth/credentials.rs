use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};

use crate::storage::Storage;

/// Durable storage key holding the bearer token.
pub const TOKEN_KEY: &str = "token";

/// Cookie consulted by the edge filter. Its presence is all that matters there.
pub const MARKER_COOKIE: &str = "token";

/// Opaque bearer token. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for building an `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// The live credential together with the epoch it was installed at.
#[derive(Debug, Clone, Default)]
pub struct CredentialSnapshot {
    pub credential: Option<Credential>,
    pub epoch: u64,
}

/// Result of an authentication failure reported against an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalidation {
    /// The credential the failing request carried was removed.
    Cleared,
    /// Nothing was live; the store is already empty.
    AlreadyEmpty,
    /// A newer credential was installed after the request left; it was kept.
    Stale,
}

/// Holds the current bearer token.
///
/// Three places see the credential: durable storage (survives restarts),
/// the edge marker (visible to the pre-render filter) and an in-memory
/// mirror that the request pipeline reads on every call. Every `set` and
/// `clear` advances the epoch, which lets late responses be told apart from
/// ones that belong to the current credential.
///
/// None of the operations fail. Storage problems are logged and the
/// in-memory mirror stays authoritative for this process.
pub struct CredentialStore {
    durable: Arc<dyn Storage>,
    marker: Arc<dyn Storage>,
    state: RwLock<CredentialSnapshot>,
}

impl CredentialStore {
    /// Open the store, picking up a token persisted by an earlier run.
    pub fn open(durable: Arc<dyn Storage>, marker: Arc<dyn Storage>) -> Self {
        let credential = match durable.get(TOKEN_KEY) {
            Ok(Some(token)) if !token.is_empty() => Some(Credential::new(token)),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read stored credential");
                None
            }
        };
        debug!(has_credential = credential.is_some(), "Credential store opened");

        Self {
            durable,
            marker,
            state: RwLock::new(CredentialSnapshot {
                credential,
                epoch: 0,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, CredentialSnapshot> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CredentialSnapshot> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Install `token`, superseding any previous credential.
    pub fn set(&self, token: &str) {
        if token.is_empty() {
            warn!("Refusing to store an empty credential; clearing instead");
            self.clear();
            return;
        }

        let epoch = {
            let mut state = self.write();
            state.credential = Some(Credential::new(token));
            state.epoch += 1;
            state.epoch
        };

        if let Err(e) = self.durable.set(TOKEN_KEY, token) {
            warn!(error = %e, "Failed to persist credential");
        }
        if let Err(e) = self.marker.set(MARKER_COOKIE, token) {
            warn!(error = %e, "Failed to write credential marker");
        }
        debug!(epoch, "Credential installed");
    }

    /// Current credential, if any.
    pub fn get(&self) -> Option<Credential> {
        self.read().credential.clone()
    }

    pub fn is_present(&self) -> bool {
        self.read().credential.is_some()
    }

    /// Current credential and epoch, read together.
    pub fn snapshot(&self) -> CredentialSnapshot {
        self.read().clone()
    }

    pub fn epoch(&self) -> u64 {
        self.read().epoch
    }

    /// Remove the credential everywhere.
    pub fn clear(&self) {
        let epoch = {
            let mut state = self.write();
            state.credential = None;
            state.epoch += 1;
            state.epoch
        };
        self.remove_persisted();
        debug!(epoch, "Credential cleared");
    }

    /// Clear the credential on behalf of a request sent at `epoch` that the
    /// server rejected. A credential installed after that request is kept.
    pub fn invalidate(&self, epoch: u64) -> Invalidation {
        let outcome = {
            let mut state = self.write();
            match state.credential {
                None => Invalidation::AlreadyEmpty,
                Some(_) if state.epoch != epoch => Invalidation::Stale,
                Some(_) => {
                    state.credential = None;
                    state.epoch += 1;
                    Invalidation::Cleared
                }
            }
        };

        match outcome {
            Invalidation::Cleared => {
                self.remove_persisted();
                debug!(request_epoch = epoch, "Rejected credential cleared");
            }
            Invalidation::AlreadyEmpty => {
                // Something outside this process may still hold a marker.
                self.remove_persisted();
            }
            Invalidation::Stale => {
                debug!(request_epoch = epoch, "Ignoring rejection from superseded credential");
            }
        }
        outcome
    }

    fn remove_persisted(&self) {
        if let Err(e) = self.durable.remove(TOKEN_KEY) {
            warn!(error = %e, "Failed to remove persisted credential");
        }
        if let Err(e) = self.marker.remove(MARKER_COOKIE) {
            warn!(error = %e, "Failed to remove credential marker");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn store_with(token: Option<&str>) -> (CredentialStore, Arc<MemoryStorage>, Arc<MemoryStorage>) {
        let durable = Arc::new(MemoryStorage::new());
        let marker = Arc::new(MemoryStorage::new());
        if let Some(token) = token {
            durable.set(TOKEN_KEY, token).unwrap();
        }
        let store = CredentialStore::open(durable.clone(), marker.clone());
        (store, durable, marker)
    }

    #[test]
    fn test_open_picks_up_persisted_token() {
        let (store, _, _) = store_with(Some("abc"));
        assert_eq!(store.get().unwrap().expose(), "abc");
        assert_eq!(store.epoch(), 0);
    }

    #[test]
    fn test_open_ignores_empty_token() {
        let (store, _, _) = store_with(Some(""));
        assert!(store.get().is_none());
    }

    #[test]
    fn test_set_persists_and_writes_marker() {
        let (store, durable, marker) = store_with(None);
        store.set("xyz");
        assert_eq!(store.get().unwrap().expose(), "xyz");
        assert_eq!(durable.get(TOKEN_KEY).unwrap().as_deref(), Some("xyz"));
        assert!(marker.get(MARKER_COOKIE).unwrap().is_some());
        assert_eq!(store.epoch(), 1);
    }

    #[test]
    fn test_set_supersedes_previous() {
        let (store, durable, _) = store_with(Some("old"));
        store.set("new");
        assert_eq!(store.get().unwrap().expose(), "new");
        assert_eq!(durable.get(TOKEN_KEY).unwrap().as_deref(), Some("new"));
    }

    #[test]
    fn test_clear_removes_everything() {
        let (store, durable, marker) = store_with(None);
        store.set("xyz");
        store.clear();
        assert!(store.get().is_none());
        assert!(durable.get(TOKEN_KEY).unwrap().is_none());
        assert!(marker.get(MARKER_COOKIE).unwrap().is_none());
    }

    #[test]
    fn test_clear_when_empty_is_fine() {
        let (store, _, _) = store_with(None);
        store.clear();
        store.clear();
        assert!(store.get().is_none());
    }

    #[test]
    fn test_invalidate_current_epoch_clears() {
        let (store, durable, _) = store_with(None);
        store.set("xyz");
        let epoch = store.epoch();
        assert_eq!(store.invalidate(epoch), Invalidation::Cleared);
        assert!(store.get().is_none());
        assert!(durable.get(TOKEN_KEY).unwrap().is_none());
    }

    #[test]
    fn test_invalidate_twice_leaves_store_empty() {
        let (store, _, _) = store_with(None);
        store.set("xyz");
        let epoch = store.epoch();
        assert_eq!(store.invalidate(epoch), Invalidation::Cleared);
        assert_eq!(store.invalidate(epoch), Invalidation::AlreadyEmpty);
        assert!(store.get().is_none());
    }

    #[test]
    fn test_invalidate_stale_epoch_keeps_newer_credential() {
        let (store, _, _) = store_with(None);
        store.set("first");
        let stale_epoch = store.epoch();
        store.set("second");
        assert_eq!(store.invalidate(stale_epoch), Invalidation::Stale);
        assert_eq!(store.get().unwrap().expose(), "second");
    }

    #[test]
    fn test_debug_redacts_token() {
        let credential = Credential::new("super-secret");
        assert!(!format!("{:?}", credential).contains("super-secret"));
    }
}
