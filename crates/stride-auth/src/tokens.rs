//! In-memory token pair mirrored to the [`TokenStore`].
//!
//! This is the only writer of the session tokens. Reads come from memory;
//! the store is consulted once, through a single-flight hydration, and
//! written on every change.
//!
//! Every change bumps a revision. Work that read the pair and later wants
//! to write it back (a refresh, a 401 recovery) passes the revision it saw
//! to [`SessionTokens::apply_if_unchanged`], so a logout or a newer refresh
//! that landed in between is never overwritten.

use crate::single_flight::SingleFlight;
use parking_lot::{Mutex, RwLock};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use stride_storage::{TokenPair, TokenStore};
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenChangeReason {
    Hydrated,
    Login,
    Refresh,
    Logout,
    /// Cleared after the session could not be recovered.
    Expired,
}

pub type TokenListener = Arc<dyn Fn(&TokenPair, TokenChangeReason) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listeners = Arc<Mutex<Vec<(ListenerId, TokenListener)>>>;

#[derive(Default)]
struct Current {
    pair: TokenPair,
    revision: u64,
}

pub struct SessionTokens {
    store: TokenStore,
    current: Arc<RwLock<Current>>,
    hydrated: Arc<AtomicBool>,
    hydration: SingleFlight<()>,
    listeners: Listeners,
    next_listener: AtomicU64,
}

impl SessionTokens {
    pub fn new(store: TokenStore) -> Self {
        Self {
            store,
            current: Arc::new(RwLock::new(Current::default())),
            hydrated: Arc::new(AtomicBool::new(false)),
            hydration: SingleFlight::new(),
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_listener: AtomicU64::new(0),
        }
    }

    /// Load tokens from storage the first time this is awaited. Concurrent
    /// callers share one load.
    pub async fn ensure_hydrated(&self) {
        if self.hydrated.load(Ordering::Acquire) {
            return;
        }

        let store = self.store.clone();
        let current = self.current.clone();
        let hydrated = self.hydrated.clone();
        let listeners = self.listeners.clone();

        self.hydration
            .run(move || async move {
                let pair = {
                    let mut current = current.write();
                    // apply() may have won the race; it flags under this lock.
                    if hydrated.load(Ordering::Acquire) {
                        return;
                    }
                    let pair = store.load();
                    current.pair = pair.clone();
                    current.revision += 1;
                    hydrated.store(true, Ordering::Release);
                    pair
                };

                debug!(
                    has_access = pair.access_token.is_some(),
                    has_refresh = pair.refresh_token.is_some(),
                    "Tokens hydrated"
                );
                notify(&listeners, &pair, TokenChangeReason::Hydrated);
            })
            .await;
    }

    pub fn is_hydrated(&self) -> bool {
        self.hydrated.load(Ordering::Acquire)
    }

    pub fn pair(&self) -> TokenPair {
        self.current.read().pair.clone()
    }

    /// The pair together with the revision it belongs to.
    pub fn versioned(&self) -> (TokenPair, u64) {
        let current = self.current.read();
        (current.pair.clone(), current.revision)
    }

    pub fn revision(&self) -> u64 {
        self.current.read().revision
    }

    pub fn access_token(&self) -> Option<String> {
        self.current.read().pair.access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.current.read().pair.refresh_token.clone()
    }

    /// Replace both tokens, persist them, then notify listeners.
    pub fn apply(&self, pair: TokenPair, reason: TokenChangeReason) {
        self.commit(None, pair, reason);
    }

    /// Like [`SessionTokens::apply`], but only if nothing changed the pair
    /// since `revision` was read. Returns whether the pair was written.
    pub fn apply_if_unchanged(
        &self,
        revision: u64,
        pair: TokenPair,
        reason: TokenChangeReason,
    ) -> bool {
        self.commit(Some(revision), pair, reason)
    }

    pub fn clear(&self, reason: TokenChangeReason) {
        self.apply(TokenPair::empty(), reason);
    }

    pub fn clear_if_unchanged(&self, revision: u64, reason: TokenChangeReason) -> bool {
        self.apply_if_unchanged(revision, TokenPair::empty(), reason)
    }

    fn commit(&self, expected: Option<u64>, pair: TokenPair, reason: TokenChangeReason) -> bool {
        {
            let mut current = self.current.write();
            if let Some(expected) = expected {
                if current.revision != expected {
                    debug!(
                        reason = ?reason,
                        expected,
                        actual = current.revision,
                        "Tokens changed meanwhile, update dropped"
                    );
                    return false;
                }
            }
            current.pair = pair.clone();
            current.revision += 1;
            self.hydrated.store(true, Ordering::Release);
            // Persisted under the lock so storage order matches memory order.
            self.store.persist(&pair);
        }

        debug!(reason = ?reason, "Tokens updated");
        notify(&self.listeners, &pair, reason);
        true
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&TokenPair, TokenChangeReason) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }
}

/// Call every listener outside the lock. A panicking listener is logged
/// and does not affect the others or the caller.
fn notify(listeners: &Listeners, pair: &TokenPair, reason: TokenChangeReason) {
    let snapshot: Vec<(ListenerId, TokenListener)> = listeners.lock().clone();
    for (id, listener) in snapshot {
        if catch_unwind(AssertUnwindSafe(|| listener(pair, reason))).is_err() {
            error!(listener = id.0, reason = ?reason, "Token listener panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stride_storage::{MemoryStorage, TieredStorage};

    fn store_with(pair: Option<TokenPair>) -> TokenStore {
        let store = TokenStore::new(Arc::new(TieredStorage::new(vec![Box::new(
            MemoryStorage::new(),
        )])));
        if let Some(pair) = pair {
            store.persist(&pair);
        }
        store
    }

    #[tokio::test]
    async fn test_hydration_loads_persisted_pair() {
        let tokens = SessionTokens::new(store_with(Some(TokenPair::new("abc123", "def456"))));
        assert!(tokens.access_token().is_none());

        tokens.ensure_hydrated().await;
        assert_eq!(tokens.access_token().as_deref(), Some("abc123"));
        assert_eq!(tokens.refresh_token().as_deref(), Some("def456"));
    }

    #[tokio::test]
    async fn test_apply_before_hydration_is_not_overwritten() {
        let tokens = SessionTokens::new(store_with(Some(TokenPair::new("old", "old-r"))));
        tokens.apply(TokenPair::new("new", "new-r"), TokenChangeReason::Login);

        tokens.ensure_hydrated().await;
        assert_eq!(tokens.access_token().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_clear_persists_empty_pair() {
        let store = store_with(Some(TokenPair::new("abc123", "def456")));
        let tokens = SessionTokens::new(store.clone());
        tokens.ensure_hydrated().await;

        tokens.clear(TokenChangeReason::Logout);
        assert!(tokens.pair().is_empty());
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_listeners_receive_reason() {
        let tokens = SessionTokens::new(store_with(None));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        tokens.subscribe(move |pair, reason| {
            sink.lock().push((pair.access_token.clone(), reason));
        });

        tokens.apply(TokenPair::new("a", "r"), TokenChangeReason::Refresh);
        tokens.clear(TokenChangeReason::Logout);

        assert_eq!(
            *seen.lock(),
            vec![
                (Some("a".to_string()), TokenChangeReason::Refresh),
                (None, TokenChangeReason::Logout),
            ]
        );
    }

    #[test]
    fn test_panicking_listener_is_contained() {
        let tokens = SessionTokens::new(store_with(None));
        let calls = Arc::new(AtomicU64::new(0));

        tokens.subscribe(|_, _| panic!("listener bug"));
        let counter = calls.clone();
        tokens.subscribe(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokens.apply(TokenPair::new("a", "r"), TokenChangeReason::Login);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(tokens.access_token().as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_conditional_update_loses_to_intervening_change() {
        let tokens = SessionTokens::new(store_with(Some(TokenPair::new("a1", "r1"))));
        tokens.ensure_hydrated().await;
        let (_, seen) = tokens.versioned();

        tokens.clear(TokenChangeReason::Logout);
        let late = TokenPair::new("a2", "r2");
        assert!(!tokens.apply_if_unchanged(seen, late, TokenChangeReason::Refresh));
        assert!(!tokens.clear_if_unchanged(seen, TokenChangeReason::Expired));
        assert!(tokens.pair().is_empty());

        let seen = tokens.revision();
        let next = TokenPair::new("a3", "r3");
        assert!(tokens.apply_if_unchanged(seen, next, TokenChangeReason::Login));
        assert_eq!(tokens.access_token().as_deref(), Some("a3"));
        assert!(tokens.revision() > seen);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_hydration_never_overwrites_concurrent_apply() {
        for _ in 0..50 {
            let store = store_with(Some(TokenPair::new("old", "old-r")));
            let tokens = Arc::new(SessionTokens::new(store));
            let hydrating = {
                let tokens = tokens.clone();
                tokio::spawn(async move { tokens.ensure_hydrated().await })
            };
            tokens.apply(TokenPair::new("new", "new-r"), TokenChangeReason::Login);
            hydrating.await.unwrap();

            assert_eq!(tokens.access_token().as_deref(), Some("new"));
        }
    }

    #[test]
    fn test_unsubscribe() {
        let tokens = SessionTokens::new(store_with(None));
        let id = tokens.subscribe(|_, _| {});
        assert!(tokens.unsubscribe(id));
        assert!(!tokens.unsubscribe(id));
    }
}
