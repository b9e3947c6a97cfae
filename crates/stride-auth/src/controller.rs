//! Session controller: the auth state the rest of the app observes.
//!
//! The controller owns the session state machine and the persisted
//! [`AuthSnapshot`]. It decides what each refresh outcome means:
//!
//! - authenticated: the profile is loaded and the snapshot updated
//! - unauthenticated: tokens and snapshot are cleared
//! - offline: the last persisted snapshot stays in charge, nothing is written
//!
//! Refreshes started by startup, reconnects, app foregrounding or explicit
//! calls all go through one single-flight, so overlapping triggers produce a
//! single underlying refresh.
//!
//! Sign-in and logout start a new session generation. An outcome is only
//! settled if its generation is still current, so a refresh that was pending
//! when the user logged out cannot bring the session back.

use crate::fsm::{SessionMachine, SessionMachineInput, SessionStatus};
use crate::models::{RegisterRequest, SessionRefreshResult};
use crate::network::{NetworkMonitor, NetworkStatus, ReachabilityTracker, WatchNetworkMonitor};
use crate::single_flight::SingleFlight;
use crate::tokens::{SessionTokens, TokenChangeReason};
use crate::transport::ReqwestTransport;
use crate::{ApiClient, AuthError, AuthResult};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use stride_config::{Config, Paths};
use stride_storage::{
    create_default_tiers, AuthSnapshot, Role, SnapshotStore, TokenStore, User,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Observable auth state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthView {
    pub status: SessionStatus,
    pub user: Option<User>,
    pub roles: Vec<Role>,
}

impl AuthView {
    fn loading(snapshot: Option<&AuthSnapshot>) -> Self {
        Self {
            status: SessionStatus::Loading,
            user: snapshot.and_then(|s| s.user.clone()),
            roles: snapshot.map(|s| s.roles.clone()).unwrap_or_default(),
        }
    }

    /// Identity is only shown while authenticated.
    fn settled(status: SessionStatus, snapshot: AuthSnapshot) -> Self {
        if status != SessionStatus::Authenticated {
            return Self {
                status,
                user: None,
                roles: Vec::new(),
            };
        }
        Self {
            status,
            user: snapshot.user,
            roles: snapshot.roles,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|role| role.name == name)
    }

    pub fn has_any_role(&self, names: &[&str]) -> bool {
        names.iter().any(|name| self.has_role(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppLifecycleEvent {
    Foreground,
    Background,
}

struct ControllerInner {
    client: Arc<ApiClient>,
    snapshots: SnapshotStore,
    fsm: Mutex<SessionMachine>,
    view: watch::Sender<AuthView>,
    /// Whether the last observed network status was offline.
    last_offline: Mutex<Option<bool>>,
    /// Held while settling; bumped by sign-in and logout.
    generation: Mutex<u64>,
    started: AtomicBool,
}

#[derive(Clone)]
pub struct SessionController {
    inner: Arc<ControllerInner>,
    refresh_flight: Arc<SingleFlight<SessionRefreshResult>>,
}

impl SessionController {
    pub fn new(client: Arc<ApiClient>, snapshots: SnapshotStore) -> Self {
        let (view, _rx) = watch::channel(AuthView::loading(None));
        Self {
            inner: Arc::new(ControllerInner {
                client,
                snapshots,
                fsm: Mutex::new(SessionMachine::new()),
                view,
                last_offline: Mutex::new(None),
                generation: Mutex::new(0),
                started: AtomicBool::new(false),
            }),
            refresh_flight: Arc::new(SingleFlight::new()),
        }
    }

    /// Wire up storage, transport and the controller from configuration.
    pub fn from_config(
        config: &Config,
        paths: &Paths,
        network: Arc<dyn NetworkMonitor>,
    ) -> AuthResult<Self> {
        let tiers = Arc::new(create_default_tiers(paths, &config.storage_service_name));
        let tokens = Arc::new(SessionTokens::new(TokenStore::new(tiers.clone())));
        let client = ApiClient::from_config(config, tokens, network)?;
        Ok(Self::new(Arc::new(client), SnapshotStore::new(tiers)))
    }

    /// For hosts with no platform reachability signal: connectivity is
    /// inferred from connection failures, see [`ReachabilityTracker`].
    pub fn with_inferred_connectivity(
        config: &Config,
        paths: &Paths,
    ) -> AuthResult<(Self, Arc<WatchNetworkMonitor>)> {
        let monitor = Arc::new(WatchNetworkMonitor::new(NetworkStatus::unknown()));
        let transport = ReachabilityTracker::new(
            Arc::new(ReqwestTransport::new(config.request_timeout())?),
            monitor.clone(),
        );

        let tiers = Arc::new(create_default_tiers(paths, &config.storage_service_name));
        let tokens = Arc::new(SessionTokens::new(TokenStore::new(tiers.clone())));
        let client =
            ApiClient::from_config_with_transport(config, Arc::new(transport), tokens, monitor.clone())?;
        let controller = Self::new(Arc::new(client), SnapshotStore::new(tiers));
        Ok((controller, monitor))
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.inner.client
    }

    pub fn state(&self) -> AuthView {
        self.inner.view.borrow().clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.view.borrow().status
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthView> {
        self.inner.view.subscribe()
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.inner.view.borrow().has_role(name)
    }

    pub fn has_any_role(&self, names: &[&str]) -> bool {
        self.inner.view.borrow().has_any_role(names)
    }

    /// Reflect the persisted snapshot while loading, then refresh.
    ///
    /// Only the first call does anything; later calls return `None`.
    pub async fn start(&self) -> Option<SessionRefreshResult> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return None;
        }

        let snapshot = self.inner.snapshots.load();
        debug!(
            cached_auth = snapshot.as_ref().map(|s| s.is_auth).unwrap_or(false),
            "Session starting"
        );
        self.inner
            .view
            .send_replace(AuthView::loading(snapshot.as_ref()));

        Some(self.refresh().await)
    }

    /// Refresh the session. Overlapping calls share one refresh.
    pub async fn refresh(&self) -> SessionRefreshResult {
        let inner = self.inner.clone();
        self.refresh_flight
            .run(move || async move {
                let generation = *inner.generation.lock();
                let result = inner.resolve().await;
                inner.settle(generation, &result);
                result
            })
            .await
    }

    pub async fn login(&self, username: &str, password: &str) -> AuthResult<AuthView> {
        self.inner.client.login(username, password).await?;
        self.inner.after_sign_in().await
    }

    pub async fn register(&self, request: &RegisterRequest) -> AuthResult<AuthView> {
        self.inner.client.register(request).await?;
        self.inner.after_sign_in().await
    }

    /// Clear the session locally, then tell the server in the background.
    /// Local state is cleared whatever the server says.
    pub async fn logout(&self) -> Option<JoinHandle<()>> {
        let tokens = self.inner.client.tokens();
        tokens.ensure_hydrated().await;
        let previous = {
            let mut generation = self.inner.generation.lock();
            *generation += 1;

            let previous = tokens.pair();
            tokens.clear(TokenChangeReason::Logout);
            self.inner.snapshots.clear();
            let status = self.inner.transition(SessionMachineInput::SignedOut);
            self.inner
                .view
                .send_replace(AuthView::settled(status, AuthSnapshot::empty()));
            previous
        };
        // Whoever asks next gets a refresh of the new, empty session.
        self.refresh_flight.abandon();
        info!("Logged out");

        if previous.is_empty() {
            return None;
        }

        let client = self.inner.client.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = client.logout_remote(&previous).await {
                debug!(error = %e, "Server logout failed");
            }
        }))
    }

    /// Refresh on the offline to online edge. Returns `None` when the
    /// status change is not a reconnect.
    pub async fn on_network_change(&self, status: NetworkStatus) -> Option<SessionRefreshResult> {
        let now_offline = status.is_offline();
        let was_offline = self.inner.last_offline.lock().replace(now_offline);

        if was_offline == Some(true) && !now_offline {
            info!("Network reconnected, refreshing session");
            Some(self.refresh().await)
        } else {
            None
        }
    }

    pub async fn on_app_foreground(&self) -> SessionRefreshResult {
        debug!("App foregrounded, refreshing session");
        self.refresh().await
    }

    /// Drive refreshes from network and lifecycle events until the network
    /// monitor goes away.
    pub fn spawn_triggers(
        &self,
        network: &dyn NetworkMonitor,
        lifecycle: Option<mpsc::Receiver<AppLifecycleEvent>>,
    ) -> JoinHandle<()> {
        let controller = self.clone();
        let mut network_rx = network.subscribe();
        *self.inner.last_offline.lock() = Some(network_rx.borrow_and_update().is_offline());
        let mut lifecycle = lifecycle;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = network_rx.changed() => {
                        if changed.is_err() {
                            debug!("Network monitor closed, stopping session triggers");
                            break;
                        }
                        let status = *network_rx.borrow_and_update();
                        controller.on_network_change(status).await;
                    }
                    event = next_lifecycle_event(&mut lifecycle) => match event {
                        Some(AppLifecycleEvent::Foreground) => {
                            controller.on_app_foreground().await;
                        }
                        Some(AppLifecycleEvent::Background) => {}
                        None => lifecycle = None,
                    }
                }
            }
        })
    }
}

async fn next_lifecycle_event(
    lifecycle: &mut Option<mpsc::Receiver<AppLifecycleEvent>>,
) -> Option<AppLifecycleEvent> {
    match lifecycle {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

impl ControllerInner {
    async fn resolve(&self) -> SessionRefreshResult {
        match self.client.refresh().await {
            Ok(Some(_)) => self.load_profile().await,
            Ok(None) => {
                debug!("No refresh token, session is unauthenticated");
                SessionRefreshResult::Unauthenticated
            }
            Err(AuthError::Offline) => SessionRefreshResult::Offline,
            Err(e) => {
                warn!(error = %e, "Session refresh failed");
                SessionRefreshResult::Unauthenticated
            }
        }
    }

    async fn load_profile(&self) -> SessionRefreshResult {
        match self.client.me().await {
            Ok(user) => SessionRefreshResult::Authenticated(user),
            Err(AuthError::Offline) => SessionRefreshResult::Offline,
            Err(e) => {
                warn!(error = %e, "Profile fetch failed");
                SessionRefreshResult::Unauthenticated
            }
        }
    }

    async fn after_sign_in(&self) -> AuthResult<AuthView> {
        let generation = {
            let mut generation = self.generation.lock();
            *generation += 1;
            *generation
        };
        let result = self.load_profile().await;
        if !self.settle(generation, &result) {
            return Err(AuthError::NotLoggedIn);
        }

        match result {
            SessionRefreshResult::Authenticated(_) => Ok(self.view.borrow().clone()),
            SessionRefreshResult::Offline => Err(AuthError::Offline),
            SessionRefreshResult::Unauthenticated => Err(AuthError::Unauthorized),
        }
    }

    /// Apply an outcome to tokens, snapshot, state machine and view.
    /// Outcomes from an older generation are dropped; returns whether this
    /// one was applied.
    fn settle(&self, generation: u64, result: &SessionRefreshResult) -> bool {
        let current = self.generation.lock();
        if *current != generation {
            debug!(
                outcome = result.label(),
                generation,
                current = *current,
                "Session changed meanwhile, outcome dropped"
            );
            return false;
        }

        let (input, snapshot) = match result {
            SessionRefreshResult::Authenticated(user) => {
                let snapshot = AuthSnapshot::authenticated(user.clone());
                self.snapshots.persist(&snapshot);
                (SessionMachineInput::Verified, snapshot)
            }
            SessionRefreshResult::Unauthenticated => {
                self.client.tokens().clear(TokenChangeReason::Expired);
                self.snapshots.clear();
                (SessionMachineInput::Rejected, AuthSnapshot::empty())
            }
            SessionRefreshResult::Offline => match self.snapshots.load() {
                Some(snapshot) if snapshot.is_auth => {
                    (SessionMachineInput::OfflineCachedAuth, snapshot)
                }
                _ => (SessionMachineInput::OfflineCachedAnon, AuthSnapshot::empty()),
            },
        };

        let status = self.transition(input);
        self.view.send_replace(AuthView::settled(status, snapshot));
        debug!(outcome = result.label(), status = status.as_str(), "Session settled");
        true
    }

    /// Feed the state machine and return the status it lands in.
    fn transition(&self, input: SessionMachineInput) -> SessionStatus {
        let mut fsm = self.fsm.lock();
        let old_status = SessionStatus::from(fsm.state());

        if fsm.consume(&input).is_err() {
            warn!(input = ?input, state = ?fsm.state(), "Ignoring invalid session transition");
            return old_status;
        }

        let new_status = SessionStatus::from(fsm.state());
        if old_status != new_status {
            debug!(
                old_status = old_status.as_str(),
                new_status = new_status.as_str(),
                "Session state transition"
            );
        }
        new_status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner() -> AuthSnapshot {
        AuthSnapshot::authenticated(User {
            id: serde_json::json!(7),
            username: Some("runner".into()),
            email: None,
            roles: vec![Role::named("athlete")],
            extra: serde_json::Map::new(),
        })
    }

    #[test]
    fn test_settled_view_shows_identity_only_when_authenticated() {
        let view = AuthView::settled(SessionStatus::Authenticated, runner());
        assert!(view.is_authenticated());
        assert!(view.has_any_role(&["coach", "athlete"]));

        let view = AuthView::settled(SessionStatus::Unauthenticated, runner());
        assert!(view.user.is_none());
        assert!(!view.has_role("athlete"));
    }
}
