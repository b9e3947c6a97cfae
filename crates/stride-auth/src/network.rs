//! Connectivity signal consumed by the request pipeline.

use crate::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// A connectivity report as delivered by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStatus {
    pub is_connected: bool,
    /// `None` while the platform has not determined reachability yet.
    pub is_internet_reachable: Option<bool>,
}

impl NetworkStatus {
    pub const fn online() -> Self {
        Self {
            is_connected: true,
            is_internet_reachable: Some(true),
        }
    }

    pub const fn offline() -> Self {
        Self {
            is_connected: false,
            is_internet_reachable: Some(false),
        }
    }

    /// Connected, reachability not yet known. Counts as online.
    pub const fn unknown() -> Self {
        Self {
            is_connected: true,
            is_internet_reachable: None,
        }
    }

    /// Connected to something, but the internet cannot be reached.
    pub const fn unreachable() -> Self {
        Self {
            is_connected: true,
            is_internet_reachable: Some(false),
        }
    }

    /// Offline when disconnected, or connected with reachability explicitly
    /// `false`. Unknown reachability counts as online.
    pub fn is_offline(&self) -> bool {
        !self.is_connected || self.is_internet_reachable == Some(false)
    }
}

impl Default for NetworkStatus {
    fn default() -> Self {
        Self::online()
    }
}

/// Source of connectivity state and change events.
pub trait NetworkMonitor: Send + Sync {
    fn current(&self) -> NetworkStatus;

    fn subscribe(&self) -> watch::Receiver<NetworkStatus>;

    fn is_offline(&self) -> bool {
        self.current().is_offline()
    }
}

/// Monitor fed by whoever owns the platform signal (or by tests).
pub struct WatchNetworkMonitor {
    tx: watch::Sender<NetworkStatus>,
}

impl WatchNetworkMonitor {
    pub fn new(initial: NetworkStatus) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn online() -> Self {
        Self::new(NetworkStatus::online())
    }

    pub fn offline() -> Self {
        Self::new(NetworkStatus::offline())
    }

    /// Publish a new status. Subscribers are woken even if it is unchanged.
    pub fn set(&self, status: NetworkStatus) {
        self.tx.send_replace(status);
    }

    /// Publish `status` only if it differs. Returns whether it did.
    pub fn update(&self, status: NetworkStatus) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        })
    }

    /// Forget an inferred offline state so the next request is tried
    /// again. Subscribers see this as a reconnect.
    pub fn reprobe(&self) -> bool {
        self.is_offline() && self.update(NetworkStatus::unknown())
    }
}

impl NetworkMonitor for WatchNetworkMonitor {
    fn current(&self) -> NetworkStatus {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<NetworkStatus> {
        self.tx.subscribe()
    }
}

/// Transport wrapper for hosts without a platform reachability signal.
///
/// A connection failure marks the monitor unreachable, so the pipeline
/// treats the session as offline instead of as broken. A response clears
/// the unknown state left by [`WatchNetworkMonitor::reprobe`].
pub struct ReachabilityTracker {
    inner: Arc<dyn HttpTransport>,
    monitor: Arc<WatchNetworkMonitor>,
}

impl ReachabilityTracker {
    pub fn new(inner: Arc<dyn HttpTransport>, monitor: Arc<WatchNetworkMonitor>) -> Self {
        Self { inner, monitor }
    }
}

#[async_trait]
impl HttpTransport for ReachabilityTracker {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let result = self.inner.send(request).await;
        match &result {
            Err(TransportError::Connect(reason)) => {
                if self.monitor.update(NetworkStatus::unreachable()) {
                    warn!(reason = %reason, "Server unreachable, treating network as offline");
                }
            }
            Ok(_) => {
                if self.monitor.update(NetworkStatus::online()) {
                    info!("Server reachable again");
                }
            }
            Err(_) => {}
        }
        result
    }
}
