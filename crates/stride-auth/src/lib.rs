//! Session and token lifecycle for the Stride client.
//!
//! This crate provides:
//! - [`SessionTokens`]: the in-memory token pair, hydrated once from storage
//! - [`RefreshCoordinator`]: single-flight token refresh with bounded retry
//! - [`ApiClient`]: bearer attachment, offline pre-flight and 401 recovery
//! - [`SessionController`]: the loading / authenticated / unauthenticated
//!   state machine the rest of the app observes
//!
//! Network access goes through the [`HttpTransport`] trait and connectivity
//! comes from a [`NetworkMonitor`], so both can be replaced in tests.

mod client;
mod controller;
mod diagnostics;
mod error;
mod fsm;
mod models;
mod network;
mod refresh;
mod single_flight;
mod tokens;
mod transport;

#[cfg(test)]
mod tests;

pub use client::{is_auth_path, ApiClient, AUTH_PATHS, LOGIN_PATH, LOGOUT_PATH, ME_PATH, REGISTER_PATH};
pub use controller::{AppLifecycleEvent, AuthView, SessionController};
pub use diagnostics::{DiagnosticRecord, DiagnosticsSink, MemoryDiagnostics, TracingDiagnostics};
pub use error::{AuthError, AuthResult};
pub use fsm::{session_machine, SessionMachine, SessionMachineInput, SessionMachineState, SessionStatus};
pub use models::{RegisterRequest, SessionRefreshResult};
pub use network::{NetworkMonitor, NetworkStatus, ReachabilityTracker, WatchNetworkMonitor};
pub use refresh::{RefreshCoordinator, RefreshPolicy, REFRESH_PATH};
pub use single_flight::SingleFlight;
pub use tokens::{ListenerId, SessionTokens, TokenChangeReason, TokenListener};
pub use transport::{
    endpoint, HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport,
    TransportError,
};

pub use stride_storage::{AuthSnapshot, Role, TokenPair, User};
