//! CLI command implementations.

mod auth;
mod session;

pub use auth::{login, logout, register, Consent};
pub use session::{has_role, refresh, status, watch, whoami};

use anyhow::Result;
use std::sync::Arc;
use stride_auth::{SessionController, WatchNetworkMonitor};
use stride_config::{Config, Paths};

/// Load configuration and wire a session controller over the default
/// storage tiers.
///
/// The CLI has no platform reachability signal; the returned monitor is
/// driven by connection failures, so an unreachable server reads as
/// offline and keeps the cached session.
pub fn controller(paths: &Paths) -> Result<(SessionController, Arc<WatchNetworkMonitor>)> {
    paths.ensure_dirs()?;
    let config = Config::load(paths)?;
    Ok(SessionController::with_inferred_connectivity(&config, paths)?)
}
