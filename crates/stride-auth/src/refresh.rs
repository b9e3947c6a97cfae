//! Token refresh coordination.
//!
//! At most one `POST /users/refresh` is in flight at a time. Callers that
//! arrive while a refresh is pending share its outcome; a pending refresh
//! older than the TTL is abandoned so a hung request cannot wedge every
//! later caller.
//!
//! A cycle only writes its new pair if the tokens are still the ones it
//! started from. When a logout, a login or a newer refresh got there first,
//! the cycle's own result is dropped and its waiters see the current token.

use crate::models::{RefreshRequest, TokenResponse};
use crate::single_flight::SingleFlight;
use crate::tokens::{SessionTokens, TokenChangeReason};
use crate::transport::{endpoint, HttpMethod, HttpRequest, HttpTransport};
use crate::{AuthError, AuthResult, NetworkMonitor};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use stride_config::Config;
use stride_storage::TokenPair;
use tracing::{debug, info, warn};
use url::Url;

pub const REFRESH_PATH: &str = "/users/refresh";

/// Retry and staleness settings for refresh.
#[derive(Debug, Clone)]
pub struct RefreshPolicy {
    /// A pending refresh is shared for at most this long.
    pub ttl: Duration,
    /// Total attempts per refresh cycle.
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles each time.
    pub backoff_base: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_millis(7_000),
            max_attempts: 2,
            backoff_base: Duration::from_millis(300),
        }
    }
}

impl RefreshPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ttl: config.refresh_ttl(),
            max_attempts: config.refresh_max_attempts.max(1),
            backoff_base: config.refresh_backoff_base(),
        }
    }

    /// Delay after failed attempt `attempt` (1-based): `base * 2^(attempt-1)`.
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff_base.saturating_mul(factor)
    }
}

/// Everything a refresh cycle needs, shared with the in-flight future.
struct Refresher {
    base_url: Url,
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<SessionTokens>,
    network: Arc<dyn NetworkMonitor>,
    policy: RefreshPolicy,
    network_calls: AtomicU64,
}

pub struct RefreshCoordinator {
    refresher: Arc<Refresher>,
    flight: SingleFlight<AuthResult<Option<String>>>,
}

impl RefreshCoordinator {
    pub fn new(
        base_url: Url,
        transport: Arc<dyn HttpTransport>,
        tokens: Arc<SessionTokens>,
        network: Arc<dyn NetworkMonitor>,
        policy: RefreshPolicy,
    ) -> Self {
        let flight = SingleFlight::with_ttl(policy.ttl);
        Self {
            refresher: Arc::new(Refresher {
                base_url,
                transport,
                tokens,
                network,
                policy,
                network_calls: AtomicU64::new(0),
            }),
            flight,
        }
    }

    /// Obtain a new access token.
    ///
    /// - `Ok(Some(token))`: the session now holds `token`
    /// - `Ok(None)`: there is no refresh token, or the session was cleared
    ///   while the refresh was pending
    /// - `Err(_)`: offline, rejected (401/403) or retries exhausted
    pub async fn refresh(&self) -> AuthResult<Option<String>> {
        self.refresher.tokens.ensure_hydrated().await;

        let refresher = self.refresher.clone();
        self.flight
            .run(move || async move { refresher.run_cycle().await })
            .await
    }

    pub fn is_refreshing(&self) -> bool {
        self.flight.is_in_flight()
    }

    /// Number of refresh requests handed to the transport so far.
    pub fn network_calls(&self) -> u64 {
        self.refresher.network_calls.load(Ordering::Relaxed)
    }

    pub fn policy(&self) -> &RefreshPolicy {
        &self.refresher.policy
    }
}

impl Refresher {
    async fn run_cycle(&self) -> AuthResult<Option<String>> {
        let (pair, revision) = self.tokens.versioned();
        let Some(refresh_token) = pair.refresh_token else {
            debug!("No refresh token stored, skipping refresh");
            return Ok(None);
        };

        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = AuthError::Unknown("refresh was not attempted".to_string());

        for attempt in 1..=max_attempts {
            match self.attempt(&refresh_token).await {
                Ok(response) => {
                    let access_token = response.access_token.clone();
                    let pair = TokenPair {
                        access_token: Some(response.access_token),
                        refresh_token: response.refresh_token.or(Some(refresh_token)),
                    };
                    if !self
                        .tokens
                        .apply_if_unchanged(revision, pair, TokenChangeReason::Refresh)
                    {
                        info!(attempt, "Session changed during refresh, result discarded");
                        return Ok(self.tokens.access_token());
                    }
                    info!(attempt, "Access token refreshed");
                    return Ok(Some(access_token));
                }
                Err(e) if self.tokens.revision() != revision => {
                    debug!(attempt, error = %e, "Session changed during refresh, failure discarded");
                    return Ok(self.tokens.access_token());
                }
                Err(e) if e.is_offline() || e.is_terminal() => {
                    warn!(attempt, error = %e, "Refresh failed, not retrying");
                    return Err(e);
                }
                Err(e) => {
                    last_error = e;
                    if attempt < max_attempts {
                        let delay = self.policy.delay_after_attempt(attempt);
                        debug!(
                            attempt,
                            max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %last_error,
                            "Refresh failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        warn!(max_attempts, error = %last_error, "Refresh failed after all attempts");
        Err(last_error)
    }

    async fn attempt(&self, refresh_token: &str) -> AuthResult<TokenResponse> {
        if self.network.is_offline() {
            return Err(AuthError::Offline);
        }

        let body = serde_json::to_value(RefreshRequest { refresh_token })
            .map_err(|e| AuthError::Unknown(e.to_string()))?;
        let request = HttpRequest {
            method: HttpMethod::Post,
            path: REFRESH_PATH.to_string(),
            url: endpoint(&self.base_url, REFRESH_PATH)?,
            headers: Vec::new(),
            body: Some(body),
        };

        self.network_calls.fetch_add(1, Ordering::Relaxed);
        let response = self
            .transport
            .send(request)
            .await
            .map_err(AuthError::from_transport)?;

        match response.status {
            401 | 403 => Err(AuthError::AuthExpired {
                status: response.status,
            }),
            _ if !response.is_success() => Err(AuthError::from_status(response.status, &response.body)),
            _ => response.json(),
        }
    }
}
