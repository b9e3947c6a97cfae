//! Authenticated request pipeline.
//!
//! Every request goes through the same steps:
//!
//! 1. hydrate tokens from storage (once, shared)
//! 2. short-circuit with [`AuthError::Offline`] if the network is down
//! 3. attach `Authorization: Bearer <access token>`
//! 4. on the first 401 from a non-auth path, refresh and replay once
//!
//! Failures outside the auth endpoints are reported to a
//! [`DiagnosticsSink`].

use crate::diagnostics::{DiagnosticRecord, DiagnosticsSink, TracingDiagnostics};
use crate::models::{LoginRequest, RegisterRequest, RegisterResponse, TokenResponse};
use crate::refresh::{RefreshCoordinator, RefreshPolicy, REFRESH_PATH};
use crate::tokens::{SessionTokens, TokenChangeReason};
use crate::transport::{
    endpoint, HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport,
};
use crate::{AuthError, AuthResult, NetworkMonitor};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use stride_config::Config;
use stride_storage::{TokenPair, User};
use tracing::{debug, info, warn};
use url::Url;

pub const LOGIN_PATH: &str = "/users/login";
pub const REGISTER_PATH: &str = "/users/register";
pub const LOGOUT_PATH: &str = "/users/logout";
pub const ME_PATH: &str = "/users/me";

/// Paths that never trigger refresh-and-retry and are never logged to
/// diagnostics.
pub const AUTH_PATHS: [&str; 4] = [LOGIN_PATH, REGISTER_PATH, REFRESH_PATH, LOGOUT_PATH];

/// Translation metadata is fetched speculatively; its failures are noise.
const DIAGNOSTICS_IGNORED_PREFIXES: [&str; 1] = ["/i18n"];

pub fn is_auth_path(path: &str) -> bool {
    let path = path.split('?').next().unwrap_or(path);
    AUTH_PATHS.contains(&path)
}

fn is_diagnostics_ignored(path: &str) -> bool {
    is_auth_path(path)
        || DIAGNOSTICS_IGNORED_PREFIXES
            .iter()
            .any(|prefix| path.starts_with(prefix))
}

pub struct ApiClient {
    base_url: Url,
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<SessionTokens>,
    network: Arc<dyn NetworkMonitor>,
    refresher: RefreshCoordinator,
    diagnostics: Arc<dyn DiagnosticsSink>,
}

impl ApiClient {
    pub fn new(
        base_url: Url,
        transport: Arc<dyn HttpTransport>,
        tokens: Arc<SessionTokens>,
        network: Arc<dyn NetworkMonitor>,
        policy: RefreshPolicy,
    ) -> Self {
        let refresher = RefreshCoordinator::new(
            base_url.clone(),
            transport.clone(),
            tokens.clone(),
            network.clone(),
            policy,
        );
        Self {
            base_url,
            transport,
            tokens,
            network,
            refresher,
            diagnostics: Arc::new(TracingDiagnostics),
        }
    }

    /// Build a client over `reqwest` from configuration.
    pub fn from_config(
        config: &Config,
        tokens: Arc<SessionTokens>,
        network: Arc<dyn NetworkMonitor>,
    ) -> AuthResult<Self> {
        let transport = ReqwestTransport::new(config.request_timeout())?;
        Self::from_config_with_transport(config, Arc::new(transport), tokens, network)
    }

    pub fn from_config_with_transport(
        config: &Config,
        transport: Arc<dyn HttpTransport>,
        tokens: Arc<SessionTokens>,
        network: Arc<dyn NetworkMonitor>,
    ) -> AuthResult<Self> {
        let base_url = config
            .api_base_url()
            .map_err(|e| AuthError::Config(e.to_string()))?;
        info!(base_url = %base_url, "API client configured");

        Ok(Self::new(
            base_url,
            transport,
            tokens,
            network,
            RefreshPolicy::from_config(config),
        ))
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn tokens(&self) -> &Arc<SessionTokens> {
        &self.tokens
    }

    pub fn refresher(&self) -> &RefreshCoordinator {
        &self.refresher
    }

    pub fn network(&self) -> &Arc<dyn NetworkMonitor> {
        &self.network
    }

    /// Send a request through the pipeline. Non-success statuses are
    /// returned as errors.
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> AuthResult<HttpResponse> {
        self.tokens.ensure_hydrated().await;

        let mut retried = false;
        loop {
            if self.network.is_offline() {
                debug!(method = %method, path = %path, "Offline, request not sent");
                return Err(AuthError::Offline);
            }

            let (sent, revision) = self.tokens.versioned();
            let request = self.build(method, path, body.clone(), sent.access_token.as_deref())?;
            let url = request.url.to_string();

            let response = match self.transport.send(request).await {
                Ok(response) => response,
                Err(e) => {
                    let err = AuthError::from_transport(e);
                    self.report(method, path, &url, None, &err, body.as_ref());
                    return Err(err);
                }
            };

            if response.is_success() {
                return Ok(response);
            }

            if response.status == 401 && !retried && !is_auth_path(path) {
                retried = true;
                self.recover_from_401(method, path, revision).await?;
                continue;
            }

            let err = AuthError::from_status(response.status, &response.body);
            self.report(method, path, &url, Some(response.status), &err, body.as_ref());
            return Err(err);
        }
    }

    /// Make a replay possible after a 401, or fail with the error the caller
    /// should see. `revision` is the token revision the request was sent
    /// with; tokens are only cleared if nobody has changed them since.
    async fn recover_from_401(
        &self,
        method: HttpMethod,
        path: &str,
        revision: u64,
    ) -> AuthResult<()> {
        if let Some(outcome) = self.changed_since(revision) {
            debug!(method = %method, path = %path, "Session changed in flight");
            return outcome;
        }

        debug!(method = %method, path = %path, "Received 401, refreshing session");
        let failure = match self.refresher.refresh().await {
            Ok(Some(_)) => return Ok(()),
            Err(e) if e.is_offline() => {
                debug!(path = %path, "Refresh hit offline, keeping tokens");
                return Err(AuthError::Offline);
            }
            Ok(None) => "no refresh token".to_string(),
            Err(e) => e.to_string(),
        };

        if self.tokens.clear_if_unchanged(revision, TokenChangeReason::Expired) {
            warn!(path = %path, reason = %failure, "Session unrecoverable, cleared");
            return Err(AuthError::Unauthorized);
        }
        // A newer refresh or a login landed while this one was failing.
        debug!(path = %path, reason = %failure, "Refresh failed but session moved on");
        self.changed_since(revision)
            .unwrap_or(Err(AuthError::Unauthorized))
    }

    /// `Some` when the tokens changed after `revision`: replay if there is a
    /// token to replay with, otherwise the session is gone.
    fn changed_since(&self, revision: u64) -> Option<AuthResult<()>> {
        let (pair, current) = self.tokens.versioned();
        if current == revision {
            return None;
        }
        Some(match pair.access_token {
            Some(_) => Ok(()),
            None => Err(AuthError::Unauthorized),
        })
    }

    fn build(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<serde_json::Value>,
        access_token: Option<&str>,
    ) -> AuthResult<HttpRequest> {
        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        if let Some(token) = access_token {
            headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
        }

        Ok(HttpRequest {
            method,
            path: path.to_string(),
            url: endpoint(&self.base_url, path)?,
            headers,
            body,
        })
    }

    fn report(
        &self,
        method: HttpMethod,
        path: &str,
        url: &str,
        status: Option<u16>,
        err: &AuthError,
        body: Option<&serde_json::Value>,
    ) {
        if is_diagnostics_ignored(path) {
            return;
        }
        self.diagnostics.record(DiagnosticRecord::new(
            method.as_str(),
            url,
            status,
            err.to_string(),
            body,
        ));
    }

    pub async fn send_json<B, T>(&self, method: HttpMethod, path: &str, body: Option<&B>) -> AuthResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = body
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| AuthError::Unknown(format!("failed to encode request body: {}", e)))?;
        self.request(method, path, body).await?.json()
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> AuthResult<T> {
        self.send_json::<(), T>(HttpMethod::Get, path, None).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> AuthResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(HttpMethod::Post, path, Some(body)).await
    }

    /// `POST /users/login`; stores the returned tokens.
    pub async fn login(&self, username: &str, password: &str) -> AuthResult<TokenPair> {
        let response: TokenResponse = self
            .post_json(LOGIN_PATH, &LoginRequest { username, password })
            .await?;

        let pair = TokenPair {
            access_token: Some(response.access_token),
            refresh_token: response.refresh_token,
        };
        self.tokens.apply(pair.clone(), TokenChangeReason::Login);
        info!(username = %username, "Logged in");
        Ok(pair)
    }

    /// `POST /users/register`. If the response carries no tokens the new
    /// account is signed in with `POST /users/login`.
    pub async fn register(&self, request: &RegisterRequest) -> AuthResult<TokenPair> {
        let response: RegisterResponse = self.post_json(REGISTER_PATH, request).await?;

        match response.into_pair() {
            Some(pair) => {
                self.tokens.apply(pair.clone(), TokenChangeReason::Login);
                info!(username = %request.username, "Registered");
                Ok(pair)
            }
            None => {
                debug!(username = %request.username, "Registration returned no tokens, logging in");
                self.login(&request.username, &request.password).await
            }
        }
    }

    /// Refresh the access token through the coordinator.
    pub async fn refresh(&self) -> AuthResult<Option<String>> {
        self.refresher.refresh().await
    }

    /// Best-effort `POST /users/logout` with an explicit pair, since the
    /// local tokens are usually cleared by the time this runs.
    pub async fn logout_remote(&self, pair: &TokenPair) -> AuthResult<()> {
        if self.network.is_offline() {
            return Err(AuthError::Offline);
        }

        let body = pair
            .refresh_token
            .as_deref()
            .map(|token| serde_json::json!({ "refresh_token": token }));
        let request = self.build(HttpMethod::Post, LOGOUT_PATH, body, pair.access_token.as_deref())?;

        let response = self
            .transport
            .send(request)
            .await
            .map_err(AuthError::from_transport)?;
        if response.is_success() {
            Ok(())
        } else {
            Err(AuthError::from_status(response.status, &response.body))
        }
    }

    /// `GET /users/me`.
    pub async fn me(&self) -> AuthResult<User> {
        self.get_json(ME_PATH).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_paths() {
        assert!(is_auth_path("/users/login"));
        assert!(is_auth_path("/users/refresh"));
        assert!(is_auth_path("/users/logout?all=true"));
        assert!(!is_auth_path("/users/me"));
        assert!(!is_auth_path("/workouts"));
    }

    #[test]
    fn test_diagnostics_filter() {
        assert!(is_diagnostics_ignored("/i18n/en.json"));
        assert!(is_diagnostics_ignored("/users/register"));
        assert!(!is_diagnostics_ignored("/workouts/12"));
    }
}
