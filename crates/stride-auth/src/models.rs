//! Wire bodies for the `/users/*` endpoints and session outcomes.

use serde::{Deserialize, Serialize};
use stride_storage::{TokenPair, User};

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// `POST /users/login` and `POST /users/refresh` response. A refresh
/// response without `refresh_token` leaves the stored one valid.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// `POST /users/register` may or may not sign the new account in.
#[derive(Debug, Deserialize)]
pub(crate) struct RegisterResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl RegisterResponse {
    pub fn into_pair(self) -> Option<TokenPair> {
        let access_token = self.access_token?;
        Some(TokenPair {
            access_token: Some(access_token),
            refresh_token: self.refresh_token,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub privacy_consent: bool,
    pub privacy_policy_version: String,
    pub health_data_consent: bool,
    pub health_data_policy_version: String,
}

/// Outcome of one session refresh.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionRefreshResult {
    Authenticated(User),
    Unauthenticated,
    /// The outcome could not be determined because the network is down.
    Offline,
}

impl SessionRefreshResult {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionRefreshResult::Authenticated(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionRefreshResult::Authenticated(_) => "authenticated",
            SessionRefreshResult::Unauthenticated => "unauthenticated",
            SessionRefreshResult::Offline => "offline",
        }
    }
}
