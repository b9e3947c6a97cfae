//! Storage key constants.

/// Storage keys used by the session layer
pub struct StorageKeys;

impl StorageKeys {
    /// Bearer access token
    pub const ACCESS_TOKEN: &'static str = "access_token";

    /// Refresh token
    pub const REFRESH_TOKEN: &'static str = "refresh_token";

    /// Last definitive auth result (JSON)
    pub const AUTH_SNAPSHOT: &'static str = "auth_snapshot";
}
