//! Errors raised while loading configuration and resolving paths.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// A configuration value is out of range
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// `api_url` (or the origin it is joined onto) does not parse
    #[error("Invalid API URL {url:?}: {source}")]
    InvalidApiUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The config file is not valid JSON
    #[error("Malformed config file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Nowhere to put `~/.stride`
    #[error("Could not determine home directory")]
    NoHomeDir,
}

pub type CoreResult<T> = Result<T, CoreError>;
