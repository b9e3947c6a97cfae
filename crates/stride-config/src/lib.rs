//! Configuration, paths, and logging setup for the Stride client.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    resolve_api_url, Config, DEFAULT_APP_ORIGIN, DEFAULT_LOG_LEVEL, DEV_API_URL,
    PRODUCTION_API_PATH,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
