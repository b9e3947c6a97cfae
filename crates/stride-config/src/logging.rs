//! Logging initialization for Stride binaries.

use crate::Paths;
use tracing::Level;

/// Initialize logging for a binary.
///
/// Logs go to stderr and, when `paths` is given, to
/// `~/.stride/logs/client.jsonl`. `RUST_LOG` overrides `level`.
pub fn init_logging(service_name: &str, level: &str, paths: Option<&Paths>) {
    observability::init_with_config(observability::LogConfig {
        service_name: service_name.into(),
        default_level: parse_level(level).as_str().to_ascii_lowercase(),
        log_path: paths.map(Paths::log_file),
        also_stderr: true,
    });
}

/// Parse a configured level. Unknown values fall back to `info` rather than
/// producing a filter that silently drops everything.
pub fn parse_level(level: &str) -> Level {
    let level = level.trim();
    if level.eq_ignore_ascii_case("warning") {
        return Level::WARN;
    }
    level.parse().unwrap_or(Level::INFO)
}
