//! On-disk layout under `~/.stride`.

use crate::{CoreError, CoreResult};
use std::path::{Path, PathBuf};

const BASE_DIR_NAME: &str = ".stride";

#[derive(Debug, Clone)]
pub struct Paths {
    root: PathBuf,
}

impl Paths {
    /// `~/.stride`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir().ok_or(CoreError::NoHomeDir)?;
        Ok(Self::with_base_dir(home.join(BASE_DIR_NAME)))
    }

    pub fn with_base_dir(root: PathBuf) -> Self {
        Self { root }
    }

    /// An explicit root wins; otherwise the home-directory default.
    pub fn resolve(root: Option<PathBuf>) -> CoreResult<Self> {
        root.map_or_else(Self::new, |root| Ok(Self::with_base_dir(root)))
    }

    pub fn base_dir(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }

    /// JSON key-value tier used when no OS credential store is reachable.
    pub fn store_file(&self) -> PathBuf {
        self.root.join("store.json")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("client.jsonl")
    }

    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_under_explicit_root() {
        let paths = Paths::resolve(Some(PathBuf::from("/srv/stride"))).unwrap();
        assert_eq!(paths.base_dir(), Path::new("/srv/stride"));
        assert_eq!(paths.store_file(), Path::new("/srv/stride/store.json"));
        assert_eq!(paths.log_file(), Path::new("/srv/stride/logs/client.jsonl"));
    }

    #[test]
    fn test_ensure_dirs_creates_root_and_logs() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().join("nested/stride"));

        paths.ensure_dirs().unwrap();
        paths.ensure_dirs().unwrap();

        assert!(paths.base_dir().is_dir());
        assert!(paths.logs_dir().is_dir());
    }
}
