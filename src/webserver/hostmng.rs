//! Host manager
//!
//! Enables/disables a site by creating or removing a symlink from
//! `sites-enabled` to `sites-available`. Idempotent in both directions.
//!
//! Only Nginx's layout is implemented here, per spec.md §4.2: Apache's
//! deployer writes the SSL file directly under `sites-enabled`, so
//! `Enable` is only ever invoked for Nginx virtual hosts.

use std::path::{Path, PathBuf};

use crate::common::fs::{create_symlink, is_symlink, remove_if_exists};
use crate::common::Result;

/// Symlink-based site enable/disable for the Nginx layout.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostManager;

impl HostManager {
    pub fn new() -> Self {
        HostManager
    }

    /// Enable `config_file_path` under `enabled_root_dir`. If the source
    /// file is itself a symlink, it's treated as already enabled and its
    /// own path is returned. Otherwise a symlink named after the file's
    /// basename is created inside `enabled_root_dir` pointing at
    /// `config_file_path`, unless one already exists there.
    pub fn enable(&self, config_file_path: &Path, enabled_root_dir: &Path) -> Result<PathBuf> {
        if is_symlink(config_file_path) {
            return Ok(config_file_path.to_path_buf());
        }

        let file_name = config_file_path.file_name().ok_or_else(|| {
            crate::common::CoreError::invalid_request("config path has no file name")
        })?;
        let enabled_path = enabled_root_dir.join(file_name);

        create_symlink(config_file_path, &enabled_path)?;
        Ok(enabled_path)
    }

    /// Disable a previously enabled path: remove it if it still exists
    /// (checked with `lstat` so a dangling symlink still counts),
    /// otherwise do nothing.
    pub fn disable(&self, enabled_path: &Path) -> Result<()> {
        remove_if_exists(enabled_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn enable_creates_a_symlink_and_is_idempotent() {
        let dir = tempdir().unwrap();
        let available = dir.path().join("sites-available");
        let enabled = dir.path().join("sites-enabled");
        fs::create_dir_all(&available).unwrap();
        fs::create_dir_all(&enabled).unwrap();

        let conf = available.join("example.com.conf");
        fs::write(&conf, "server {}").unwrap();

        let mgr = HostManager::new();
        let enabled_path = mgr.enable(&conf, &enabled).unwrap();
        assert!(is_symlink(&enabled_path));

        // calling again is a no-op, not an error, and returns the same path
        let enabled_path_2 = mgr.enable(&conf, &enabled).unwrap();
        assert_eq!(enabled_path, enabled_path_2);
    }

    #[test]
    fn enable_on_an_already_symlinked_source_returns_it_unchanged() {
        let dir = tempdir().unwrap();
        let real = dir.path().join("real.conf");
        fs::write(&real, "server {}").unwrap();
        let link = dir.path().join("link.conf");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let mgr = HostManager::new();
        let result = mgr.enable(&link, dir.path()).unwrap();
        assert_eq!(result, link);
    }

    #[test]
    fn disable_is_a_no_op_on_a_missing_path() {
        let dir = tempdir().unwrap();
        let mgr = HostManager::new();
        assert!(mgr.disable(&dir.path().join("missing.conf")).is_ok());
    }

    #[test]
    fn disable_removes_an_existing_symlink() {
        let dir = tempdir().unwrap();
        let real = dir.path().join("real.conf");
        fs::write(&real, "x").unwrap();
        let link = dir.path().join("link.conf");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let mgr = HostManager::new();
        mgr.disable(&link).unwrap();
        assert!(!is_symlink(&link));
    }
}
