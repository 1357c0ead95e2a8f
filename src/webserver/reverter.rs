//! Reverter: transactional journal of pending filesystem mutations
//!
//! A `Reverter` is single-use per pipeline call: it accumulates backups,
//! deletions, and disablements as a deploy proceeds, then either
//! `commit()`s (discarding backups, keeping the mutations) or `rollback()`s
//! (undoing them, best-effort) exactly once. `commit()` leaves it empty
//! but reusable, matching spec.md §3's lifecycle note.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::common::fs::{copy_file, read_file, remove_if_exists, write_file};
use crate::common::{CoreError, Result};
use crate::webserver::hostmng::HostManager;

/// Transactional journal of backups, deletions, and disabled-site paths.
///
/// Ordering guarantee on rollback (spec.md §4.1): disable, then delete,
/// then restore. Disabling first unlinks a newly created-and-enabled SSL
/// site before its file is removed; deleting before restoring ensures a
/// synthesized file is gone before an unrelated original's backup is
/// copied back over it.
#[derive(Debug, Default)]
pub struct Reverter {
    configs_to_delete: Vec<PathBuf>,
    configs_to_restore: HashMap<PathBuf, PathBuf>,
    configs_to_disable: Vec<PathBuf>,
    host_manager: HostManager,
}

impl Reverter {
    pub fn new(host_manager: HostManager) -> Self {
        Reverter {
            configs_to_delete: Vec::new(),
            configs_to_restore: HashMap::new(),
            configs_to_disable: Vec::new(),
            host_manager,
        }
    }

    /// Back up `path` to `path + ".back"` unless it's already recorded for
    /// restore or already scheduled for deletion (spec.md §3 invariant 3:
    /// a path in `configs_to_delete` is never backed up).
    pub fn backup_config(&mut self, path: &Path) -> Result<()> {
        if self.configs_to_restore.contains_key(path) {
            return Ok(());
        }
        if self.configs_to_delete.iter().any(|p| p == path) {
            return Ok(());
        }

        let backup_path = backup_path_for(path);
        let contents = read_file(path)?;
        write_file(&backup_path, &contents)?;
        self.configs_to_restore
            .insert(path.to_path_buf(), backup_path);
        Ok(())
    }

    /// Back up each path in order; the first failure aborts the whole
    /// batch (partial backups already taken are left in place for the
    /// caller's subsequent rollback to undo).
    pub fn backup_configs(&mut self, paths: &[PathBuf]) -> Result<()> {
        for path in paths {
            self.backup_config(path)?;
        }
        Ok(())
    }

    /// Record `path` for deletion on rollback. No I/O happens here.
    pub fn add_config_to_deletion(&mut self, path: PathBuf) {
        self.configs_to_delete.push(path);
    }

    /// Record `path` (an enabled-sites symlink) for disablement on
    /// rollback. No I/O happens here.
    pub fn add_config_to_disable(&mut self, path: PathBuf) {
        self.configs_to_disable.push(path);
    }

    /// Undo every recorded mutation, best-effort, in disable → delete →
    /// restore order. Missing files at the delete step are logged and
    /// skipped; other failures at delete or restore abort the rollback
    /// and surface as `CoreError::Rollback`. Disablement failures are
    /// always just logged, never fatal.
    pub fn rollback(&mut self) -> Result<()> {
        for path in &self.configs_to_disable {
            if let Err(e) = self.host_manager.disable(path) {
                log::warn!("rollback: failed to disable {}: {}", path.display(), e);
            }
        }

        for path in &self.configs_to_delete {
            if !path.exists() {
                log::debug!("rollback: {} already gone, skipping", path.display());
                continue;
            }
            if let Err(e) = remove_if_exists(path) {
                return Err(CoreError::config_parse(format!(
                    "rollback: failed to delete {}: {}",
                    path.display(),
                    e
                )));
            }
        }

        for (orig, backup) in &self.configs_to_restore {
            if let Err(e) = copy_file(backup, orig) {
                return Err(CoreError::config_parse(format!(
                    "rollback: failed to restore {} from {}: {}",
                    orig.display(),
                    backup.display(),
                    e
                )));
            }
            if let Err(e) = remove_if_exists(backup) {
                log::warn!(
                    "rollback: failed to delete backup {}: {}",
                    backup.display(),
                    e
                );
            }
        }

        self.configs_to_disable.clear();
        self.configs_to_delete.clear();
        self.configs_to_restore.clear();
        Ok(())
    }

    /// Delete every backup file still present. Clears the delete list.
    /// Backup-deletion errors are logged, never fatal — by the time commit
    /// runs, every user-visible change is already in place.
    pub fn commit(&mut self) {
        for backup in self.configs_to_restore.values() {
            if let Err(e) = remove_if_exists(backup) {
                log::warn!("commit: failed to erase backup {}: {}", backup.display(), e);
            }
        }
        self.configs_to_restore.clear();
        self.configs_to_delete.clear();
        self.configs_to_disable.clear();
    }
}

fn backup_path_for(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".back");
    PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn backup_config_is_recorded_exactly_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.conf");
        fs::write(&path, "original").unwrap();

        let mut reverter = Reverter::new(HostManager::new());
        reverter.backup_config(&path).unwrap();
        reverter.backup_config(&path).unwrap();

        assert_eq!(reverter.configs_to_restore.len(), 1);
        assert!(backup_path_for(&path).exists());
    }

    #[test]
    fn deleted_paths_are_never_backed_up() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.conf");
        fs::write(&path, "original").unwrap();

        let mut reverter = Reverter::new(HostManager::new());
        reverter.add_config_to_deletion(path.clone());
        reverter.backup_config(&path).unwrap();

        assert!(reverter.configs_to_restore.is_empty());
        assert!(!backup_path_for(&path).exists());
    }

    #[test]
    fn rollback_restores_bytes_and_deletes_scheduled_files() {
        let dir = tempdir().unwrap();
        let original = dir.path().join("original.conf");
        let synthesized = dir.path().join("synth-ssl.conf");
        fs::write(&original, "before").unwrap();

        let mut reverter = Reverter::new(HostManager::new());
        reverter.backup_config(&original).unwrap();
        fs::write(&original, "after-mutation").unwrap();
        fs::write(&synthesized, "new file").unwrap();
        reverter.add_config_to_deletion(synthesized.clone());

        reverter.rollback().unwrap();

        assert_eq!(fs::read_to_string(&original).unwrap(), "before");
        assert!(!synthesized.exists());
        assert!(!backup_path_for(&original).exists());
    }

    #[test]
    fn rollback_skips_missing_deletion_targets_without_failing() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("never-existed.conf");

        let mut reverter = Reverter::new(HostManager::new());
        reverter.add_config_to_deletion(missing);

        assert!(reverter.rollback().is_ok());
    }

    #[test]
    fn commit_erases_backups_and_clears_the_delete_list() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.conf");
        fs::write(&path, "original").unwrap();

        let mut reverter = Reverter::new(HostManager::new());
        reverter.backup_config(&path).unwrap();
        reverter.add_config_to_deletion(dir.path().join("to-delete.conf"));

        reverter.commit();

        assert!(!backup_path_for(&path).exists());
        assert!(reverter.configs_to_delete.is_empty());
        assert!(reverter.configs_to_restore.is_empty());
    }

    #[test]
    fn rollback_disables_before_deleting_before_restoring() {
        let dir = tempdir().unwrap();
        let available = dir.path().join("sites-available");
        let enabled = dir.path().join("sites-enabled");
        fs::create_dir_all(&available).unwrap();
        fs::create_dir_all(&enabled).unwrap();

        let original = available.join("example.com.conf");
        fs::write(&original, "before").unwrap();
        let ssl_file = available.join("example.com-ssl.conf");
        fs::write(&ssl_file, "ssl content").unwrap();
        let enabled_link = enabled.join("example.com-ssl.conf");
        std::os::unix::fs::symlink(&ssl_file, &enabled_link).unwrap();

        let mut reverter = Reverter::new(HostManager::new());
        reverter.backup_config(&original).unwrap();
        fs::write(&original, "after").unwrap();
        reverter.add_config_to_disable(enabled_link.clone());
        reverter.add_config_to_deletion(ssl_file.clone());

        reverter.rollback().unwrap();

        assert!(!enabled_link.exists());
        assert!(!ssl_file.exists());
        assert_eq!(fs::read_to_string(&original).unwrap(), "before");
    }
}
