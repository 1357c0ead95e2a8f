//! Filesystem utility functions
//!
//! Small helpers shared by the reverter, host manager, and config bindings.
//! Kept thin and synchronous; callers that run under the Tokio runtime wrap
//! them in `spawn_blocking`.

use std::fs;
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::Path;

use super::error::{CoreError, Result};

/// Check that `path` exists and is a regular file.
pub fn check_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(CoreError::not_found(format!(
            "file does not exist: {}",
            path.display()
        )));
    }
    if !path.is_file() {
        return Err(CoreError::invalid_request(format!(
            "path is not a file: {}",
            path.display()
        )));
    }
    Ok(())
}

/// Read the full contents of a file.
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    check_file_exists(path)?;
    fs::read(path).map_err(CoreError::from)
}

/// Read a file as a UTF-8 string.
pub fn read_file_string(path: &Path) -> Result<String> {
    check_file_exists(path)?;
    fs::read_to_string(path).map_err(CoreError::from)
}

/// Write `contents` to `path`, preserving the mode of the original file if
/// it exists, otherwise defaulting to 0644.
pub fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    let mode = fs::metadata(path)
        .map(|m| m.permissions().mode())
        .unwrap_or(0o644);

    fs::write(path, contents)?;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

/// Copy the bytes of `src` onto `dst`, creating or overwriting `dst`.
pub fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    let data = read_file(src)?;
    write_file(dst, &data)
}

/// Resolve a path through any symlinks to its real, canonical location.
pub fn resolve_real_path(path: &Path) -> Result<std::path::PathBuf> {
    fs::canonicalize(path).map_err(CoreError::from)
}

/// Create a symlink at `link` pointing at `target`. No-op (idempotent) if
/// `link` already exists.
pub fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    if link.exists() || is_symlink(link) {
        return Ok(());
    }
    symlink(target, link).map_err(CoreError::from)
}

/// Remove `path` if it exists (as a symlink or regular file). No-op if
/// missing.
pub fn remove_if_exists(path: &Path) -> Result<()> {
    if is_symlink(path) || path.exists() {
        fs::remove_file(path).map_err(CoreError::from)?;
    }
    Ok(())
}

/// True if `path` is itself a symlink (checked via `lstat`, so broken
/// symlinks still count).
pub fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}
