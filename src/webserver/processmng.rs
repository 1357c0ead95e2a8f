//! Process manager
//!
//! Finds a running daemon by walking `/proc` for a process whose
//! command name matches one of a dialect's candidate names, and reloads
//! it by sending `SIGHUP`. Process discovery is inherently racy — a
//! process found here may be gone by the time `reload` sends its signal;
//! that case surfaces as an ordinary reload failure for the caller to
//! roll back on, per spec.md §9.

use std::fs;
use std::path::Path;

use crate::common::{CoreError, Result};

/// Find-by-name-and-signal process control for the host's Nginx or Apache
/// daemon.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessManager;

impl ProcessManager {
    pub fn new() -> Self {
        ProcessManager
    }

    /// Find the pid of the first running process whose `/proc/<pid>/comm`
    /// matches one of `names`.
    pub fn find_pid(&self, names: &[&str]) -> Result<i32> {
        self.find_pid_in(Path::new("/proc"), names)
    }

    fn find_pid_in(&self, proc_dir: &Path, names: &[&str]) -> Result<i32> {
        let entries = fs::read_dir(proc_dir).map_err(CoreError::from)?;

        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some(pid_str) = file_name.to_str() else {
                continue;
            };
            let Ok(pid) = pid_str.parse::<i32>() else {
                continue;
            };

            let comm_path = entry.path().join("comm");
            if let Ok(comm) = fs::read_to_string(&comm_path) {
                let comm = comm.trim();
                if names.iter().any(|n| *n == comm) {
                    return Ok(pid);
                }
            }
        }

        Err(CoreError::not_found(format!(
            "no running process found matching any of {:?}",
            names
        )))
    }

    /// Send `SIGHUP` to the process found under `names`.
    pub fn reload(&self, names: &[&str]) -> Result<()> {
        let pid = self.find_pid(names)?;
        let result = unsafe { libc::kill(pid, libc::SIGHUP) };
        if result != 0 {
            return Err(CoreError::external(format!(
                "failed to send SIGHUP to pid {}: {}",
                pid,
                std::io::Error::last_os_error()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_pid_fails_cleanly_when_nothing_matches() {
        let mgr = ProcessManager::new();
        let result = mgr.find_pid(&["a-process-name-nobody-uses-xyz"]);
        assert!(result.is_err());
    }

    #[test]
    fn find_pid_in_synthetic_proc_dir_matches_comm_file() {
        let dir = tempfile::tempdir().unwrap();
        let pid_dir = dir.path().join("1234");
        std::fs::create_dir_all(&pid_dir).unwrap();
        std::fs::write(pid_dir.join("comm"), "nginx\n").unwrap();

        let mgr = ProcessManager::new();
        let pid = mgr.find_pid_in(dir.path(), &["nginx"]).unwrap();
        assert_eq!(pid, 1234);
    }
}
