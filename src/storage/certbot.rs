//! Certbot certificate storage: `<certbotWorkDir>/<name>/{fullchain,privkey}.pem`
//!
//! Populated externally by `certbot`. Deletion shells out to the binary
//! itself (`certbot delete --cert-name <name>`) rather than touching the
//! directory tree directly, since certbot keeps its own renewal-config
//! bookkeeping outside the live directory.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::RwLock;

use crate::cert::certificate::parse_certificate;
use crate::cert::Certificate;
use crate::common::fs::read_file_string;
use crate::common::{CoreError, Result};

use super::{CertStorage, StorageType};

pub struct CertbotStorage {
    work_dir: PathBuf,
    certbot_bin: String,
    lock: RwLock<()>,
}

impl CertbotStorage {
    pub fn new(work_dir: PathBuf, certbot_bin: String) -> Self {
        CertbotStorage {
            work_dir,
            certbot_bin,
            lock: RwLock::new(()),
        }
    }

    fn cert_dir(&self, cert_name: &str) -> PathBuf {
        self.work_dir.join(cert_name)
    }

    fn fullchain_path(&self, cert_name: &str) -> PathBuf {
        self.cert_dir(cert_name).join("fullchain.pem")
    }

    fn privkey_path(&self, cert_name: &str) -> PathBuf {
        self.cert_dir(cert_name).join("privkey.pem")
    }
}

impl CertStorage for CertbotStorage {
    fn storage_type(&self) -> StorageType {
        StorageType::Certbot
    }

    fn get_certificate(&self, cert_name: &str) -> Result<Certificate> {
        let _guard = self.lock.read().unwrap();
        parse_certificate(&self.fullchain_path(cert_name))
    }

    fn get_certificate_as_string(&self, cert_name: &str) -> Result<(PathBuf, String)> {
        let _guard = self.lock.read().unwrap();
        let path = self.fullchain_path(cert_name);
        let contents = read_file_string(&path)?;
        Ok((path, contents))
    }

    fn get_certificates(&self) -> Result<HashMap<String, Certificate>> {
        let _guard = self.lock.read().unwrap();
        let mut certs = HashMap::new();

        let entries = match fs::read_dir(&self.work_dir) {
            Ok(e) => e,
            Err(_) => return Ok(certs),
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
                continue;
            };
            match parse_certificate(&path.join("fullchain.pem")) {
                Ok(cert) => {
                    certs.insert(name.to_string(), cert);
                }
                Err(e) => log::warn!("skipping unparsable certificate {}: {}", path.display(), e),
            }
        }

        Ok(certs)
    }

    fn get_certificate_path(&self, cert_name: &str) -> Result<(PathBuf, PathBuf)> {
        Ok((self.fullchain_path(cert_name), self.privkey_path(cert_name)))
    }

    fn remove_certificate(&self, cert_name: &str) -> Result<()> {
        let _guard = self.lock.write().unwrap();
        let output = Command::new(&self.certbot_bin)
            .args(["delete", "--cert-name", cert_name, "-n"])
            .output()
            .map_err(|e| CoreError::external(format!("failed to run certbot: {}", e)))?;

        if !output.status.success() {
            return Err(CoreError::external(format!(
                "certbot delete failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(())
    }
}

/// Extract the trailing `error: …` segment from lego's stderr, stripping
/// `[INFO]`/`[WARN]` lines and leading `YYYY/MM/DD HH:MM:SS` timestamps.
pub fn extract_lego_error(stderr: &str) -> String {
    let last_error_line = stderr
        .lines()
        .filter(|line| line.contains("error:"))
        .last();

    match last_error_line {
        Some(line) => {
            let after_marker = line.split("error:").last().unwrap_or(line).trim();
            strip_lego_log_prefix(after_marker)
        }
        None => stderr.trim().to_string(),
    }
}

fn strip_lego_log_prefix(line: &str) -> String {
    let without_level = line
        .trim_start_matches("[INFO]")
        .trim_start_matches("[WARN]")
        .trim();

    let mut parts = without_level.splitn(3, ' ');
    let date = parts.next();
    let time = parts.next();
    let rest = parts.next();

    match (date, time, rest) {
        (Some(d), Some(t), Some(r))
            if d.len() == 10 && d.chars().filter(|c| *c == '/').count() == 2 && t.contains(':') =>
        {
            r.trim().to_string()
        }
        _ => without_level.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_certificates_lists_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        // no subdirectories yet: empty map, no error
        let storage = CertbotStorage::new(dir.path().to_path_buf(), "certbot".to_string());
        let certs = storage.get_certificates().unwrap();
        assert!(certs.is_empty());
    }

    #[test]
    fn extract_lego_error_strips_log_prefix() {
        let stderr = "[INFO] 2024/01/15 10:30:00 acme: obtaining SAN certificate\n\
                       [ERROR] 2024/01/15 10:30:05 error: one or more domains had a problem";
        let extracted = extract_lego_error(stderr);
        assert_eq!(extracted, "one or more domains had a problem");
    }

    #[test]
    fn extract_lego_error_falls_back_to_trimmed_stderr_when_no_marker() {
        let stderr = "  something went wrong  ";
        assert_eq!(extract_lego_error(stderr), "something went wrong");
    }
}
