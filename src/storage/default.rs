//! Default certificate storage: `<varDir>/default/certificates/<name>.pem`
//!
//! Each file is a single combined PEM holding both certificate and key, so
//! `certPath == keyPath`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::cert::certificate::parse_certificate;
use crate::cert::Certificate;
use crate::common::fs::{read_file_string, remove_if_exists, write_file};
use crate::common::{CoreError, Result};

use super::{CertStorage, StorageType};

pub struct DefaultStorage {
    root: PathBuf,
    lock: RwLock<()>,
}

impl DefaultStorage {
    pub fn new(var_dir: &Path) -> Self {
        DefaultStorage {
            root: var_dir.join("default").join("certificates"),
            lock: RwLock::new(()),
        }
    }

    fn cert_path(&self, cert_name: &str) -> PathBuf {
        self.root.join(format!("{}.pem", cert_name))
    }
}

impl CertStorage for DefaultStorage {
    fn storage_type(&self) -> StorageType {
        StorageType::Default
    }

    fn get_certificate(&self, cert_name: &str) -> Result<Certificate> {
        let _guard = self.lock.read().unwrap();
        parse_certificate(&self.cert_path(cert_name))
    }

    fn get_certificate_as_string(&self, cert_name: &str) -> Result<(PathBuf, String)> {
        let _guard = self.lock.read().unwrap();
        let path = self.cert_path(cert_name);
        let contents = read_file_string(&path)?;
        Ok((path, contents))
    }

    fn get_certificates(&self) -> Result<HashMap<String, Certificate>> {
        let _guard = self.lock.read().unwrap();
        let mut certs = HashMap::new();

        let entries = match fs::read_dir(&self.root) {
            Ok(e) => e,
            Err(_) => return Ok(certs),
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("pem") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match parse_certificate(&path) {
                Ok(cert) => {
                    certs.insert(stem.to_string(), cert);
                }
                Err(e) => log::warn!("skipping unparsable certificate {}: {}", path.display(), e),
            }
        }

        Ok(certs)
    }

    fn get_certificate_path(&self, cert_name: &str) -> Result<(PathBuf, PathBuf)> {
        let path = self.cert_path(cert_name);
        Ok((path.clone(), path))
    }

    fn remove_certificate(&self, cert_name: &str) -> Result<()> {
        let _guard = self.lock.write().unwrap();
        remove_if_exists(&self.cert_path(cert_name))
    }

    fn add_certificate(&self, cert_name: &str, pem: &[u8]) -> Result<PathBuf> {
        let _guard = self.lock.write().unwrap();
        fs::create_dir_all(&self.root).map_err(CoreError::from)?;
        let path = self.cert_path(cert_name);
        write_file(&path, pem)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn add_then_get_path_round_trips() {
        let dir = tempdir().unwrap();
        let storage = DefaultStorage::new(dir.path());
        let path = storage.add_certificate("example.com", b"dummy pem").unwrap();
        assert!(path.exists());

        let (cert_path, key_path) = storage.get_certificate_path("example.com").unwrap();
        assert_eq!(cert_path, key_path);
        assert_eq!(cert_path, path);
    }

    #[test]
    fn get_certificates_skips_non_pem_files() {
        let dir = tempdir().unwrap();
        let storage = DefaultStorage::new(dir.path());
        fs::create_dir_all(&storage.root).unwrap();
        fs::write(storage.root.join("notes.txt"), b"irrelevant").unwrap();

        let certs = storage.get_certificates().unwrap();
        assert!(certs.is_empty());
    }

    #[test]
    fn remove_certificate_is_idempotent() {
        let dir = tempdir().unwrap();
        let storage = DefaultStorage::new(dir.path());
        assert!(storage.remove_certificate("missing").is_ok());
    }
}
