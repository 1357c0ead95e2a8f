//! Lego certificate storage: `<varDir>/lego/certificates/<name>.pem`
//!
//! Populated externally by the `lego` ACME client. Deleting a certificate
//! also removes the sibling `.crt`/`.key`/`.issuer.crt`/`.json` files lego
//! writes alongside the combined PEM.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::cert::certificate::parse_certificate;
use crate::cert::Certificate;
use crate::common::fs::{read_file_string, remove_if_exists};
use crate::common::Result;

use super::{CertStorage, StorageType};

const SIBLING_EXTENSIONS: [&str; 4] = ["crt", "key", "issuer.crt", "json"];

pub struct LegoStorage {
    root: PathBuf,
    lock: RwLock<()>,
}

impl LegoStorage {
    pub fn new(var_dir: &Path) -> Self {
        LegoStorage {
            root: var_dir.join("lego").join("certificates"),
            lock: RwLock::new(()),
        }
    }

    fn cert_path(&self, cert_name: &str) -> PathBuf {
        self.root.join(format!("{}.pem", cert_name))
    }
}

impl CertStorage for LegoStorage {
    fn storage_type(&self) -> StorageType {
        StorageType::Lego
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
        remove_if_exists(&self.cert_path(cert_name))?;
        for ext in SIBLING_EXTENSIONS {
            remove_if_exists(&self.root.join(format!("{}.{}", cert_name, ext)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn remove_certificate_deletes_all_sibling_artifacts() {
        let dir = tempdir().unwrap();
        let storage = LegoStorage::new(dir.path());
        fs::create_dir_all(&storage.root).unwrap();

        let name = "example.com";
        fs::write(storage.root.join(format!("{}.pem", name)), "pem").unwrap();
        fs::write(storage.root.join(format!("{}.crt", name)), "crt").unwrap();
        fs::write(storage.root.join(format!("{}.key", name)), "key").unwrap();
        fs::write(storage.root.join(format!("{}.issuer.crt", name)), "issuer").unwrap();
        fs::write(storage.root.join(format!("{}.json", name)), "{}").unwrap();

        storage.remove_certificate(name).unwrap();

        for ext in ["pem", "crt", "key", "issuer.crt", "json"] {
            assert!(!storage.root.join(format!("{}.{}", name, ext)).exists());
        }
    }
}
