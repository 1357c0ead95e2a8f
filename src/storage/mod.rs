//! Certificate Storage Registry (§4.7)
//!
//! A pluggable set of on-disk certificate stores behind one interface:
//! the bundled PEM directory the core itself writes to, and two external
//! ACME clients' own layouts (`lego`, `certbot`). The registry maps a
//! [`StorageType`] to the concrete implementation.

pub mod certbot;
pub mod default;
pub mod lego;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::cert::Certificate;
use crate::common::{CoreError, Result};

/// Which on-disk layout a certificate is stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Default,
    Lego,
    Certbot,
}

impl StorageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageType::Default => "default",
            StorageType::Lego => "lego",
            StorageType::Certbot => "certbot",
        }
    }
}

impl std::str::FromStr for StorageType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(StorageType::Default),
            "lego" => Ok(StorageType::Lego),
            "certbot" => Ok(StorageType::Certbot),
            other => Err(CoreError::invalid_request(format!(
                "unknown storage type: {}",
                other
            ))),
        }
    }
}

/// One entry of a storage listing, keyed `"{storageType}__{certName}"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertStorageItem {
    pub storage_type: StorageType,
    pub cert_name: String,
    pub certificate: Certificate,
}

impl CertStorageItem {
    pub fn key(&self) -> String {
        format!("{}__{}", self.storage_type.as_str(), self.cert_name)
    }
}

/// Common contract every certificate storage implements.
pub trait CertStorage: Send + Sync {
    fn storage_type(&self) -> StorageType;

    fn get_certificate(&self, cert_name: &str) -> Result<Certificate>;

    fn get_certificate_as_string(&self, cert_name: &str) -> Result<(PathBuf, String)>;

    fn get_certificates(&self) -> Result<HashMap<String, Certificate>>;

    /// Returns `(certPath, keyPath)`.
    fn get_certificate_path(&self, cert_name: &str) -> Result<(PathBuf, PathBuf)>;

    fn remove_certificate(&self, cert_name: &str) -> Result<()>;

    /// Write PEM bytes for `cert_name` into the storage. Only the default
    /// storage supports direct upload (§4.6 Upload); the external-client
    /// storages are populated by their own tools.
    fn add_certificate(&self, cert_name: &str, pem: &[u8]) -> Result<PathBuf> {
        let _ = (cert_name, pem);
        Err(CoreError::invalid_request(format!(
            "{} storage does not support direct upload",
            self.storage_type().as_str()
        )))
    }
}

/// Mapping from [`StorageType`] to its concrete instance, built once at
/// startup from [`crate::config::AppConfig`].
pub struct StorageRegistry {
    storages: HashMap<StorageType, Box<dyn CertStorage>>,
}

impl StorageRegistry {
    pub fn new(storages: Vec<Box<dyn CertStorage>>) -> Self {
        let mut map = HashMap::new();
        for storage in storages {
            map.insert(storage.storage_type(), storage);
        }
        StorageRegistry { storages: map }
    }

    pub fn get(&self, storage_type: StorageType) -> Result<&dyn CertStorage> {
        self.storages
            .get(&storage_type)
            .map(|b| b.as_ref())
            .ok_or_else(|| {
                CoreError::not_found(format!(
                    "storage not registered: {}",
                    storage_type.as_str()
                ))
            })
    }
}
