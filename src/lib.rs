//! sslbot-core: transactional TLS certificate automation for Nginx and
//! Apache virtual hosts on a single host.
//!
//! Given a domain and an ACME account email, the core can request a
//! certificate, rewrite the matching virtual host to serve it over TLS,
//! enable the resulting site, and reload the daemon — all inside one
//! transaction that a reverter can undo if any step fails partway
//! through. It can equally assign an already-issued certificate from one
//! of the pluggable certificate storages, or accept an uploaded PEM
//! directly.
//!
//! # Example
//!
//! ```no_run
//! use sslbot_core::acme::lego::LegoAcmeClient;
//! use sslbot_core::certmanager::{CertificateManager, IssueRequest};
//! use sslbot_core::config::AppConfig;
//! use sslbot_core::storage::default::DefaultStorage;
//! use sslbot_core::storage::StorageRegistry;
//!
//! # fn main() -> sslbot_core::Result<()> {
//! let config = AppConfig::load(None)?;
//! let acme_client = Box::new(LegoAcmeClient::new(
//!     "lego".to_string(),
//!     config.ca_server.clone(),
//!     config.var_dir.clone(),
//! ));
//! let storages = StorageRegistry::new(vec![Box::new(DefaultStorage::new(&config.var_dir))]);
//! let manager = CertificateManager::new(&config, acme_client, storages);
//!
//! manager.issue(IssueRequest {
//!     email: "admin@example.com".to_string(),
//!     server_name: "example.com".to_string(),
//!     web_server: "nginx".to_string(),
//!     challenge_type: "http".to_string(),
//!     subjects: vec!["example.com".to_string()],
//!     assign: true,
//!     prevent_reload: false,
//! })?;
//! # Ok(())
//! # }
//! ```

pub mod acme;
pub mod cert;
pub mod certmanager;
pub mod commondir;
pub mod common;
pub mod config;
pub mod deploy;
pub mod storage;
pub mod webserver;

pub use certmanager::CertificateManager;
pub use common::{CoreError, Result};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
