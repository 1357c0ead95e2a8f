//! Configuration types
//!
//! `AppConfig` holds every key the core reads, regardless of how it was
//! sourced (JSON file, environment variable, or CLI flag). Field names
//! mirror the environment keys named in the specification.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_port() -> u16 {
    5600
}

fn default_var_dir() -> PathBuf {
    PathBuf::from("/var/lib/sslbot")
}

fn default_ca_server() -> String {
    "https://acme-v02.api.letsencrypt.org/directory".to_string()
}

fn default_nginx_root() -> PathBuf {
    PathBuf::from("/etc/nginx")
}

fn default_nginx_acme_common_dir() -> PathBuf {
    PathBuf::from("/var/www/acme")
}

fn default_apache_root() -> PathBuf {
    PathBuf::from("/etc/apache2")
}

fn default_apache_acme_common_dir() -> PathBuf {
    PathBuf::from("/var/www/acme")
}

fn default_certbot_bin() -> String {
    "certbot".to_string()
}

fn default_certbot_work_dir() -> PathBuf {
    PathBuf::from("/etc/letsencrypt/live")
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// TCP port the (external) request dispatcher listens on. The core
    /// does not bind this itself; it is carried through for the `serve`
    /// CLI subcommand to report.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Shared secret required by the (external) request dispatcher and by
    /// `generate-token`. Never logged.
    #[serde(default)]
    pub token: Option<String>,

    /// Root directory for on-disk certificate storages.
    #[serde(default = "default_var_dir")]
    pub var_dir: PathBuf,

    /// ACME directory URL passed through to `lego`.
    #[serde(default = "default_ca_server")]
    pub ca_server: String,

    /// Nginx installation root (expects `sites-available`/`sites-enabled`
    /// beneath it).
    #[serde(default = "default_nginx_root")]
    pub nginx_root: PathBuf,

    /// Webroot used for the Nginx ACME HTTP-01 common directory.
    #[serde(default = "default_nginx_acme_common_dir")]
    pub nginx_acme_common_dir: PathBuf,

    /// Apache installation root (expects `sites-available`/`sites-enabled`
    /// beneath it).
    #[serde(default = "default_apache_root")]
    pub apache_root: PathBuf,

    /// Webroot used for the Apache ACME HTTP-01 common directory.
    #[serde(default = "default_apache_acme_common_dir")]
    pub apache_acme_common_dir: PathBuf,

    /// Whether the certbot storage/ACME client is enabled.
    #[serde(default)]
    pub certbot_enabled: bool,

    /// Path to the certbot binary.
    #[serde(default = "default_certbot_bin")]
    pub certbot_bin: String,

    /// Certbot's working directory (`/etc/letsencrypt/live` by default).
    #[serde(default = "default_certbot_work_dir")]
    pub certbot_work_dir: PathBuf,

    /// Log level (`error`, `warn`, `info`, `debug`, `trace`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            port: default_port(),
            token: None,
            var_dir: default_var_dir(),
            ca_server: default_ca_server(),
            nginx_root: default_nginx_root(),
            nginx_acme_common_dir: default_nginx_acme_common_dir(),
            apache_root: default_apache_root(),
            apache_acme_common_dir: default_apache_acme_common_dir(),
            certbot_enabled: false,
            certbot_bin: default_certbot_bin(),
            certbot_work_dir: default_certbot_work_dir(),
            log_level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.port, 5600);
        assert!(!config.certbot_enabled);
        assert_eq!(config.log_level, "info");
    }
}
