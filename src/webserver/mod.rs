//! Web-server configuration abstraction
//!
//! Discovers virtual hosts across the two supported dialects, normalizes
//! them into a common [`VirtualHost`] view, and exposes the targeted edits
//! (SSL directives, ACME challenge aliases, listen-port management,
//! dangerous rewrite-rule pruning) the deployer and common-dir command
//! need. Dialect-specific logic lives in [`nginx`] and [`apache`]; this
//! module holds what's shared.

pub mod apache;
pub mod ast;
pub mod domain;
pub mod hostmng;
pub mod nginx;
pub mod processmng;
pub mod reverter;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::cert::Certificate;
use crate::common::Result;
use domain::Address;

/// Which dialect a virtual host belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebServerKind {
    Nginx,
    Apache,
}

impl WebServerKind {
    /// Process names to search for when reloading this dialect's daemon.
    pub fn process_names(&self) -> &'static [&'static str] {
        match self {
            WebServerKind::Nginx => &["nginx"],
            WebServerKind::Apache => &["apache2", "httpd"],
        }
    }
}

impl std::str::FromStr for WebServerKind {
    type Err = crate::common::CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "nginx" => Ok(WebServerKind::Nginx),
            "apache" => Ok(WebServerKind::Apache),
            other => Err(crate::common::CoreError::invalid_request(format!(
                "unknown webserver code: {}",
                other
            ))),
        }
    }
}

/// Normalized view of a virtual host, merged across every config file that
/// defines it under the same server name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualHost {
    pub file_path: PathBuf,
    pub server_name: String,
    pub doc_root: String,
    pub web_server: WebServerKind,
    pub aliases: Vec<String>,
    pub ssl: bool,
    pub addresses: Vec<Address>,
    pub certificate: Option<Certificate>,
}

/// Ports a surfaced virtual host must have at least one address bound to
/// (spec.md §3 invariant 2).
const RELEVANT_PORTS: [u16; 2] = [80, 443];

/// Merge a raw, possibly-duplicated list of per-file virtual hosts into
/// one entry per unique server name, then drop any host whose name isn't
/// a plausible domain or that has no address on port 80/443.
///
/// Merge policy (spec.md §3 invariant 1): `ssl = OR(ssl)`, `doc_root` is
/// the first non-empty value seen, `addresses`/`aliases` are set-unioned.
pub fn merge_and_filter(hosts: Vec<VirtualHost>) -> Vec<VirtualHost> {
    use std::collections::HashMap;

    let mut merged: HashMap<String, VirtualHost> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for host in hosts {
        match merged.get_mut(&host.server_name) {
            Some(existing) => {
                existing.ssl |= host.ssl;
                if existing.doc_root.is_empty() {
                    existing.doc_root = host.doc_root.clone();
                }
                for addr in host.addresses {
                    if !existing.addresses.contains(&addr) {
                        existing.addresses.push(addr);
                    }
                }
                let alias_set: BTreeSet<String> = existing
                    .aliases
                    .iter()
                    .cloned()
                    .chain(host.aliases.iter().cloned())
                    .collect();
                existing.aliases = alias_set.into_iter().collect();
                existing.certificate = existing.certificate.clone().or(host.certificate);
            }
            None => {
                order.push(host.server_name.clone());
                merged.insert(host.server_name.clone(), host);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|name| merged.remove(&name))
        .filter(|host| domain::is_valid_domain(&host.server_name))
        .filter(|host| {
            host.addresses
                .iter()
                .any(|a| RELEVANT_PORTS.contains(&a.port))
        })
        .collect()
}

/// Dialect-agnostic discovery/lookup surface the certificate manager uses.
/// Concrete implementations are `nginx::NginxWebServer` and
/// `apache::ApacheWebServer`.
pub trait WebServer {
    fn kind(&self) -> WebServerKind;

    /// List every virtual host on this dialect, normalized and merged.
    fn list_vhosts(&self) -> Result<Vec<VirtualHost>>;

    /// Look up one virtual host by server name.
    fn get_vhost_by_name(&self, server_name: &str) -> Result<VirtualHost> {
        self.list_vhosts()?
            .into_iter()
            .find(|v| v.server_name == server_name || v.aliases.iter().any(|a| a == server_name))
            .ok_or_else(|| {
                crate::common::CoreError::not_found(format!("vhost not found: {}", server_name))
            })
    }

    fn sites_available(&self) -> PathBuf;
    fn sites_enabled(&self) -> PathBuf;
}

/// Best-effort basename-preserving join, used whenever a dialect needs to
/// place a sibling file next to a vhost's own config file.
pub fn sibling_path(original: &Path, suffix_before_ext: &str) -> PathBuf {
    let stem = original
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("vhost");
    let ext = original
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("conf");
    let file_name = format!("{}{}.{}", stem, suffix_before_ext, ext);
    original
        .parent()
        .map(|p| p.join(&file_name))
        .unwrap_or_else(|| PathBuf::from(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(name: &str, ssl: bool, port: u16, doc_root: &str) -> VirtualHost {
        VirtualHost {
            file_path: PathBuf::from("/etc/nginx/sites-available/x.conf"),
            server_name: name.to_string(),
            doc_root: doc_root.to_string(),
            web_server: WebServerKind::Nginx,
            aliases: vec![],
            ssl,
            addresses: vec![Address {
                is_ipv6: false,
                host: String::new(),
                port,
            }],
            certificate: None,
        }
    }

    #[test]
    fn merge_unions_ssl_and_addresses_and_keeps_first_doc_root() {
        let hosts = vec![
            host("example.com", false, 80, "/var/www/a"),
            host("example.com", true, 443, ""),
        ];
        let merged = merge_and_filter(hosts);
        assert_eq!(merged.len(), 1);
        let m = &merged[0];
        assert!(m.ssl);
        assert_eq!(m.doc_root, "/var/www/a");
        assert_eq!(m.addresses.len(), 2);
    }

    #[test]
    fn filter_drops_invalid_names_and_irrelevant_ports() {
        let hosts = vec![
            host("localhost", false, 80, "/var/www/a"),
            host("example.com", false, 8080, "/var/www/b"),
            host("example.org", false, 443, "/var/www/c"),
        ];
        let merged = merge_and_filter(hosts);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].server_name, "example.org");
    }

    #[test]
    fn sibling_path_preserves_directory_and_extension() {
        let original = Path::new("/etc/nginx/sites-available/example.com.conf");
        let ssl_path = sibling_path(original, "-ssl");
        assert_eq!(
            ssl_path,
            PathBuf::from("/etc/nginx/sites-available/example.com-ssl.conf")
        );
    }
}
