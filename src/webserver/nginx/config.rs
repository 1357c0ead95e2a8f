//! Nginx virtual-host discovery and AST edits
//!
//! `NginxWebServer` discovers vhosts by parsing every file under
//! `sites-available`. The free functions below operate directly on an
//! [`Ast`] and are shared by the deployer (§4.4.1) and the common-dir
//! command (§4.5).

use std::fs;
use std::path::{Path, PathBuf};

use crate::common::fs::read_file_string;
use crate::common::{CoreError, Result};
use crate::webserver::ast::{Ast, Node, NodeId};
use crate::webserver::domain::{parse_nginx_listen, Address};
use crate::webserver::{sibling_path, merge_and_filter, VirtualHost, WebServer, WebServerKind};

use super::parser;

/// Nginx dialect binding, rooted at an installation directory expected to
/// contain `sites-available` and `sites-enabled`.
#[derive(Debug, Clone)]
pub struct NginxWebServer {
    root: PathBuf,
}

impl NginxWebServer {
    pub fn new(root: PathBuf) -> Self {
        NginxWebServer { root }
    }

    fn vhosts_from_file(&self, path: &Path) -> Result<Vec<VirtualHost>> {
        let contents = read_file_string(path)?;
        let ast = parser::parse(&contents)?;
        let mut hosts = Vec::new();

        for block in ast.find_blocks("server") {
            if let Some(vhost) = server_block_to_vhost(&ast, block, path) {
                hosts.push(vhost);
            }
        }
        Ok(hosts)
    }
}

impl WebServer for NginxWebServer {
    fn kind(&self) -> WebServerKind {
        WebServerKind::Nginx
    }

    fn list_vhosts(&self) -> Result<Vec<VirtualHost>> {
        let mut hosts = Vec::new();
        let dir = self.sites_available();
        let entries = fs::read_dir(&dir).map_err(CoreError::from)?;

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("conf") {
                continue;
            }
            match self.vhosts_from_file(&path) {
                Ok(mut found) => hosts.append(&mut found),
                Err(e) => log::warn!("skipping unparsable vhost {}: {}", path.display(), e),
            }
        }

        Ok(merge_and_filter(hosts))
    }

    fn sites_available(&self) -> PathBuf {
        self.root.join("sites-available")
    }

    fn sites_enabled(&self) -> PathBuf {
        self.root.join("sites-enabled")
    }
}

fn server_block_to_vhost(ast: &Ast, block: NodeId, file_path: &Path) -> Option<VirtualHost> {
    let names = ast.find_directives(block, "server_name");
    let mut name_args: Vec<String> = Vec::new();
    for id in names {
        name_args.extend(ast.node(id).args().iter().cloned());
    }
    let server_name = name_args.first()?.clone();
    let aliases = name_args.into_iter().skip(1).collect();

    let doc_root = ast
        .find_directives(block, "root")
        .first()
        .and_then(|&id| ast.node(id).args().first().cloned())
        .unwrap_or_default();

    let mut addresses: Vec<Address> = Vec::new();
    let mut ssl = false;
    for id in ast.find_directives(block, "listen") {
        let args = ast.node(id).args().to_vec();
        if let Some((addr, is_ssl)) = parse_nginx_listen(&args) {
            ssl |= is_ssl;
            addresses.push(addr);
        }
    }

    Some(VirtualHost {
        file_path: file_path.to_path_buf(),
        server_name,
        doc_root,
        web_server: WebServerKind::Nginx,
        aliases,
        ssl,
        addresses,
        certificate: None,
    })
}

/// Find every `server` block (anywhere in the tree) whose `server_name`
/// directive's arguments include `name`.
pub fn find_server_blocks_by_name(ast: &Ast, name: &str) -> Vec<NodeId> {
    ast.find_blocks("server")
        .into_iter()
        .filter(|&block| {
            ast.find_directives(block, "server_name").iter().any(|&id| {
                ast.node(id)
                    .args()
                    .iter()
                    .any(|a| a.eq_ignore_ascii_case(name))
            })
        })
        .collect()
}

/// True if any `listen` directive on `block` carries the `ssl` flag.
pub fn has_ssl_listen(ast: &Ast, block: NodeId) -> bool {
    ast.find_directives(block, "listen").iter().any(|&id| {
        parse_nginx_listen(ast.node(id).args())
            .map(|(_, ssl)| ssl)
            .unwrap_or(false)
    })
}

/// Rewrite every `listen` directive on `block` to `443 ssl`, preserving
/// a bound host if one was present (`host:443 ssl`).
pub fn rewrite_listens_to_ssl(ast: &mut Ast, block: NodeId) {
    let listens = ast.find_directives(block, "listen");
    for id in listens {
        let args = ast.node(id).args().to_vec();
        let endpoint = args.first().cloned().unwrap_or_default();
        let host_prefix = endpoint.rsplit_once(':').map(|(h, _)| h.to_string());

        let new_endpoint = match host_prefix {
            Some(host) if !host.is_empty() => format!("{}:443", host),
            _ => "443".to_string(),
        };

        if let Node::Directive { args, .. } = ast.node_mut(id) {
            *args = vec![new_endpoint, "ssl".to_string()];
        }
    }
}

/// Remove any existing `ssl_certificate`/`ssl_certificate_key` directives
/// on `block` and add exactly one of each with absolute paths.
pub fn set_ssl_directives(ast: &mut Ast, block: NodeId, cert_path: &Path, key_path: &Path) {
    ast.remove_children_where(block, |n| {
        !n.is_block()
            && (n.name().eq_ignore_ascii_case("ssl_certificate")
                || n.name().eq_ignore_ascii_case("ssl_certificate_key"))
    });
    ast.add_directive(
        block,
        "ssl_certificate",
        vec![cert_path.display().to_string()],
    );
    ast.add_directive(
        block,
        "ssl_certificate_key",
        vec![key_path.display().to_string()],
    );
}

/// The path a synthesized SSL clone of `original` should live at:
/// `<stem>-ssl.conf` next to it.
pub fn ssl_clone_path(original: &Path) -> PathBuf {
    sibling_path(original, "-ssl")
}

/// True if `block` already has the ACME common-dir `location` block.
pub fn has_acme_location(ast: &Ast, block: NodeId) -> bool {
    acme_location_id(ast, block).is_some()
}

fn acme_location_id(ast: &Ast, block: NodeId) -> Option<NodeId> {
    if let Node::Block { children, .. } = ast.node(block) {
        for &id in children {
            let node = ast.node(id);
            if node.is_block()
                && node.name().eq_ignore_ascii_case("location")
                && node
                    .args()
                    .iter()
                    .any(|a| a.contains(".well-known/acme-challenge"))
            {
                return Some(id);
            }
        }
    }
    None
}

/// Add `location ^~ /.well-known/acme-challenge/ { root <common_dir>; ... }`
/// to `block` if not already present.
pub fn add_acme_location(ast: &mut Ast, block: NodeId, common_dir: &Path) {
    if acme_location_id(ast, block).is_some() {
        return;
    }
    let location = ast.add_block(
        block,
        "location",
        vec![
            "^~".to_string(),
            "/.well-known/acme-challenge/".to_string(),
        ],
    );
    ast.add_directive(
        location,
        "root",
        vec![common_dir.display().to_string()],
    );
    ast.add_directive(
        location,
        "default_type",
        vec!["text/plain".to_string()],
    );
}

/// Remove the ACME common-dir `location` block from `block`, if present.
pub fn remove_acme_location(ast: &mut Ast, block: NodeId) {
    ast.remove_children_where(block, |n| {
        n.is_block()
            && n.name().eq_ignore_ascii_case("location")
            && n.args()
                .iter()
                .any(|a| a.contains(".well-known/acme-challenge"))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webserver::ast::Dialect;
    use std::fs;
    use tempfile::tempdir;

    fn write_conf(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn list_vhosts_parses_and_merges_across_files() {
        let dir = tempdir().unwrap();
        let available = dir.path().join("sites-available");
        fs::create_dir_all(&available).unwrap();

        write_conf(
            &available,
            "example.com.conf",
            r#"
            server {
                listen 80;
                server_name example.com www.example.com;
                root /var/www/example;
            }
            "#,
        );

        let server = NginxWebServer::new(dir.path().to_path_buf());
        let hosts = server.list_vhosts().unwrap();
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].server_name, "example.com");
        assert_eq!(hosts[0].doc_root, "/var/www/example");
        assert!(!hosts[0].ssl);
    }

    #[test]
    fn find_server_blocks_by_name_matches_case_insensitively() {
        let input = r#"
            server {
                listen 80;
                server_name Example.COM;
            }
        "#;
        let ast = parser::parse(input).unwrap();
        let blocks = find_server_blocks_by_name(&ast, "example.com");
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn rewrite_listens_to_ssl_preserves_bound_host() {
        let mut ast = Ast::new(Dialect::Nginx);
        let block = ast.alloc(Node::Block {
            name: "server".to_string(),
            args: vec![],
            children: vec![],
            comment: None,
        });
        ast.push_top_level(block);
        ast.add_directive(block, "listen", vec!["10.0.0.1:80".to_string()]);

        rewrite_listens_to_ssl(&mut ast, block);

        let listens = ast.find_directives(block, "listen");
        assert_eq!(
            ast.node(listens[0]).args(),
            &["10.0.0.1:443".to_string(), "ssl".to_string()]
        );
    }

    #[test]
    fn set_ssl_directives_replaces_existing_entries() {
        let mut ast = Ast::new(Dialect::Nginx);
        let block = ast.alloc(Node::Block {
            name: "server".to_string(),
            args: vec![],
            children: vec![],
            comment: None,
        });
        ast.push_top_level(block);
        ast.add_directive(block, "ssl_certificate", vec!["/old/cert.pem".to_string()]);

        set_ssl_directives(
            &mut ast,
            block,
            Path::new("/new/cert.pem"),
            Path::new("/new/key.pem"),
        );

        let certs = ast.find_directives(block, "ssl_certificate");
        assert_eq!(certs.len(), 1);
        assert_eq!(
            ast.node(certs[0]).args(),
            &["/new/cert.pem".to_string()]
        );
        let keys = ast.find_directives(block, "ssl_certificate_key");
        assert_eq!(keys.len(), 1);
    }

    #[test]
    fn acme_location_add_is_idempotent_and_removable() {
        let mut ast = Ast::new(Dialect::Nginx);
        let block = ast.alloc(Node::Block {
            name: "server".to_string(),
            args: vec![],
            children: vec![],
            comment: None,
        });
        ast.push_top_level(block);

        add_acme_location(&mut ast, block, Path::new("/var/www/acme"));
        add_acme_location(&mut ast, block, Path::new("/var/www/acme"));
        let locations: Vec<_> = ast
            .find_blocks("location")
            .into_iter()
            .filter(|&id| ast.node(id).args().iter().any(|a| a.contains("acme-challenge")))
            .collect();
        assert_eq!(locations.len(), 1);

        remove_acme_location(&mut ast, block);
        let locations = ast.find_blocks("location");
        assert!(locations.is_empty());
    }
}
