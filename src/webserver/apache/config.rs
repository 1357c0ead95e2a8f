//! Apache virtual-host discovery and AST edits
//!
//! `ApacheWebServer` discovers vhosts by parsing every file under
//! `sites-available`. The free functions below operate on an [`Ast`] and
//! are shared by the deployer (§4.4.2) and the common-dir command (§4.5).

use std::fs;
use std::path::{Path, PathBuf};

use crate::common::fs::read_file_string;
use crate::common::{CoreError, Result};
use crate::webserver::ast::{Ast, Dialect, Node, NodeId};
use crate::webserver::domain::{format_apache_listen, parse_apache_listen, Address};
use crate::webserver::{merge_and_filter, sibling_path, VirtualHost, WebServer, WebServerKind};

use super::parser;

/// Apache dialect binding, rooted at an installation directory expected
/// to contain `sites-available`, `sites-enabled`, `mods-enabled`, and
/// `ports.conf`.
#[derive(Debug, Clone)]
pub struct ApacheWebServer {
    root: PathBuf,
}

impl ApacheWebServer {
    pub fn new(root: PathBuf) -> Self {
        ApacheWebServer { root }
    }

    pub fn ports_conf_path(&self) -> PathBuf {
        self.root.join("ports.conf")
    }

    /// True if `mods-enabled/ssl.load` exists, mirroring `a2enmod ssl`.
    pub fn ssl_module_enabled(&self) -> bool {
        self.root.join("mods-enabled").join("ssl.load").exists()
    }

    fn vhosts_from_file(&self, path: &Path) -> Result<Vec<VirtualHost>> {
        let contents = read_file_string(path)?;
        let ast = parser::parse(&contents)?;
        let mut hosts = Vec::new();

        for block in ast.find_blocks("VirtualHost") {
            if let Some(vhost) = vhost_block_to_vhost(&ast, block, path) {
                hosts.push(vhost);
            }
        }
        Ok(hosts)
    }
}

impl WebServer for ApacheWebServer {
    fn kind(&self) -> WebServerKind {
        WebServerKind::Apache
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

fn vhost_block_to_vhost(ast: &Ast, block: NodeId, file_path: &Path) -> Option<VirtualHost> {
    let server_name = ast
        .find_directives(block, "ServerName")
        .first()
        .and_then(|&id| ast.node(id).args().first().cloned())?;

    let aliases = ast
        .find_directives(block, "ServerAlias")
        .iter()
        .flat_map(|&id| ast.node(id).args().iter().cloned())
        .collect();

    let doc_root = ast
        .find_directives(block, "DocumentRoot")
        .first()
        .and_then(|&id| ast.node(id).args().first().cloned())
        .unwrap_or_default();

    let address = ast
        .node(block)
        .args()
        .first()
        .and_then(|a| parse_apache_listen(a));
    let mut addresses = Vec::new();
    let mut ssl = false;
    if let Some(addr) = address {
        ssl |= addr.port == 443;
        addresses.push(addr);
    }
    ssl |= !ast.find_directives(block, "SSLEngine").is_empty();

    Some(VirtualHost {
        file_path: file_path.to_path_buf(),
        server_name,
        doc_root,
        web_server: WebServerKind::Apache,
        aliases,
        ssl,
        addresses,
        certificate: None,
    })
}

/// Find every `VirtualHost` block (anywhere in the tree) whose
/// `ServerName` matches `name`.
pub fn find_vhost_blocks_by_name(ast: &Ast, name: &str) -> Vec<NodeId> {
    ast.find_blocks("VirtualHost")
        .into_iter()
        .filter(|&block| {
            ast.find_directives(block, "ServerName").iter().any(|&id| {
                ast.node(id)
                    .args()
                    .first()
                    .map(|a| a.eq_ignore_ascii_case(name))
                    .unwrap_or(false)
            })
        })
        .collect()
}

/// True if `block` is already bound to port 443 or carries `SSLEngine`.
pub fn has_ssl_vhost(ast: &Ast, block: NodeId) -> bool {
    let port_443 = ast
        .node(block)
        .args()
        .first()
        .and_then(|a| parse_apache_listen(a))
        .map(|addr| addr.port == 443)
        .unwrap_or(false);
    port_443 || !ast.find_directives(block, "SSLEngine").is_empty()
}

/// Rewrite `block`'s own `<VirtualHost ip:port>` argument to bind port 443
/// instead, preserving the bound host (or `*`) if present.
pub fn rewrite_vhost_to_ssl(ast: &mut Ast, block: NodeId) {
    if let Node::Block { args, .. } = ast.node_mut(block) {
        if let Some(first) = args.first_mut() {
            if let Some(addr) = parse_apache_listen(first) {
                *first = format_apache_listen(&Address {
                    is_ipv6: addr.is_ipv6,
                    host: addr.host,
                    port: 443,
                });
            } else {
                *first = "*:443".to_string();
            }
        } else {
            args.push("*:443".to_string());
        }
    }
}

/// Delete any existing `SSLCertificateChainFile`; recreate `SSLEngine on`,
/// `SSLCertificateKeyFile`, `SSLCertificateFile` as single-valued
/// directives.
pub fn set_ssl_directives(ast: &mut Ast, block: NodeId, cert_path: &Path, key_path: &Path) {
    ast.remove_children_where(block, |n| {
        !n.is_block()
            && (n.name().eq_ignore_ascii_case("SSLCertificateChainFile")
                || n.name().eq_ignore_ascii_case("SSLEngine")
                || n.name().eq_ignore_ascii_case("SSLCertificateKeyFile")
                || n.name().eq_ignore_ascii_case("SSLCertificateFile"))
    });
    ast.add_directive(block, "SSLEngine", vec!["on".to_string()]);
    ast.add_directive(
        block,
        "SSLCertificateKeyFile",
        vec![key_path.display().to_string()],
    );
    ast.add_directive(
        block,
        "SSLCertificateFile",
        vec![cert_path.display().to_string()],
    );
}

/// True if `block` already has the ACME common-dir `Alias` directive.
pub fn has_acme_alias(ast: &Ast, block: NodeId) -> bool {
    ast.find_directives(block, "Alias")
        .iter()
        .any(|&id| {
            ast.node(id)
                .args()
                .first()
                .map(|a| a == "/.well-known/acme-challenge")
                .unwrap_or(false)
        })
}

/// Append the ACME common-dir `Alias` plus its matching `<Location>`
/// block, unless already present.
pub fn add_acme_alias(ast: &mut Ast, block: NodeId, common_dir: &Path) {
    if has_acme_alias(ast, block) {
        return;
    }
    ast.add_directive(
        block,
        "Alias",
        vec![
            "/.well-known/acme-challenge".to_string(),
            format!("{}/.well-known/acme-challenge", common_dir.display()),
        ],
    );
    let location = ast.add_block(
        block,
        "Location",
        vec!["/.well-known/acme-challenge/".to_string()],
    );
    ast.add_directive(
        location,
        "Order",
        vec!["Allow,Deny".to_string()],
    );
    ast.add_directive(location, "Allow", vec!["from".to_string(), "all".to_string()]);
    ast.add_directive(location, "Satisfy", vec!["any".to_string()]);
}

/// Remove the ACME common-dir `Alias` directive and matching `<Location>`
/// block from `block`, if present.
pub fn remove_acme_alias(ast: &mut Ast, block: NodeId) {
    ast.remove_children_where(block, |n| {
        (!n.is_block()
            && n.name().eq_ignore_ascii_case("Alias")
            && n.args()
                .first()
                .map(|a| a == "/.well-known/acme-challenge")
                .unwrap_or(false))
            || (n.is_block()
                && n.name().eq_ignore_ascii_case("Location")
                && n.args()
                    .iter()
                    .any(|a| a.contains(".well-known/acme-challenge")))
    });
}

/// Remove any `RewriteRule` whose target begins with `https://`, along
/// with its immediately preceding `RewriteCond` directives.
pub fn remove_dangerous_rewrites(ast: &mut Ast, block: NodeId) {
    loop {
        let target = ast
            .find_directives(block, "RewriteRule")
            .into_iter()
            .find(|&id| {
                ast.node(id)
                    .args()
                    .get(1)
                    .map(|target| target.starts_with("https://"))
                    .unwrap_or(false)
            });

        match target {
            Some(rule) => ast.remove_with_preceding(block, rule, |n| {
                n.name().eq_ignore_ascii_case("RewriteCond")
            }),
            None => break,
        }
    }
}

/// Wrap `block` (already allocated, not yet attached) inside a fresh
/// top-level `<IfModule mod_ssl.c>` block and attach it.
pub fn wrap_in_ifmodule_ssl(ast: &mut Ast, block: NodeId) {
    let wrapper = ast.alloc(Node::Block {
        name: "IfModule".to_string(),
        args: vec!["mod_ssl.c".to_string()],
        children: vec![block],
        comment: None,
    });
    ast.push_top_level(wrapper);
}

/// The path a synthesized SSL clone of `original` should live at:
/// `<stem>-ssl.conf` next to it.
pub fn ssl_clone_path(original: &Path) -> PathBuf {
    sibling_path(original, "-ssl")
}

/// Given the addresses an Apache `Listen` directive set already binds,
/// compute the set of `Listen` argument strings port 443 should gain: a
/// bare `443` if nothing is currently listened, otherwise `ip:443` for
/// each distinct bound IP.
pub fn compute_desired_listens(existing: &[Address]) -> Vec<String> {
    if existing.is_empty() {
        return vec!["443".to_string()];
    }
    let mut seen = std::collections::BTreeSet::new();
    for addr in existing {
        if !addr.host.is_empty() {
            seen.insert(format_apache_listen(&Address {
                is_ipv6: addr.is_ipv6,
                host: addr.host.clone(),
                port: 443,
            }));
        }
    }
    if seen.is_empty() {
        vec!["443".to_string()]
    } else {
        seen.into_iter().collect()
    }
}

/// Every address currently bound by a top-level `Listen` directive.
pub fn existing_listens(ast: &Ast) -> Vec<Address> {
    ast.top_level
        .iter()
        .filter_map(|&id| {
            let node = ast.node(id);
            if !node.is_block() && node.name().eq_ignore_ascii_case("Listen") {
                node.args().first().and_then(|a| parse_apache_listen(a))
            } else {
                None
            }
        })
        .collect()
}

/// Ensure each of `desired` appears as a `Listen` directive somewhere in
/// `ast` (existing `Listen` directives anywhere count, so repeated calls
/// with the same argument are no-ops). Missing ones are appended inside a
/// (possibly newly created) top-level `<IfModule mod_ssl.c>` block.
pub fn ensure_listens(ast: &mut Ast, desired: &[String]) {
    let present: std::collections::HashSet<String> = ast
        .walk()
        .into_iter()
        .filter_map(|id| {
            let node = ast.node(id);
            if !node.is_block() && node.name().eq_ignore_ascii_case("Listen") {
                node.args().first().cloned()
            } else {
                None
            }
        })
        .collect();

    let missing: Vec<String> = desired
        .iter()
        .filter(|d| !present.contains(*d))
        .cloned()
        .collect();
    if missing.is_empty() {
        return;
    }

    let ifmodule = ast
        .find_blocks("IfModule")
        .into_iter()
        .find(|&id| {
            ast.node(id)
                .args()
                .iter()
                .any(|a| a.eq_ignore_ascii_case("mod_ssl.c"))
        })
        .unwrap_or_else(|| {
            let id = ast.alloc(Node::Block {
                name: "IfModule".to_string(),
                args: vec!["mod_ssl.c".to_string()],
                children: Vec::new(),
                comment: None,
            });
            ast.push_top_level(id);
            id
        });

    for listen in missing {
        ast.add_directive(ifmodule, "Listen", vec![listen]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn list_vhosts_extracts_name_and_address() {
        let dir = tempdir().unwrap();
        let available = dir.path().join("sites-available");
        fs::create_dir_all(&available).unwrap();
        fs::write(
            available.join("example.com.conf"),
            r#"
            <VirtualHost *:80>
                ServerName example.com
                DocumentRoot /var/www/example
            </VirtualHost>
            "#,
        )
        .unwrap();

        let server = ApacheWebServer::new(dir.path().to_path_buf());
        let hosts = server.list_vhosts().unwrap();
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].doc_root, "/var/www/example");
        assert!(!hosts[0].ssl);
    }

    #[test]
    fn rewrite_vhost_to_ssl_preserves_wildcard_host() {
        let mut ast = Ast::new(Dialect::Apache);
        let block = ast.alloc(Node::Block {
            name: "VirtualHost".to_string(),
            args: vec!["*:80".to_string()],
            children: vec![],
            comment: None,
        });
        ast.push_top_level(block);

        rewrite_vhost_to_ssl(&mut ast, block);
        assert_eq!(ast.node(block).args(), &["*:443".to_string()]);
    }

    #[test]
    fn remove_dangerous_rewrites_strips_rule_and_preceding_cond() {
        let mut ast = Ast::new(Dialect::Apache);
        let block = ast.alloc(Node::Block {
            name: "VirtualHost".to_string(),
            args: vec!["*:80".to_string()],
            children: vec![],
            comment: None,
        });
        ast.push_top_level(block);
        ast.add_directive(
            block,
            "RewriteCond",
            vec!["%{HTTPS}".to_string(), "off".to_string()],
        );
        ast.add_directive(
            block,
            "RewriteRule",
            vec![
                "^(.*)$".to_string(),
                "https://%{HTTP_HOST}%{REQUEST_URI}".to_string(),
            ],
        );
        ast.add_directive(block, "ServerName", vec!["example.com".to_string()]);

        remove_dangerous_rewrites(&mut ast, block);

        assert!(ast.find_directives(block, "RewriteRule").is_empty());
        assert!(ast.find_directives(block, "RewriteCond").is_empty());
        assert_eq!(ast.find_directives(block, "ServerName").len(), 1);
    }

    #[test]
    fn ensure_listens_is_idempotent() {
        let mut ast = Ast::new(Dialect::Apache);
        ensure_listens(&mut ast, &["8443".to_string()]);
        ensure_listens(&mut ast, &["8443".to_string()]);

        let ifmodules = ast.find_blocks("IfModule");
        assert_eq!(ifmodules.len(), 1);
        let listens = ast.find_directives(ifmodules[0], "Listen");
        assert_eq!(listens.len(), 1);
        assert_eq!(ast.node(listens[0]).args(), &["8443".to_string()]);
    }

    #[test]
    fn compute_desired_listens_falls_back_to_bare_port_when_nothing_bound() {
        assert_eq!(compute_desired_listens(&[]), vec!["443".to_string()]);
    }

    #[test]
    fn compute_desired_listens_pairs_each_bound_ip() {
        let existing = vec![Address {
            is_ipv6: false,
            host: "10.0.0.1".to_string(),
            port: 80,
        }];
        assert_eq!(
            compute_desired_listens(&existing),
            vec!["10.0.0.1:443".to_string()]
        );
    }

    #[test]
    fn acme_alias_add_is_idempotent_and_removable() {
        let mut ast = Ast::new(Dialect::Apache);
        let block = ast.alloc(Node::Block {
            name: "VirtualHost".to_string(),
            args: vec!["*:80".to_string()],
            children: vec![],
            comment: None,
        });
        ast.push_top_level(block);

        add_acme_alias(&mut ast, block, Path::new("/var/www/html"));
        add_acme_alias(&mut ast, block, Path::new("/var/www/html"));
        assert_eq!(ast.find_directives(block, "Alias").len(), 1);
        assert_eq!(ast.find_blocks("Location").len(), 1);

        remove_acme_alias(&mut ast, block);
        assert!(ast.find_directives(block, "Alias").is_empty());
        assert!(ast.find_blocks("Location").is_empty());
    }
}
