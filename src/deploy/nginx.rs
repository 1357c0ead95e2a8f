//! Nginx certificate deployer (§4.4.1)

use std::path::{Path, PathBuf};

use crate::common::fs::{read_file_string, resolve_real_path, write_file};
use crate::common::{CoreError, Result};
use crate::webserver::ast::{Ast, Dialect};
use crate::webserver::nginx::{config as ngx, parser};
use crate::webserver::reverter::Reverter;
use crate::webserver::VirtualHost;

use super::CertificateDeployer;

#[derive(Debug, Default, Clone, Copy)]
pub struct NginxDeployer;

impl NginxDeployer {
    pub fn new() -> Self {
        NginxDeployer
    }
}

impl CertificateDeployer for NginxDeployer {
    fn deploy_certificate(
        &self,
        reverter: &mut Reverter,
        vhost: &VirtualHost,
        cert_path: &Path,
        key_path: &Path,
    ) -> Result<(PathBuf, PathBuf)> {
        let contents = read_file_string(&vhost.file_path)?;
        let ast = parser::parse(&contents)?;

        let blocks = ngx::find_server_blocks_by_name(&ast, &vhost.server_name);
        if blocks.is_empty() {
            return Err(CoreError::not_found(format!(
                "no server block found for {}",
                vhost.server_name
            )));
        }

        let ssl_block = blocks.iter().copied().find(|&b| ngx::has_ssl_listen(&ast, b));

        let (ssl_file_path, mut ssl_ast, ssl_block_id) = match ssl_block {
            Some(block) => {
                reverter.backup_config(&vhost.file_path)?;
                (vhost.file_path.clone(), ast, block)
            }
            None => {
                let source_block = blocks[0];
                let real_path = resolve_real_path(&vhost.file_path).unwrap_or_else(|_| vhost.file_path.clone());
                let clone_path = ngx::ssl_clone_path(&real_path);

                let mut clone_ast = Ast::new(Dialect::Nginx);
                let new_root = ast.clone_subtree_into(source_block, &mut clone_ast);
                clone_ast.push_top_level(new_root);
                ngx::rewrite_listens_to_ssl(&mut clone_ast, new_root);

                write_file(&clone_path, clone_ast.dump().as_bytes())?;
                reverter.add_config_to_deletion(clone_path.clone());

                (clone_path, clone_ast, new_root)
            }
        };

        ngx::set_ssl_directives(&mut ssl_ast, ssl_block_id, cert_path, key_path);
        write_file(&ssl_file_path, ssl_ast.dump().as_bytes())?;

        Ok((ssl_file_path, vhost.file_path.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webserver::hostmng::HostManager;
    use std::fs;
    use tempfile::tempdir;

    fn vhost(path: PathBuf, name: &str) -> VirtualHost {
        VirtualHost {
            file_path: path,
            server_name: name.to_string(),
            doc_root: String::new(),
            web_server: crate::webserver::WebServerKind::Nginx,
            aliases: vec![],
            ssl: false,
            addresses: vec![],
            certificate: None,
        }
    }

    #[test]
    fn deploy_synthesizes_an_ssl_clone_when_none_exists() {
        let dir = tempdir().unwrap();
        let conf = dir.path().join("example3.com.conf");
        fs::write(
            &conf,
            r#"
            server {
                listen 80;
                server_name example3.com;
                root /var/www/example3;
            }
            "#,
        )
        .unwrap();

        let mut reverter = Reverter::new(HostManager::new());
        let deployer = NginxDeployer::new();
        let (ssl_path, original_path) = deployer
            .deploy_certificate(
                &mut reverter,
                &vhost(conf.clone(), "example3.com"),
                Path::new("/var/lib/sslbot/example.com.crt"),
                Path::new("/var/lib/sslbot/example.com.key"),
            )
            .unwrap();

        assert_eq!(original_path, conf);
        assert!(ssl_path.to_string_lossy().ends_with("example3.com-ssl.conf"));
        let dumped = fs::read_to_string(&ssl_path).unwrap();
        assert!(dumped.contains("443 ssl"));
        assert!(dumped.contains("ssl_certificate "));
        assert!(dumped.contains("ssl_certificate_key "));
        // original untouched
        let original_contents = fs::read_to_string(&conf).unwrap();
        assert!(!original_contents.contains("ssl_certificate"));
    }

    #[test]
    fn deploy_amends_an_existing_ssl_block_without_cloning() {
        let dir = tempdir().unwrap();
        let conf = dir.path().join("example2.com.conf");
        fs::write(
            &conf,
            r#"
            server {
                listen 80;
                server_name example2.com;
            }
            server {
                listen 443 ssl;
                server_name example2.com;
                ssl_certificate /old/cert.pem;
                ssl_certificate_key /old/key.pem;
            }
            "#,
        )
        .unwrap();

        let mut reverter = Reverter::new(HostManager::new());
        let deployer = NginxDeployer::new();
        let (ssl_path, _) = deployer
            .deploy_certificate(
                &mut reverter,
                &vhost(conf.clone(), "example2.com"),
                Path::new("/new/cert.pem"),
                Path::new("/new/key.pem"),
            )
            .unwrap();

        assert_eq!(ssl_path, conf);
        let sibling = ngx::ssl_clone_path(&conf);
        assert!(!sibling.exists());

        let dumped = fs::read_to_string(&conf).unwrap();
        assert!(dumped.contains("/new/cert.pem"));
        assert!(!dumped.contains("/old/cert.pem"));
    }
}
