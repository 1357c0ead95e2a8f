//! Apache certificate deployer (§4.4.2)

use std::path::{Path, PathBuf};

use crate::common::fs::{check_file_exists, read_file_string, resolve_real_path, write_file};
use crate::common::{CoreError, Result};
use crate::webserver::apache::{config as apache, parser};
use crate::webserver::ast::{Ast, Dialect};
use crate::webserver::reverter::Reverter;
use crate::webserver::VirtualHost;

use super::CertificateDeployer;

pub struct ApacheDeployer {
    root: PathBuf,
}

impl ApacheDeployer {
    pub fn new(root: PathBuf) -> Self {
        ApacheDeployer { root }
    }

    fn ssl_module_enabled(&self) -> bool {
        self.root.join("mods-enabled").join("ssl.load").exists()
    }

    fn ports_conf_path(&self) -> PathBuf {
        self.root.join("ports.conf")
    }

    /// Ensure port 443 is listened for the addresses already bound by the
    /// host, appending any missing `Listen` directives into `ports.conf`'s
    /// `<IfModule mod_ssl.c>` block, backed up before the edit.
    fn ensure_ssl_port_listened(&self, reverter: &mut Reverter) -> Result<()> {
        let ports_path = self.ports_conf_path();
        if check_file_exists(&ports_path).is_err() {
            return Ok(());
        }

        let contents = read_file_string(&ports_path)?;
        let mut ports_ast = parser::parse(&contents)?;
        let existing = apache::existing_listens(&ports_ast);
        let desired = apache::compute_desired_listens(&existing);

        reverter.backup_config(&ports_path)?;
        apache::ensure_listens(&mut ports_ast, &desired);
        write_file(&ports_path, ports_ast.dump().as_bytes())?;
        Ok(())
    }
}

impl CertificateDeployer for ApacheDeployer {
    fn deploy_certificate(
        &self,
        reverter: &mut Reverter,
        vhost: &VirtualHost,
        cert_path: &Path,
        key_path: &Path,
    ) -> Result<(PathBuf, PathBuf)> {
        if !self.ssl_module_enabled() {
            return Err(CoreError::precondition(
                "mod_ssl is not enabled on this host",
            ));
        }

        let contents = read_file_string(&vhost.file_path)?;
        let ast = parser::parse(&contents)?;

        let blocks = apache::find_vhost_blocks_by_name(&ast, &vhost.server_name);
        if blocks.is_empty() {
            return Err(CoreError::not_found(format!(
                "no VirtualHost block found for {}",
                vhost.server_name
            )));
        }

        let ssl_block = blocks
            .iter()
            .copied()
            .find(|&b| apache::has_ssl_vhost(&ast, b));

        let (ssl_file_path, mut ssl_ast, ssl_block_id) = match ssl_block {
            Some(block) => {
                reverter.backup_config(&vhost.file_path)?;
                (vhost.file_path.clone(), ast, block)
            }
            None => {
                let source_block = blocks[0];
                let real_path =
                    resolve_real_path(&vhost.file_path).unwrap_or_else(|_| vhost.file_path.clone());
                let clone_path = apache::ssl_clone_path(&real_path);

                let mut clone_ast = Ast::new(Dialect::Apache);
                let new_root = ast.clone_subtree_into(source_block, &mut clone_ast);
                apache::rewrite_vhost_to_ssl(&mut clone_ast, new_root);
                apache::wrap_in_ifmodule_ssl(&mut clone_ast, new_root);

                write_file(&clone_path, clone_ast.dump().as_bytes())?;
                reverter.add_config_to_deletion(clone_path.clone());

                (clone_path, clone_ast, new_root)
            }
        };

        apache::set_ssl_directives(&mut ssl_ast, ssl_block_id, cert_path, key_path);
        apache::remove_dangerous_rewrites(&mut ssl_ast, ssl_block_id);
        write_file(&ssl_file_path, ssl_ast.dump().as_bytes())?;

        self.ensure_ssl_port_listened(reverter)?;

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
            web_server: crate::webserver::WebServerKind::Apache,
            aliases: vec![],
            ssl: false,
            addresses: vec![],
            certificate: None,
        }
    }

    fn enable_ssl_module(root: &Path) {
        fs::create_dir_all(root.join("mods-enabled")).unwrap();
        fs::write(root.join("mods-enabled").join("ssl.load"), "").unwrap();
    }

    #[test]
    fn deploy_fails_precondition_when_ssl_module_disabled() {
        let dir = tempdir().unwrap();
        let conf = dir.path().join("example2.com.conf");
        fs::write(
            &conf,
            "<VirtualHost *:80>\nServerName example2.com\n</VirtualHost>\n",
        )
        .unwrap();

        let deployer = ApacheDeployer::new(dir.path().to_path_buf());
        let mut reverter = Reverter::new(HostManager::new());
        let result = deployer.deploy_certificate(
            &mut reverter,
            &vhost(conf, "example2.com"),
            Path::new("/cert.pem"),
            Path::new("/key.pem"),
        );
        assert!(matches!(result, Err(CoreError::Precondition(_))));
    }

    #[test]
    fn deploy_synthesizes_ssl_clone_wrapped_in_ifmodule() {
        let dir = tempdir().unwrap();
        enable_ssl_module(dir.path());
        fs::write(dir.path().join("ports.conf"), "Listen 80\n").unwrap();

        let conf = dir.path().join("example2.com.conf");
        fs::write(
            &conf,
            "<VirtualHost *:80>\nServerName example2.com\nDocumentRoot /var/www/example2\n</VirtualHost>\n",
        )
        .unwrap();

        let deployer = ApacheDeployer::new(dir.path().to_path_buf());
        let mut reverter = Reverter::new(HostManager::new());
        let (ssl_path, original_path) = deployer
            .deploy_certificate(
                &mut reverter,
                &vhost(conf.clone(), "example2.com"),
                Path::new("/cert.pem"),
                Path::new("/key.pem"),
            )
            .unwrap();

        assert_eq!(original_path, conf);
        let dumped = fs::read_to_string(&ssl_path).unwrap();
        assert!(dumped.contains("<IfModule mod_ssl.c>"));
        assert!(dumped.contains("*:443"));
        assert!(dumped.contains("SSLEngine on"));

        let ports = fs::read_to_string(dir.path().join("ports.conf")).unwrap();
        assert!(ports.contains("Listen 443"));
    }

    #[test]
    fn deploy_removes_dangerous_rewrites_from_the_ssl_block() {
        let dir = tempdir().unwrap();
        enable_ssl_module(dir.path());

        let conf = dir.path().join("example2.com.conf");
        fs::write(
            &conf,
            r#"<VirtualHost *:443>
ServerName example2.com
SSLEngine on
RewriteCond %{HTTPS} off
RewriteRule ^(.*)$ https://%{HTTP_HOST}%{REQUEST_URI}
</VirtualHost>
"#,
        )
        .unwrap();

        let deployer = ApacheDeployer::new(dir.path().to_path_buf());
        let mut reverter = Reverter::new(HostManager::new());
        let (ssl_path, _) = deployer
            .deploy_certificate(
                &mut reverter,
                &vhost(conf.clone(), "example2.com"),
                Path::new("/cert.pem"),
                Path::new("/key.pem"),
            )
            .unwrap();

        let dumped = fs::read_to_string(&ssl_path).unwrap();
        assert!(!dumped.contains("RewriteRule"));
        assert!(!dumped.contains("RewriteCond"));
    }
}
