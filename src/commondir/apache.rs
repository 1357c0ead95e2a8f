//! Apache common-directory command

use std::fs;
use std::path::{Path, PathBuf};

use crate::common::fs::{read_file_string, write_file};
use crate::common::{CoreError, Result};
use crate::webserver::apache::{config as apache, parser};
use crate::webserver::ast::{Ast, NodeId};
use crate::webserver::domain::parse_apache_listen;
use crate::webserver::hostmng::HostManager;
use crate::webserver::processmng::ProcessManager;
use crate::webserver::reverter::Reverter;
use crate::webserver::WebServerKind;

use super::{CommonDirCommand, CommonDirStatus};

/// Common-directory command for Apache, rooted at `sites-available`.
pub struct ApacheCommonDir {
    sites_available: PathBuf,
}

impl ApacheCommonDir {
    pub fn new(sites_available: PathBuf) -> Self {
        ApacheCommonDir { sites_available }
    }

    fn locate(&self, server_name: &str) -> Result<(PathBuf, Ast, NodeId)> {
        let mut on_443 = None;
        let mut on_80 = None;

        let entries = fs::read_dir(&self.sites_available).map_err(CoreError::from)?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("conf") {
                continue;
            }
            let Ok(contents) = read_file_string(&path) else {
                continue;
            };
            let Ok(ast) = parser::parse(&contents) else {
                continue;
            };

            for block in apache::find_vhost_blocks_by_name(&ast, server_name) {
                let port = ast
                    .node(block)
                    .args()
                    .first()
                    .and_then(|a| parse_apache_listen(a))
                    .map(|addr| addr.port);
                if port == Some(443) && on_443.is_none() {
                    on_443 = Some((path.clone(), ast.clone(), block));
                }
                if port == Some(80) && on_80.is_none() {
                    on_80 = Some((path.clone(), ast.clone(), block));
                }
            }
        }

        on_443.or(on_80).ok_or_else(|| {
            CoreError::precondition(format!(
                "host {} does not exist on port 80 or 443",
                server_name
            ))
        })
    }
}

impl CommonDirCommand for ApacheCommonDir {
    fn query(&self, server_name: &str) -> Result<CommonDirStatus> {
        let (_, ast, block) = self.locate(server_name)?;
        let enabled = apache::has_acme_alias(&ast, block);
        let root = ast
            .find_directives(block, "DocumentRoot")
            .first()
            .and_then(|&id| ast.node(id).args().first().cloned())
            .unwrap_or_default();
        Ok(CommonDirStatus { enabled, root })
    }

    fn enable(&self, server_name: &str, common_dir: &Path) -> Result<()> {
        let (path, mut ast, block) = self.locate(server_name)?;
        if apache::has_acme_alias(&ast, block) {
            return Ok(());
        }

        let mut reverter = Reverter::new(HostManager::new());
        reverter.backup_config(&path)?;
        apache::add_acme_alias(&mut ast, block, common_dir);

        commit_or_rollback(&path, &ast, &mut reverter)
    }

    fn disable(&self, server_name: &str) -> Result<()> {
        let (path, mut ast, block) = self.locate(server_name)?;
        if !apache::has_acme_alias(&ast, block) {
            return Ok(());
        }

        let mut reverter = Reverter::new(HostManager::new());
        reverter.backup_config(&path)?;
        apache::remove_acme_alias(&mut ast, block);

        commit_or_rollback(&path, &ast, &mut reverter)
    }
}

fn commit_or_rollback(path: &Path, ast: &Ast, reverter: &mut Reverter) -> Result<()> {
    if let Err(e) = write_file(path, ast.dump().as_bytes()) {
        reverter.rollback()?;
        return Err(e);
    }
    if let Err(e) = ProcessManager::new().reload(WebServerKind::Apache.process_names()) {
        reverter.rollback()?;
        return Err(e);
    }
    reverter.commit();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn query_reports_disabled_and_doc_root_for_port_80_host() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("example2.com.conf"),
            r#"
            <VirtualHost *:80>
                ServerName example2.com
                DocumentRoot /var/www/html
            </VirtualHost>
            "#,
        )
        .unwrap();

        let cmd = ApacheCommonDir::new(dir.path().to_path_buf());
        let status = cmd.query("example2.com").unwrap();
        assert!(!status.enabled);
        assert_eq!(status.root, "/var/www/html");
    }

    #[test]
    fn query_prefers_port_443_block_when_both_exist() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("example2.com.conf"),
            r#"
            <VirtualHost *:80>
                ServerName example2.com
                DocumentRoot /var/www/html
            </VirtualHost>
            <VirtualHost *:443>
                ServerName example2.com
                DocumentRoot /var/www/html-ssl
                SSLEngine on
            </VirtualHost>
            "#,
        )
        .unwrap();

        let cmd = ApacheCommonDir::new(dir.path().to_path_buf());
        let status = cmd.query("example2.com").unwrap();
        assert_eq!(status.root, "/var/www/html-ssl");
    }
}
