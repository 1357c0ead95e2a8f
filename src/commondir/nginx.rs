//! Nginx common-directory command

use std::fs;
use std::path::{Path, PathBuf};

use crate::common::fs::{read_file_string, write_file};
use crate::common::{CoreError, Result};
use crate::webserver::ast::{Ast, NodeId};
use crate::webserver::domain::parse_nginx_listen;
use crate::webserver::hostmng::HostManager;
use crate::webserver::nginx::{config as ngx, parser};
use crate::webserver::processmng::ProcessManager;
use crate::webserver::reverter::Reverter;
use crate::webserver::WebServerKind;

use super::{CommonDirCommand, CommonDirStatus};

/// Common-directory command for Nginx, rooted at `sites-available`.
pub struct NginxCommonDir {
    sites_available: PathBuf,
}

impl NginxCommonDir {
    pub fn new(sites_available: PathBuf) -> Self {
        NginxCommonDir { sites_available }
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

            for block in ngx::find_server_blocks_by_name(&ast, server_name) {
                let mut has443 = false;
                let mut has80 = false;
                for id in ast.find_directives(block, "listen") {
                    if let Some((addr, _)) = parse_nginx_listen(ast.node(id).args()) {
                        has443 |= addr.port == 443;
                        has80 |= addr.port == 80;
                    }
                }
                if has443 && on_443.is_none() {
                    on_443 = Some((path.clone(), ast.clone(), block));
                }
                if has80 && on_80.is_none() {
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

impl CommonDirCommand for NginxCommonDir {
    fn query(&self, server_name: &str) -> Result<CommonDirStatus> {
        let (_, ast, block) = self.locate(server_name)?;
        let enabled = ngx::has_acme_location(&ast, block);
        let root = ast
            .find_directives(block, "root")
            .first()
            .and_then(|&id| ast.node(id).args().first().cloned())
            .unwrap_or_default();
        Ok(CommonDirStatus { enabled, root })
    }

    fn enable(&self, server_name: &str, common_dir: &Path) -> Result<()> {
        let (path, mut ast, block) = self.locate(server_name)?;
        if ngx::has_acme_location(&ast, block) {
            return Ok(());
        }

        let mut reverter = Reverter::new(HostManager::new());
        reverter.backup_config(&path)?;
        ngx::add_acme_location(&mut ast, block, common_dir);

        commit_or_rollback(&path, &ast, &mut reverter)
    }

    fn disable(&self, server_name: &str) -> Result<()> {
        let (path, mut ast, block) = self.locate(server_name)?;
        if !ngx::has_acme_location(&ast, block) {
            return Ok(());
        }

        let mut reverter = Reverter::new(HostManager::new());
        reverter.backup_config(&path)?;
        ngx::remove_acme_location(&mut ast, block);

        commit_or_rollback(&path, &ast, &mut reverter)
    }
}

fn commit_or_rollback(path: &Path, ast: &Ast, reverter: &mut Reverter) -> Result<()> {
    if let Err(e) = write_file(path, ast.dump().as_bytes()) {
        reverter.rollback()?;
        return Err(e);
    }
    if let Err(e) = ProcessManager::new().reload(WebServerKind::Nginx.process_names()) {
        reverter.rollback()?;
        return Err(e);
    }
    reverter.commit();
    Ok(())
}
