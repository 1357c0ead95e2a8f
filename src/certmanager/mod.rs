//! Certificate Manager: top-level orchestrator (§4.6)
//!
//! Composes the ACME client, deployer, host manager, process manager,
//! reverter, and common-dir command behind four operations — `issue`,
//! `assign`, `upload`, and the storage queries — all serialized through a
//! single process-wide mutex so only one daemon reload happens at a time
//! (§5).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::acme::{AcmeClient, IssueRequest as AcmeIssueRequest};
use crate::cert::certificate::parse_certificate;
use crate::cert::Certificate;
use crate::commondir::apache::ApacheCommonDir;
use crate::commondir::nginx::NginxCommonDir;
use crate::commondir::{CommonDirCommand, CommonDirStatus};
use crate::common::{CoreError, Result};
use crate::config::AppConfig;
use crate::deploy::apache::ApacheDeployer;
use crate::deploy::nginx::NginxDeployer;
use crate::deploy::CertificateDeployer;
use crate::storage::{CertStorage, StorageRegistry, StorageType};
use crate::webserver::apache::ApacheWebServer;
use crate::webserver::hostmng::HostManager;
use crate::webserver::nginx::NginxWebServer;
use crate::webserver::processmng::ProcessManager;
use crate::webserver::reverter::Reverter;
use crate::webserver::{VirtualHost, WebServer, WebServerKind};

/// `Issue` request record (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueRequest {
    pub email: String,
    pub server_name: String,
    pub web_server: String,
    pub challenge_type: String,
    pub subjects: Vec<String>,
    pub assign: bool,
    pub prevent_reload: bool,
}

/// `Assign` request record (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignRequest {
    pub server_name: String,
    pub web_server: String,
    pub cert_name: String,
    pub storage_type: String,
}

/// `Upload` request record (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRequest {
    pub server_name: String,
    pub web_server: String,
    pub cert_name: String,
    pub pem_certificate: String,
}

/// `InfoQuery` / `Remove` request records (§6) share the same shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertNameRequest {
    pub cert_name: String,
    pub storage_type: String,
}

/// `CommonDirChange` request record (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommonDirChangeRequest {
    pub web_server: String,
    pub server_name: String,
    pub status: bool,
}

/// Composes every collaborator the core needs, built once from
/// [`AppConfig`] and an [`AcmeClient`].
pub struct CertificateManager {
    nginx: NginxWebServer,
    apache: ApacheWebServer,
    nginx_deployer: NginxDeployer,
    apache_deployer: ApacheDeployer,
    nginx_commondir: NginxCommonDir,
    apache_commondir: ApacheCommonDir,
    nginx_acme_common_dir: PathBuf,
    apache_acme_common_dir: PathBuf,
    acme_client: Box<dyn AcmeClient>,
    storages: StorageRegistry,
    /// Guards every mutation path that culminates in a daemon reload:
    /// deploy and common-dir enable/disable (§5).
    deploy_mutex: Mutex<()>,
}

impl CertificateManager {
    pub fn new(config: &AppConfig, acme_client: Box<dyn AcmeClient>, storages: StorageRegistry) -> Self {
        CertificateManager {
            nginx: NginxWebServer::new(config.nginx_root.clone()),
            apache: ApacheWebServer::new(config.apache_root.clone()),
            nginx_deployer: NginxDeployer::new(),
            apache_deployer: ApacheDeployer::new(config.apache_root.clone()),
            nginx_commondir: NginxCommonDir::new(config.nginx_root.join("sites-available")),
            apache_commondir: ApacheCommonDir::new(config.apache_root.join("sites-available")),
            nginx_acme_common_dir: config.nginx_acme_common_dir.clone(),
            apache_acme_common_dir: config.apache_acme_common_dir.clone(),
            acme_client,
            storages,
            deploy_mutex: Mutex::new(()),
        }
    }

    fn web_server(&self, kind: WebServerKind) -> &dyn WebServer {
        match kind {
            WebServerKind::Nginx => &self.nginx,
            WebServerKind::Apache => &self.apache,
        }
    }

    fn deployer(&self, kind: WebServerKind) -> &dyn CertificateDeployer {
        match kind {
            WebServerKind::Nginx => &self.nginx_deployer,
            WebServerKind::Apache => &self.apache_deployer,
        }
    }

    fn commondir(&self, kind: WebServerKind) -> &dyn CommonDirCommand {
        match kind {
            WebServerKind::Nginx => &self.nginx_commondir,
            WebServerKind::Apache => &self.apache_commondir,
        }
    }

    fn acme_common_dir(&self, kind: WebServerKind) -> &Path {
        match kind {
            WebServerKind::Nginx => &self.nginx_acme_common_dir,
            WebServerKind::Apache => &self.apache_acme_common_dir,
        }
    }

    /// §4.6 Issue.
    pub fn issue(&self, req: IssueRequest) -> Result<Certificate> {
        if req.challenge_type != "http" {
            return Err(CoreError::invalid_request(format!(
                "unsupported challenge type: {}",
                req.challenge_type
            )));
        }
        let kind = WebServerKind::from_str(&req.web_server)?;
        let vhost = self.web_server(kind).get_vhost_by_name(&req.server_name)?;

        let doc_root = match self.commondir(kind).query(&req.server_name) {
            Ok(CommonDirStatus { enabled: true, root }) => root,
            _ => vhost.doc_root.clone(),
        };

        let acme_req = AcmeIssueRequest {
            email: req.email.clone(),
            server_name: req.server_name.clone(),
            subjects: req.subjects.clone(),
        };
        let (cert_path, key_path) = self.acme_client.issue(Path::new(&doc_root), &acme_req)?;

        if req.assign {
            self.deploy(kind, &vhost, &cert_path, &key_path, req.prevent_reload)?;
        }

        parse_certificate(&cert_path)
    }

    /// §4.6 Assign.
    pub fn assign(&self, req: AssignRequest) -> Result<Certificate> {
        let kind = WebServerKind::from_str(&req.web_server)?;
        let vhost = self.web_server(kind).get_vhost_by_name(&req.server_name)?;
        let storage_type = StorageType::from_str(&req.storage_type)?;
        let storage = self.storages.get(storage_type)?;

        let (cert_path, key_path) = storage.get_certificate_path(&req.cert_name)?;
        self.deploy(kind, &vhost, &cert_path, &key_path, false)?;
        parse_certificate(&cert_path)
    }

    /// §4.6 Upload.
    pub fn upload(&self, req: UploadRequest) -> Result<Certificate> {
        let kind = WebServerKind::from_str(&req.web_server)?;
        let vhost = self.web_server(kind).get_vhost_by_name(&req.server_name)?;
        let default_storage = self.storages.get(StorageType::Default)?;

        let path = default_storage.add_certificate(&req.cert_name, req.pem_certificate.as_bytes())?;
        self.deploy(kind, &vhost, &path, &path, false)?;
        parse_certificate(&path)
    }

    /// §4.6 "Deploy step": runs under the single process-wide mutex.
    /// Sequence: deploy certificate → enable the resulting site → reload
    /// (unless prevented) → commit; any failure triggers a best-effort
    /// rollback and returns the original error.
    fn deploy(
        &self,
        kind: WebServerKind,
        vhost: &VirtualHost,
        cert_path: &Path,
        key_path: &Path,
        prevent_reload: bool,
    ) -> Result<()> {
        let _guard = self.deploy_mutex.lock().unwrap();
        let mut reverter = Reverter::new(HostManager::new());

        let result = (|| -> Result<()> {
            let (ssl_path, orig_path) =
                self.deployer(kind)
                    .deploy_certificate(&mut reverter, vhost, cert_path, key_path)?;

            let enabled_path = match kind {
                WebServerKind::Nginx => {
                    let enabled_dir = self.nginx.sites_enabled();
                    HostManager::new().enable(&ssl_path, &enabled_dir)?
                }
                // Apache has no host manager (open question (b), spec.md
                // §9): the deployer already wrote the synthesized SSL
                // clone beside the source file under sites-available, and
                // there's no separate enable step to run here.
                WebServerKind::Apache => ssl_path.clone(),
            };
            reverter.add_config_to_disable(enabled_path);
            let _ = &orig_path;

            if !prevent_reload {
                ProcessManager::new().reload(kind.process_names())?;
            }
            Ok(())
        })();

        match result {
            Ok(()) => {
                reverter.commit();
                Ok(())
            }
            Err(e) => {
                if let Err(rollback_err) = reverter.rollback() {
                    log::error!(
                        "{}",
                        CoreError::rollback(CoreError::external(e.to_string()), rollback_err)
                    );
                }
                Err(e)
            }
        }
    }

    /// §4.5 Common-dir query/command.
    pub fn common_dir_status(&self, web_server: &str, server_name: &str) -> Result<CommonDirStatus> {
        let kind = WebServerKind::from_str(web_server)?;
        self.commondir(kind).query(server_name)
    }

    pub fn change_common_dir(&self, req: CommonDirChangeRequest) -> Result<()> {
        let kind = WebServerKind::from_str(&req.web_server)?;
        let _guard = self.deploy_mutex.lock().unwrap();
        if req.status {
            let common_dir = self.acme_common_dir(kind).to_path_buf();
            self.commondir(kind).enable(&req.server_name, &common_dir)
        } else {
            self.commondir(kind).disable(&req.server_name)
        }
    }

    /// §4.7 storage queries, delegated to the selected storage.
    pub fn list_certificates(&self, storage_type: &str) -> Result<HashMap<String, Certificate>> {
        let storage_type = StorageType::from_str(storage_type)?;
        self.storages.get(storage_type)?.get_certificates()
    }

    pub fn get_certificate(&self, req: CertNameRequest) -> Result<Certificate> {
        let storage_type = StorageType::from_str(&req.storage_type)?;
        self.storages.get(storage_type)?.get_certificate(&req.cert_name)
    }

    pub fn get_certificate_as_string(&self, req: CertNameRequest) -> Result<(PathBuf, String)> {
        let storage_type = StorageType::from_str(&req.storage_type)?;
        self.storages
            .get(storage_type)?
            .get_certificate_as_string(&req.cert_name)
    }

    pub fn remove_certificate(&self, req: CertNameRequest) -> Result<()> {
        let storage_type = StorageType::from_str(&req.storage_type)?;
        self.storages.get(storage_type)?.remove_certificate(&req.cert_name)
    }
}
