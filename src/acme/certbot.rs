//! `certbot` ACME client adapter
//!
//! Shells out to the `certbot` binary per spec.md §6: `certonly` (or `run
//! -a webroot -i <webserver>`) plus `-w <webroot> -d <domain> [-d …]
//! -m <email> -n --agree-tos`. Certbot writes
//! `<certbotWorkDir>/<name>/{fullchain,privkey}.pem`, matching
//! [`crate::storage::certbot::CertbotStorage`].

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::common::{CoreError, Result};

use super::{AcmeClient, IssueRequest};

pub struct CertbotAcmeClient {
    certbot_bin: String,
    work_dir: PathBuf,
}

impl CertbotAcmeClient {
    pub fn new(certbot_bin: String, work_dir: PathBuf) -> Self {
        CertbotAcmeClient {
            certbot_bin,
            work_dir,
        }
    }
}

impl AcmeClient for CertbotAcmeClient {
    fn issue(&self, webroot: &Path, request: &IssueRequest) -> Result<(PathBuf, PathBuf)> {
        let mut cmd = Command::new(&self.certbot_bin);
        cmd.arg("certonly")
            .arg("-w")
            .arg(webroot)
            .arg("-m")
            .arg(&request.email)
            .arg("-n")
            .arg("--agree-tos")
            .arg("--cert-name")
            .arg(&request.server_name);

        for domain in &request.subjects {
            cmd.arg("-d").arg(domain);
        }

        let output = cmd
            .output()
            .map_err(|e| CoreError::external(format!("failed to run certbot: {}", e)))?;

        if !output.status.success() {
            return Err(CoreError::external(format!(
                "certbot certonly failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let cert_dir = self.work_dir.join(&request.server_name);
        Ok((
            cert_dir.join("fullchain.pem"),
            cert_dir.join("privkey.pem"),
        ))
    }
}
