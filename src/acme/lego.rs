//! `lego` ACME client adapter
//!
//! Shells out to the `lego` binary per spec.md §6: `run --server=<ca>
//! --accept-tos --path=<varDir>/lego --pem --email=… --domains=… …`.
//! `lego` itself writes `<varDir>/lego/certificates/<name>.pem`, which is
//! exactly the [`crate::storage::lego::LegoStorage`] layout.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::common::{CoreError, Result};
use crate::storage::certbot::extract_lego_error;

use super::{AcmeClient, IssueRequest};

pub struct LegoAcmeClient {
    lego_bin: String,
    ca_server: String,
    var_dir: PathBuf,
}

impl LegoAcmeClient {
    pub fn new(lego_bin: String, ca_server: String, var_dir: PathBuf) -> Self {
        LegoAcmeClient {
            lego_bin,
            ca_server,
            var_dir,
        }
    }
}

impl AcmeClient for LegoAcmeClient {
    fn issue(&self, webroot: &Path, request: &IssueRequest) -> Result<(PathBuf, PathBuf)> {
        let lego_path = self.var_dir.join("lego");
        let domains_args: Vec<String> = request
            .subjects
            .iter()
            .flat_map(|d| vec!["--domains".to_string(), d.clone()])
            .collect();

        let output = Command::new(&self.lego_bin)
            .arg(format!("--server={}", self.ca_server))
            .arg("--accept-tos")
            .arg(format!("--path={}", lego_path.display()))
            .arg("--pem")
            .arg(format!("--email={}", request.email))
            .args(&domains_args)
            .arg("--http")
            .arg(format!("--http.webroot={}", webroot.display()))
            .arg("run")
            .output()
            .map_err(|e| CoreError::external(format!("failed to run lego: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CoreError::external(extract_lego_error(&stderr)));
        }

        let cert_path = lego_path
            .join("certificates")
            .join(format!("{}.pem", request.server_name));
        Ok((cert_path.clone(), cert_path))
    }
}
