//! Certificate Deployer (§4.4)
//!
//! For a given vhost, either amend the existing SSL block or clone the
//! plain-HTTP block into an SSL variant, set the certificate directives,
//! and ensure port 443 is listened. Both dialect variants return
//! `(sslConfigFilePath, originEnabledConfigFilePath)`, and register every
//! mutation with the caller's [`Reverter`] so a later pipeline failure can
//! be undone.

pub mod apache;
pub mod nginx;

use std::path::{Path, PathBuf};

use crate::common::Result;
use crate::webserver::reverter::Reverter;
use crate::webserver::VirtualHost;

/// Shared contract for the two dialects' certificate deployer.
pub trait CertificateDeployer {
    /// Returns `(sslConfigFilePath, originEnabledConfigFilePath)`.
    fn deploy_certificate(
        &self,
        reverter: &mut Reverter,
        vhost: &VirtualHost,
        cert_path: &Path,
        key_path: &Path,
    ) -> Result<(PathBuf, PathBuf)>;
}
