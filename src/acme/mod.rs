//! ACME client boundary (out of scope per spec.md §1: ACME protocol speech
//! itself is delegated to an external collaborator)
//!
//! The core only needs one capability from an ACME client: given a webroot
//! and an issuance request, produce a certificate and key on disk. How
//! that happens — `lego` subprocess, `certbot` subprocess, a future
//! in-process client — is irrelevant to the certificate manager.

pub mod certbot;
pub mod lego;

use std::path::{Path, PathBuf};

use crate::common::Result;

/// A single domain/subject-alternative-name issuance request, the portion
/// an `AcmeClient` needs out of the full `Issue` record (§6).
#[derive(Debug, Clone)]
pub struct IssueRequest {
    pub email: String,
    pub server_name: String,
    pub subjects: Vec<String>,
}

/// Opaque ACME client contract: `issue(webroot, request) -> (certPath, keyPath)`.
pub trait AcmeClient: Send + Sync {
    fn issue(&self, webroot: &Path, request: &IssueRequest) -> Result<(PathBuf, PathBuf)>;
}
