//! Common-directory command (§4.5)
//!
//! Enables or disables a shared ACME HTTP-01 webroot for a virtual host by
//! transactionally editing its configuration. When a host has more than
//! one block (typically a plain-HTTP and an SSL variant), the block on
//! port 443 is preferred; failing that, port 80; failing that, the host
//! is reported as not deployable at all.

pub mod apache;
pub mod nginx;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::common::Result;

/// Whether a host currently has the ACME common directory enabled, and
/// under which document root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonDirStatus {
    pub enabled: bool,
    pub root: String,
}

/// Shared contract for the two dialects' common-directory command.
pub trait CommonDirCommand {
    fn query(&self, server_name: &str) -> Result<CommonDirStatus>;
    fn enable(&self, server_name: &str, common_dir: &Path) -> Result<()>;
    fn disable(&self, server_name: &str) -> Result<()>;
}
