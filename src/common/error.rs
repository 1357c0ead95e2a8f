//! Error handling module
//!
//! Defines the structured error taxonomy used throughout the core and the
//! `Result` alias built on top of it. Every pipeline step returns one of
//! these variants; the certificate manager is the only place that catches
//! them to decide whether to roll back.

use std::io;
use thiserror::Error;

/// Core error type.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed or incomplete request (missing domain/email, unknown
    /// webserver code, unknown challenge type).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A vhost, certificate, storage, or daemon process could not be found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A dialect parser failed to make sense of a configuration file.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// Filesystem read/write/stat/symlink failure.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The ACME client or an external binary (certbot) failed.
    #[error("external tool failed: {0}")]
    External(String),

    /// A precondition for deployment was not met (SSL module disabled,
    /// vhost on neither port 80 nor 443).
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// A secondary failure occurred while rolling back an earlier error.
    /// Carries both the original cause and the rollback failure so neither
    /// is lost in logs.
    #[error("rollback failed ({rollback_cause}) while recovering from: {original}")]
    Rollback {
        original: Box<CoreError>,
        rollback_cause: Box<CoreError>,
    },
}

impl CoreError {
    pub fn invalid_request<S: Into<String>>(msg: S) -> Self {
        CoreError::InvalidRequest(msg.into())
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        CoreError::NotFound(msg.into())
    }

    pub fn config_parse<S: Into<String>>(msg: S) -> Self {
        CoreError::ConfigParse(msg.into())
    }

    pub fn external<S: Into<String>>(msg: S) -> Self {
        CoreError::External(msg.into())
    }

    pub fn precondition<S: Into<String>>(msg: S) -> Self {
        CoreError::Precondition(msg.into())
    }

    pub fn rollback(original: CoreError, rollback_cause: CoreError) -> Self {
        CoreError::Rollback {
            original: Box::new(original),
            rollback_cause: Box::new(rollback_cause),
        }
    }
}

/// Result type alias used everywhere in the core.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let err: CoreError = io_err.into();
        assert!(matches!(err, CoreError::Io(_)));
    }

    #[test]
    fn rollback_wraps_both_causes() {
        let original = CoreError::external("reload failed");
        let rollback_cause = CoreError::Io(io::Error::new(io::ErrorKind::NotFound, "gone"));
        let err = CoreError::rollback(original, rollback_cause);
        let msg = err.to_string();
        assert!(msg.contains("reload failed"));
    }
}
