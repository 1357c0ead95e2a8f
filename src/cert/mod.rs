//! Certificate utilities
//!
//! X.509 parsing for PEM certificate files. This is read-only: the core
//! never mutates a certificate, only the configuration that points at one.

pub mod certificate;

pub use certificate::{Certificate, Issuer};
