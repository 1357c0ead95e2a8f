//! Common module
//!
//! Shared error type, filesystem helpers, and logging setup used throughout
//! the crate.

pub mod error;
pub mod fs;
pub mod log;

pub use error::{CoreError, Result};
pub use log::init_logger;
