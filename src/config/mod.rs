//! Configuration module
//!
//! Loads and exposes `AppConfig`, the typed view over every environment key
//! named in the specification.

pub mod loader;
pub mod types;

pub use types::AppConfig;
