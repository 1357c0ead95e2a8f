//! Nginx dialect binding
//!
//! Discovers virtual hosts from `sites-available`, and exposes the AST
//! operations the deployer and common-dir command need: server-block
//! lookup by name, SSL-block detection, address rewriting, and directive
//! add/replace.

pub mod config;
pub mod parser;

pub use config::NginxWebServer;
