//! Apache dialect binding
//!
//! Discovers virtual hosts from `sites-available`, and exposes the AST
//! operations the deployer and common-dir command need: `VirtualHost`
//! lookup by server name, SSL-module/SSL-vhost detection, listen-port
//! management via `ports.conf`, and dangerous-rewrite pruning.

pub mod config;
pub mod parser;

pub use config::ApacheWebServer;
