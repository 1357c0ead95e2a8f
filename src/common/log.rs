//! Logging utility functions
//!
//! Thin wrapper around `env_logger`, matched to the way the rest of the
//! ambient stack reads configuration: an explicit level from `AppConfig`,
//! overridable by an environment variable for operators who need to bump
//! verbosity without touching the config file.

/// Initialize the global logger at the given level (`error`, `warn`,
/// `info`, `debug`, `trace`).
pub fn init_logger(level: &str) {
    let log_level = std::env::var("SSLBOT_LOG_LEVEL").unwrap_or_else(|_| level.to_string());

    let log_level = if !log_level.contains('=') && !log_level.is_empty() {
        format!("sslbot_core={}", log_level)
    } else {
        log_level
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", &log_level);

    if let Err(e) = env_logger::try_init_from_env(env) {
        eprintln!("failed to initialize logger: {}", e);
    } else {
        log::debug!("logger initialized with level: {}", log_level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logger_does_not_panic() {
        init_logger("debug");
    }
}
