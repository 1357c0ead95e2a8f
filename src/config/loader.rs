//! Configuration loading
//!
//! Layers configuration the way the rest of the ambient stack expects:
//! built-in defaults, then an optional JSON file, then environment
//! variables prefixed `SSLBOT_`. Each layer overrides the previous one for
//! the keys it sets.

use std::path::Path;

use crate::common::{CoreError, Result};
use crate::config::types::AppConfig;

const ENV_PREFIX: &str = "SSLBOT";

impl AppConfig {
    /// Load configuration from defaults, an optional file, and environment
    /// variables, in that order of increasing precedence.
    pub fn load(file: Option<&Path>) -> Result<AppConfig> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default()).map_err(|e| {
                CoreError::config_parse(format!("failed to serialize defaults: {}", e))
            })?);

        if let Some(path) = file {
            if path.exists() {
                builder = builder.add_source(config::File::from(path));
            } else {
                log::warn!(
                    "configuration file not found, using defaults and environment: {}",
                    path.display()
                );
            }
        }

        // No `.separator(...)` here: `AppConfig`'s fields are flat
        // snake_case (`var_dir`, `ca_server`, `nginx_root`, ...), so after
        // the `SSLBOT_` prefix is stripped the remaining `VAR_DIR` /
        // `CA_SERVER` / `NGINX_ROOT` must lower-case straight into the
        // matching flat key, not split again on `_` into a nested key
        // (`var.dir`, which would never match anything and silently drop
        // the override).
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX).try_parsing(true),
        );

        let built = builder
            .build()
            .map_err(|e| CoreError::config_parse(format!("failed to build configuration: {}", e)))?;

        built
            .try_deserialize()
            .map_err(|e| CoreError::config_parse(format!("failed to deserialize configuration: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn load_with_no_file_returns_defaults() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.port, AppConfig::default().port);
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        write!(file, r#"{{"port": 9000, "certbot_enabled": true}}"#).unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.port, 9000);
        assert!(config.certbot_enabled);
    }

    #[test]
    #[serial_test::serial]
    fn environment_overrides_multi_word_flat_keys() {
        std::env::set_var("SSLBOT_VAR_DIR", "/tmp/sslbot-env-test");
        std::env::set_var("SSLBOT_CA_SERVER", "https://ca.example.test/directory");

        let config = AppConfig::load(None).unwrap();

        std::env::remove_var("SSLBOT_VAR_DIR");
        std::env::remove_var("SSLBOT_CA_SERVER");

        assert_eq!(config.var_dir, std::path::PathBuf::from("/tmp/sslbot-env-test"));
        assert_eq!(config.ca_server, "https://ca.example.test/directory");
    }
}
