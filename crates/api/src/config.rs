//! Gateway Configuration

use std::path::Path;
use std::time::Duration;

use config::{ConfigError, Environment, File};
use data_validator::ShapeLimits;
use serde::{Deserialize, Serialize};

/// Environment variable naming an alternative config file
pub const CONFIG_PATH_ENV: &str = "FEATURE_GATEWAY_CONFIG";

/// Config file read when no path is given
pub const DEFAULT_CONFIG_PATH: &str = "gateway.toml";

/// Gateway configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Socket address the server binds to
    pub bind_addr: String,

    /// Tables must have fewer rows than this
    pub row_limit: usize,

    /// Tables may have at most this many columns
    pub max_columns: usize,

    /// Reject role names absent from the table before extraction
    pub strict_roles: bool,

    /// Upper bound on a single extraction (seconds)
    pub extraction_timeout_secs: u64,

    /// Largest accepted request body
    pub max_upload_bytes: usize,

    /// Minimum log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Emit logs as JSON lines
    pub log_json: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let limits = ShapeLimits::default();
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            row_limit: limits.row_limit,
            max_columns: limits.max_columns,
            strict_roles: limits.strict_roles,
            extraction_timeout_secs: 60,
            max_upload_bytes: 2 * 1024 * 1024,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl GatewayConfig {
    /// Load from the default file location and the environment
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&path))
    }

    /// Load from an optional file, overridden by `FEATURE_GATEWAY__*` variables
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        config::Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("FEATURE_GATEWAY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn shape_limits(&self) -> ShapeLimits {
        ShapeLimits {
            row_limit: self.row_limit,
            max_columns: self.max_columns,
            strict_roles: self.strict_roles,
        }
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.row_limit, 100);
        assert_eq!(config.max_columns, 6);
        assert!(!config.strict_roles);
        assert_eq!(config.extraction_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = GatewayConfig::load_from(Path::new("/nonexistent/gateway.toml")).unwrap();
        assert_eq!(config, GatewayConfig::default());
    }

    #[test]
    fn test_partial_file_overrides() {
        let path = std::env::temp_dir().join(format!("gateway-{}.toml", std::process::id()));
        std::fs::write(&path, "row_limit = 50\nstrict_roles = true\n").unwrap();

        let config = GatewayConfig::load_from(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.row_limit, 50);
        assert!(config.strict_roles);
        assert_eq!(config.max_columns, 6);
        assert_eq!(config.shape_limits().row_limit, 50);
    }
}
