//! Layered node configuration: defaults, then an optional TOML file, then
//! environment variables, then CLI flags (applied last, by the caller).
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `SHARDBFT_LISTEN_ADDR` | This node's own address in the committee | `127.0.0.1:9000` |
//! | `SHARDBFT_LOG_LEVEL` | Log level | `info` |
//! | `SHARDBFT_LOG_FORMAT` | Log format (json/pretty) | `pretty` |
//! | `SHARDBFT_COMMIT_WINDOW_MS` | Commit-window duration | `30000` |
//! | `SHARDBFT_NUM_CONSENSUS_SETS` | Racing subset count | `1` |
//! | `SHARDBFT_TOLERANCE_FRACTION` | Byzantine tolerance fraction | `0.667` |

use serde::{Deserialize, Serialize};
use shardbft_consensus::ConsensusConfig;
use validator::Validate;

/// Configuration loading/validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable was present but failed to parse.
    #[error("failed to parse environment variable {key}: {message}")]
    EnvParse {
        /// The variable name.
        key: String,
        /// A human-readable parse failure description.
        message: String,
    },

    /// The configuration file could not be read or parsed.
    #[error("failed to load configuration file: {0}")]
    FileLoad(String),

    /// A field failed validation.
    #[error("validation failed: {0}")]
    Validation(String),
}

/// Top-level node configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct NodeConfig {
    /// This node's own address, as it appears in the committee list.
    pub listen_addr: String,

    /// Consensus protocol tuning (commit window, subset count, tolerance).
    #[serde(default)]
    pub consensus: ConsensusConfig,

    /// Logging configuration.
    #[validate(nested)]
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:9000".to_string(),
            consensus: ConsensusConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileLoad(e.to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::FileLoad(e.to_string()))
    }

    /// Overrides fields explicitly set via environment variables.
    pub fn merge_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(addr) = std::env::var("SHARDBFT_LISTEN_ADDR") {
            self.listen_addr = addr;
        }
        if let Ok(level) = std::env::var("SHARDBFT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("SHARDBFT_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(ms) = std::env::var("SHARDBFT_COMMIT_WINDOW_MS") {
            self.consensus.commit_window_ms = ms.parse().map_err(|_| ConfigError::EnvParse {
                key: "SHARDBFT_COMMIT_WINDOW_MS".to_string(),
                message: "expected an integer number of milliseconds".to_string(),
            })?;
        }
        if let Ok(sets) = std::env::var("SHARDBFT_NUM_CONSENSUS_SETS") {
            self.consensus.num_consensus_sets = sets.parse().map_err(|_| ConfigError::EnvParse {
                key: "SHARDBFT_NUM_CONSENSUS_SETS".to_string(),
                message: "expected an integer".to_string(),
            })?;
        }
        if let Ok(frac) = std::env::var("SHARDBFT_TOLERANCE_FRACTION") {
            self.consensus.tolerance_fraction = frac.parse().map_err(|_| ConfigError::EnvParse {
                key: "SHARDBFT_TOLERANCE_FRACTION".to_string(),
                message: "expected a floating-point fraction".to_string(),
            })?;
        }
        Ok(())
    }

    /// Validates the fully-merged configuration.
    pub fn validate_config(&self) -> Result<(), ConfigError> {
        self.validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        if !(0.0..1.0).contains(&self.consensus.tolerance_fraction) {
            return Err(ConfigError::Validation(format!(
                "tolerance_fraction must be in [0, 1), got {}",
                self.consensus.tolerance_fraction
            )));
        }
        if self.consensus.num_consensus_sets == 0 {
            return Err(ConfigError::Validation(
                "num_consensus_sets must be at least 1".to_string(),
            ));
        }
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "listen_addr is not a valid socket address: {}",
                self.listen_addr
            )));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::Validation(format!(
                "invalid log level '{}', expected one of {valid_levels:?}",
                self.logging.level
            )));
        }
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(ConfigError::Validation(format!(
                "invalid log format '{}', expected one of {valid_formats:?}",
                self.logging.format
            )));
        }

        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Log format (json, pretty).
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn from_file_loads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            listen_addr = "10.0.0.5:9000"

            [consensus]
            commit_window_ms = 5000
            num_consensus_sets = 3
            tolerance_fraction = 0.6

            [logging]
            level = "debug"
            format = "json"
            "#
        )
        .unwrap();

        let config = NodeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.listen_addr, "10.0.0.5:9000");
        assert_eq!(config.consensus.commit_window_ms, 5000);
        assert_eq!(config.logging.level, "debug");
        assert!(config.validate_config().is_ok());
    }

    #[test]
    fn from_file_rejects_missing_path() {
        let missing = std::path::Path::new("/nonexistent/shardbft-node-config.toml");
        assert!(NodeConfig::from_file(missing).is_err());
    }

    #[test]
    fn default_config_validates() {
        let config = NodeConfig::default();
        assert!(config.validate_config().is_ok());
    }

    #[test]
    fn rejects_bad_log_level() {
        let mut config = NodeConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate_config().is_err());
    }

    #[test]
    fn rejects_out_of_range_tolerance() {
        let mut config = NodeConfig::default();
        config.consensus.tolerance_fraction = 1.5;
        assert!(config.validate_config().is_err());
    }

    #[test]
    fn merge_env_overrides_listen_addr() {
        std::env::set_var("SHARDBFT_LISTEN_ADDR", "10.0.0.1:9100");
        let mut config = NodeConfig::default();
        config.merge_env().unwrap();
        assert_eq!(config.listen_addr, "10.0.0.1:9100");
        std::env::remove_var("SHARDBFT_LISTEN_ADDR");
    }
}
