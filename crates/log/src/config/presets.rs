//! Configuration presets

use super::{Config, DisplayConfig, Fields, Format};
use crate::{LOG_ENV, LOG_FORMAT_ENV};

impl Config {
    /// Configuration from environment variables
    ///
    /// `KEYROT_LOG` (falling back to `RUST_LOG`) sets the filter and
    /// `KEYROT_LOG_FORMAT` the format.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(level) = std::env::var(LOG_ENV) {
            config.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            config.level = level;
        }

        if let Ok(format) = std::env::var(LOG_FORMAT_ENV) {
            config.format = Format::parse_lossy(&format);
        }

        config.display.parse_env();
        config.fields = Fields::from_env();

        config
    }

    /// Pretty output at debug level
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            format: Format::Pretty,
            display: DisplayConfig {
                colors: true,
                source: true,
                ..DisplayConfig::default()
            },
            ..Self::default()
        }
    }

    /// JSON output at info level; the SDK crates are held at warn
    pub fn production() -> Self {
        Self {
            level: "info,aws_config=warn,aws_smithy_runtime=warn,hyper=warn".to_string(),
            format: Format::Json,
            display: DisplayConfig {
                colors: false,
                source: false,
                flatten: true,
                ..DisplayConfig::default()
            },
            fields: Fields::from_env(),
            ..Self::default()
        }
    }
}
