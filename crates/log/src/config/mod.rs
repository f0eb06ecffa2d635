//! Logging configuration
//!
//! - `Config`: filter, format, writer, display and global fields
//! - `presets`: `from_env`, `development`, `production`

mod presets;

use serde::{Deserialize, Serialize};

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Filter directive (e.g. `"info"`, `"keyrot_core=debug,aws_config=warn"`)
    pub level: String,

    /// Output format
    pub format: Format,

    /// Output destination
    pub writer: WriterConfig,

    /// Display options
    pub display: DisplayConfig,

    /// Fields attached to a root span around every event
    pub fields: Fields,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: Format::Compact,
            writer: WriterConfig::Stderr,
            display: DisplayConfig::default(),
            fields: Fields::default(),
        }
    }
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Human-readable, multi-line
    Pretty,
    /// Single line per event
    Compact,
    /// One JSON object per event
    Json,
}

impl Format {
    /// Parse a format name; unknown names fall back to compact
    pub fn parse_lossy(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "pretty" => Self::Pretty,
            "json" => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Output destination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriterConfig {
    /// Standard error
    #[default]
    Stderr,
    /// Standard output
    Stdout,
}

/// Display options
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Show timestamps
    pub time: bool,
    /// Show `file:line`
    pub source: bool,
    /// Show the target module
    pub target: bool,
    /// Use ANSI colors
    pub colors: bool,
    /// Include the span list in JSON output
    pub span_list: bool,
    /// Flatten event fields into the JSON object
    pub flatten: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            time: true,
            source: cfg!(debug_assertions),
            target: true,
            colors: cfg!(feature = "ansi") && std::io::IsTerminal::is_terminal(&std::io::stderr()),
            span_list: true,
            flatten: true,
        }
    }
}

impl DisplayConfig {
    fn parse_env(&mut self) {
        let flag = |name: &str| std::env::var(name).ok().map(|v| v != "0" && v != "false");
        if let Some(time) = flag("KEYROT_LOG_TIME") {
            self.time = time;
        }
        if let Some(source) = flag("KEYROT_LOG_SOURCE") {
            self.source = source;
        }
        if let Some(colors) = flag("KEYROT_LOG_COLORS") {
            self.colors = colors;
        }
    }
}

/// Global fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fields {
    /// Service name
    pub service: Option<String>,
    /// Deployment environment
    pub env: Option<String>,
    /// Build version
    pub version: Option<String>,
    /// Region
    pub region: Option<String>,
}

impl Fields {
    /// Read `KEYROT_SERVICE`, `KEYROT_ENV`, `KEYROT_VERSION` and `AWS_REGION`
    pub fn from_env() -> Self {
        Self {
            service: std::env::var("KEYROT_SERVICE").ok(),
            env: std::env::var("KEYROT_ENV").ok(),
            version: std::env::var("KEYROT_VERSION").ok(),
            region: std::env::var("AWS_REGION").ok(),
        }
    }

    /// Whether no field is set
    pub fn is_empty(&self) -> bool {
        self.service.is_none() && self.env.is_none() && self.version.is_none() && self.region.is_none()
    }
}
