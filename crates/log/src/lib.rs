//! # keyrot-log
//!
//! Tracing subscriber setup shared by keyrot hosts.
//!
//! ```rust,no_run
//! fn main() -> Result<(), keyrot_log::LogError> {
//!     let _guard = keyrot_log::auto_init()?;
//!     tracing::info!(secret_id = "S1", "Rotation starting");
//!     Ok(())
//! }
//! ```
//!
//! Output always goes to stderr unless configured otherwise, so a host can
//! keep stdout for machine-readable results.

#![forbid(unsafe_code)]

mod builder;
mod config;
mod error;

pub use builder::{LoggerBuilder, LoggerGuard};
pub use config::{Config, DisplayConfig, Fields, Format, WriterConfig};
pub use error::{LogError, LogResult};

/// Environment variable holding the filter directive
pub const LOG_ENV: &str = "KEYROT_LOG";

/// Environment variable selecting the output format
pub const LOG_FORMAT_ENV: &str = "KEYROT_LOG_FORMAT";

/// Pick a configuration from the environment and install it.
///
/// An explicit `KEYROT_LOG` or `RUST_LOG` wins; otherwise debug builds get
/// [`Config::development`] and release builds [`Config::production`].
pub fn auto_init() -> LogResult<LoggerGuard> {
    if std::env::var(LOG_ENV).is_ok() || std::env::var("RUST_LOG").is_ok() {
        init_with(Config::from_env())
    } else if cfg!(debug_assertions) {
        init_with(Config::development())
    } else {
        init_with(Config::production())
    }
}

/// Install the default configuration
pub fn init() -> LogResult<LoggerGuard> {
    init_with(Config::default())
}

/// Install `config` as the global subscriber
pub fn init_with(config: Config) -> LogResult<LoggerGuard> {
    LoggerBuilder::from_config(config).build()
}
