//! Logger builder implementation

#[macro_use]
mod format;

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, Format, WriterConfig};
use crate::error::{LogError, LogResult};

/// Logger builder
#[derive(Debug)]
pub struct LoggerBuilder {
    config: Config,
}

/// Keeps the root span with the global fields entered.
///
/// Hold it for the lifetime of the process.
#[derive(Debug)]
pub struct LoggerGuard {
    #[allow(dead_code)]
    root_span: Option<tracing::span::EnteredSpan>,
}

impl LoggerBuilder {
    /// Create builder from config
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Parse the filter without installing anything
    pub fn filter(&self) -> LogResult<EnvFilter> {
        EnvFilter::try_new(&self.config.level).map_err(|e| LogError::Filter {
            filter: self.config.level.clone(),
            reason: e.to_string(),
        })
    }

    /// Build and install the global subscriber
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Filter string cannot be parsed
    /// - A global subscriber is already set
    pub fn build(self) -> LogResult<LoggerGuard> {
        let filter = self.filter()?;
        let display = &self.config.display;
        let writer = make_writer(self.config.writer);

        let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match self.config.format {
            Format::Pretty => boxed_with_time!(fmt_layer!(pretty, display, writer), display),
            Format::Compact => boxed_with_time!(fmt_layer!(compact, display, writer), display),
            Format::Json => boxed_with_time!(json_layer!(display, writer), display),
        };

        Registry::default()
            .with(fmt_layer.with_filter(filter))
            .try_init()
            .map_err(|e| LogError::AlreadyInitialized(e.to_string()))?;

        let fields = &self.config.fields;
        let root_span = (!fields.is_empty()).then(|| {
            tracing::info_span!(
                "keyrot",
                service = fields.service.as_deref().unwrap_or(""),
                env = fields.env.as_deref().unwrap_or(""),
                version = fields.version.as_deref().unwrap_or(""),
                region = fields.region.as_deref().unwrap_or("")
            )
            .entered()
        });

        Ok(LoggerGuard { root_span })
    }
}

fn make_writer(writer: WriterConfig) -> BoxMakeWriter {
    match writer {
        WriterConfig::Stderr => BoxMakeWriter::new(std::io::stderr),
        WriterConfig::Stdout => BoxMakeWriter::new(std::io::stdout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_filter_before_installing() {
        let builder = LoggerBuilder::from_config(Config {
            level: "keyrot_core=loud".to_string(),
            ..Config::default()
        });

        let err = builder.build().unwrap_err();
        assert!(matches!(err, LogError::Filter { ref filter, .. } if filter == "keyrot_core=loud"));
        assert!(!tracing::dispatcher::has_been_set());
    }

    #[test]
    fn accepts_production_filter() {
        assert!(LoggerBuilder::from_config(Config::production()).filter().is_ok());
    }
}
