//! Layered host configuration
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults
//! 2. The TOML file passed with `--config`
//! 3. `KEYROT_` environment variables, `__` separating nested keys
//!    (`KEYROT_AWS__LEDGER__TABLE_NAME=RotationLog`)

use std::path::Path;

use anyhow::Context;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use keyrot_aws::AwsConfig;
use keyrot_core::{ComponentConfig, RotationConfig};
use serde::{Deserialize, Serialize};

/// Environment prefix for configuration overrides
pub const ENV_PREFIX: &str = "KEYROT_";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Dispatcher settings
    pub rotation: RotationConfig,

    /// AWS clients and the ledger table
    pub aws: AwsConfig,

    /// Maintenance command defaults
    pub maintenance: MaintenanceConfig,

    /// Logging; when absent the environment and build profile decide
    pub log: Option<keyrot_log::Config>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Secret used by `rotate-now` and `purge-inactive` without `--secret-id`
    pub secret_id: Option<String>,
}

impl AppConfig {
    /// Merge defaults, `file` and the environment, then validate
    pub fn load(file: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = file {
            anyhow::ensure!(path.exists(), "config file {} does not exist", path.display());
            figment = figment.merge(Toml::file(path));
        }
        // Single-segment KEYROT_* variables (KEYROT_LOG, KEYROT_CONFIG) belong
        // to other layers.
        figment = figment.merge(
            Env::prefixed(ENV_PREFIX)
                .filter(|key| key.as_str().contains("__"))
                .split("__"),
        );

        let config: Self = figment.extract().context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        self.rotation
            .validate()
            .with_context(|| format!("{} configuration", self.rotation.component_name()))?;
        self.aws
            .validate()
            .with_context(|| format!("{} configuration", self.aws.component_name()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use keyrot_core::LedgerProvisioning;

    use super::*;

    fn write_toml(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("temp file");
        file.write_all(contents.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn test_defaults_without_file() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.aws.ledger.table_name, "SecretsRotationLog");
        assert_eq!(config.rotation.ledger_provisioning, LedgerProvisioning::Preprovisioned);
        assert!(config.maintenance.secret_id.is_none());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let file = write_toml(
            r#"
            [rotation]
            principal = "del-admin1"
            ledger_provisioning = "lazy"

            [aws]
            region = "eu-west-1"

            [aws.ledger]
            table_name = "RotationLog"
            wait_timeout = "90s"

            [maintenance]
            secret_id = "prod/app/iam"
            "#,
        );

        let config = AppConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.rotation.principal.as_deref(), Some("del-admin1"));
        assert_eq!(config.rotation.ledger_provisioning, LedgerProvisioning::Lazy);
        assert_eq!(config.aws.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.aws.ledger.table_name, "RotationLog");
        assert_eq!(config.aws.ledger.wait_timeout.as_secs(), 90);
        assert_eq!(config.aws.ledger.read_capacity, 5);
        assert_eq!(config.maintenance.secret_id.as_deref(), Some("prod/app/iam"));
    }

    #[test]
    fn test_invalid_value_is_rejected() {
        let file = write_toml(
            r#"
            [aws]
            endpoint_url = "localhost:4566"
            "#,
        );

        let err = AppConfig::load(Some(file.path())).unwrap_err();
        assert!(format!("{err:#}").contains("aws.endpoint_url"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/keyrot.toml"))).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
