//! AWS adapter configuration

use std::time::Duration;

use keyrot_core::{ComponentConfig, ConfigError};
use serde::{Deserialize, Serialize};

/// Shared AWS settings
///
/// Region and credentials fall back to the SDK's default chain:
/// 1. This config value
/// 2. `AWS_REGION` / `AWS_DEFAULT_REGION`
/// 3. Shared config files and instance metadata
///
/// # Example
///
/// ```rust
/// use keyrot_aws::AwsConfig;
/// use keyrot_core::ComponentConfig;
///
/// let config = AwsConfig {
///     region: Some("us-east-1".into()),
///     endpoint_url: Some("http://localhost:4566".into()),
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    /// AWS region
    pub region: Option<String>,

    /// Custom endpoint for every service (LocalStack: `http://localhost:4566`)
    pub endpoint_url: Option<String>,

    /// Audit ledger table
    pub ledger: DynamoLedgerConfig,
}

impl ComponentConfig for AwsConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(region) = &self.region
            && region.trim().is_empty()
        {
            return Err(ConfigError::InvalidValue {
                field: "aws.region".into(),
                reason: "must not be blank".into(),
            });
        }

        if let Some(endpoint) = &self.endpoint_url
            && !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err(ConfigError::InvalidValue {
                field: "aws.endpoint_url".into(),
                reason: format!("must be an http(s) URL, got '{endpoint}'"),
            });
        }

        self.ledger.validate()
    }

    fn component_name(&self) -> &'static str {
        "AWS"
    }
}

/// DynamoDB table holding rotation attempts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamoLedgerConfig {
    /// Table name
    pub table_name: String,

    /// Provisioned read capacity used when the table is created
    pub read_capacity: i64,

    /// Provisioned write capacity used when the table is created
    pub write_capacity: i64,

    /// How long to wait for a new table to become active
    #[serde(with = "humantime_serde")]
    pub wait_timeout: Duration,
}

impl Default for DynamoLedgerConfig {
    fn default() -> Self {
        Self {
            table_name: "SecretsRotationLog".to_string(),
            read_capacity: 5,
            write_capacity: 5,
            wait_timeout: Duration::from_secs(60),
        }
    }
}

impl ComponentConfig for DynamoLedgerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let name = &self.table_name;
        if !(3..=255).contains(&name.len()) {
            return Err(ConfigError::InvalidValue {
                field: "aws.ledger.table_name".into(),
                reason: format!("must be 3 to 255 characters, got {}", name.len()),
            });
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            return Err(ConfigError::InvalidValue {
                field: "aws.ledger.table_name".into(),
                reason: "may only contain letters, digits, '_', '-' and '.'".into(),
            });
        }

        for (field, value) in [
            ("aws.ledger.read_capacity", self.read_capacity),
            ("aws.ledger.write_capacity", self.write_capacity),
        ] {
            if value < 1 {
                return Err(ConfigError::InvalidValue {
                    field: field.into(),
                    reason: format!("must be at least 1, got {value}"),
                });
            }
        }

        if self.wait_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "aws.ledger.wait_timeout".into(),
                reason: "must be non-zero".into(),
            });
        }

        Ok(())
    }

    fn component_name(&self) -> &'static str {
        "DynamoDBAuditLedger"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = AwsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ledger.table_name, "SecretsRotationLog");
        assert_eq!(config.ledger.read_capacity, 5);
        assert_eq!(config.ledger.wait_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_rejects_bad_endpoint() {
        let config = AwsConfig {
            endpoint_url: Some("localhost:4566".into()),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("aws.endpoint_url"));
    }

    #[test]
    fn test_rejects_bad_table_name() {
        let mut ledger = DynamoLedgerConfig::default();
        ledger.table_name = "rotation log".into();
        assert!(ledger.validate().is_err());

        ledger.table_name = "ab".into();
        assert!(ledger.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_wait() {
        let ledger = DynamoLedgerConfig {
            wait_timeout: Duration::ZERO,
            ..Default::default()
        };
        let err = ledger.validate().unwrap_err();
        assert!(err.to_string().contains("wait_timeout"));
    }

    #[test]
    fn test_deserializes_humantime() {
        let config: AwsConfig = serde_json::from_str(
            r#"{"region":"eu-west-1","ledger":{"table_name":"RotationAudit","wait_timeout":"2m"}}"#,
        )
        .unwrap();

        assert_eq!(config.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.ledger.table_name, "RotationAudit");
        assert_eq!(config.ledger.wait_timeout, Duration::from_secs(120));
        assert_eq!(config.ledger.write_capacity, 5);
    }
}
