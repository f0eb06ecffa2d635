//! Rotation configuration and the shared config-validation contract

use serde::{Deserialize, Serialize};

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid configuration: {field}: {reason}")]
    InvalidValue {
        /// Offending field
        field: String,
        /// Why the value is rejected
        reason: String,
    },

    /// Missing required configuration
    #[error("Missing required configuration: {field}")]
    MissingRequired {
        /// Absent field
        field: String,
    },
}

/// Trait for component configuration
///
/// Every config section that wires a component (dispatcher, AWS adapters)
/// implements this so callers can validate before constructing anything.
///
/// # Contract
///
/// - `validate()` must check all parameters and return errors that say what
///   is wrong and how to fix it
/// - `component_name()` returns a static name for logging
pub trait ComponentConfig: Send + Sync + Clone {
    /// Validate configuration parameters
    fn validate(&self) -> Result<(), ConfigError>;

    /// Component name for logging
    fn component_name(&self) -> &'static str;
}

/// How the dispatcher treats the audit ledger's backing table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerProvisioning {
    /// The table is created ahead of time (`keyrot provision-ledger`); the
    /// dispatcher never checks for it
    #[default]
    Preprovisioned,
    /// The first dispatch in a process creates the table if absent and waits
    /// for it; a failure aborts the invocation before any step runs
    Lazy,
}

/// Dispatcher configuration
///
/// # Example
///
/// ```
/// use keyrot_core::{ComponentConfig, LedgerProvisioning, RotationConfig};
///
/// let config = RotationConfig {
///     principal: Some("del-admin1".into()),
///     ledger_provisioning: LedgerProvisioning::Lazy,
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Principal whose keys are rotated when the CURRENT payload does not
    /// name one
    pub principal: Option<String>,

    /// Audit ledger provisioning mode
    pub ledger_provisioning: LedgerProvisioning,
}

/// IAM user names: 1-64 characters of `[\w+=,.@-]`.
const PRINCIPAL_MAX_LEN: usize = 64;

impl ComponentConfig for RotationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(principal) = &self.principal {
            if principal.is_empty() || principal.len() > PRINCIPAL_MAX_LEN {
                return Err(ConfigError::InvalidValue {
                    field: "principal".into(),
                    reason: format!(
                        "must be 1 to {PRINCIPAL_MAX_LEN} characters, got {}",
                        principal.len()
                    ),
                });
            }

            let valid = principal
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "_+=,.@-".contains(c));
            if !valid {
                return Err(ConfigError::InvalidValue {
                    field: "principal".into(),
                    reason: "may only contain letters, digits and _+=,.@-".into(),
                });
            }
        }

        Ok(())
    }

    fn component_name(&self) -> &'static str {
        "RotationDispatcher"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RotationConfig::default();
        assert!(config.principal.is_none());
        assert_eq!(config.ledger_provisioning, LedgerProvisioning::Preprovisioned);
        assert!(config.validate().is_ok());
        assert_eq!(config.component_name(), "RotationDispatcher");
    }

    #[test]
    fn test_rejects_bad_principal() {
        for bad in ["", "has space", "slash/name"] {
            let config = RotationConfig {
                principal: Some(bad.into()),
                ..Default::default()
            };
            let result = config.validate();
            assert!(result.is_err(), "should reject principal {bad:?}");
        }

        let config = RotationConfig {
            principal: Some("a".repeat(65)),
            ..Default::default()
        };
        assert!(
            config
                .validate()
                .unwrap_err()
                .to_string()
                .contains("must be 1 to 64 characters")
        );
    }

    #[test]
    fn test_deserializes_snake_case_mode() {
        let config: RotationConfig =
            serde_json::from_str(r#"{"ledger_provisioning":"lazy"}"#).unwrap();
        assert_eq!(config.ledger_provisioning, LedgerProvisioning::Lazy);
    }
}
