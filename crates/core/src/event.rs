//! Rotation invocation records and step names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RotationError;

/// One of the four steps of the rotation contract.
///
/// ```text
/// createSecret → setSecret → testSecret → finishSecret
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RotationStep {
    /// Mint a new key and store it as the PENDING version
    CreateSecret,
    /// Deploy the pending key to downstream consumers
    SetSecret,
    /// Prove the pending key authenticates
    TestSecret,
    /// Promote the pending version and retire the previous key
    FinishSecret,
}

impl RotationStep {
    /// All steps in contract order
    pub const ALL: [Self; 4] = [
        Self::CreateSecret,
        Self::SetSecret,
        Self::TestSecret,
        Self::FinishSecret,
    ];

    /// Wire name of the step
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateSecret => "createSecret",
            Self::SetSecret => "setSecret",
            Self::TestSecret => "testSecret",
            Self::FinishSecret => "finishSecret",
        }
    }
}

impl fmt::Display for RotationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RotationStep {
    type Err = RotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| RotationError::InvalidStep { step: s.to_string() })
    }
}

/// Invocation record delivered by the rotation driver.
///
/// The step stays a raw string so an unknown step can still be audited
/// under the name it arrived with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RotationEvent {
    /// Secret under rotation
    pub secret_id: String,
    /// Idempotency token shared by all steps of one rotation
    pub client_request_token: String,
    /// Step name
    pub step: String,
}

impl RotationEvent {
    /// Build an event for a known step
    pub fn new(
        secret_id: impl Into<String>,
        client_request_token: impl Into<String>,
        step: RotationStep,
    ) -> Self {
        Self {
            secret_id: secret_id.into(),
            client_request_token: client_request_token.into(),
            step: step.as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("createSecret", RotationStep::CreateSecret)]
    #[case("setSecret", RotationStep::SetSecret)]
    #[case("testSecret", RotationStep::TestSecret)]
    #[case("finishSecret", RotationStep::FinishSecret)]
    fn parses_wire_names(#[case] raw: &str, #[case] expected: RotationStep) {
        assert_eq!(raw.parse::<RotationStep>().unwrap(), expected);
        assert_eq!(expected.to_string(), raw);
    }

    #[rstest]
    #[case("bogusStep")]
    #[case("CreateSecret")]
    #[case("")]
    fn rejects_unknown_steps(#[case] raw: &str) {
        let err = raw.parse::<RotationStep>().unwrap_err();
        assert!(matches!(err, RotationError::InvalidStep { step } if step == raw));
    }

    #[test]
    fn deserializes_platform_event() {
        let json = r#"{"SecretId":"S1","ClientRequestToken":"T1","Step":"createSecret"}"#;
        let event: RotationEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event, RotationEvent::new("S1", "T1", RotationStep::CreateSecret));
    }
}
