//! Rotation attempt records and the best-effort audit writer

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RotationError;
use crate::id::SecretId;
use crate::ports::AuditLedger;

/// Outcome of one step invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttemptStatus {
    /// The step handler returned `Ok`
    Success,
    /// The step handler (or its pre-conditions) failed
    Failure,
}

impl AttemptStatus {
    /// Wire value stored in the ledger
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        }
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit ledger entry. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationAttempt {
    /// Secret under rotation
    pub secret_id: SecretId,
    /// Request token of the invocation
    pub client_request_token: String,
    /// Step name as received, including unrecognised ones
    pub step: String,
    /// Outcome
    pub status: AttemptStatus,
    /// When the outcome was recorded
    pub timestamp: DateTime<Utc>,
    /// Failure detail
    pub error: Option<String>,
}

impl RotationAttempt {
    /// Successful attempt stamped now
    pub fn success(
        secret_id: SecretId,
        client_request_token: impl Into<String>,
        step: impl Into<String>,
    ) -> Self {
        Self {
            secret_id,
            client_request_token: client_request_token.into(),
            step: step.into(),
            status: AttemptStatus::Success,
            timestamp: Utc::now(),
            error: None,
        }
    }

    /// Failed attempt stamped now
    pub fn failure(
        secret_id: SecretId,
        client_request_token: impl Into<String>,
        step: impl Into<String>,
        error: &RotationError,
    ) -> Self {
        Self {
            status: AttemptStatus::Failure,
            error: Some(error.to_string()),
            ..Self::success(secret_id, client_request_token, step)
        }
    }

    /// Sortable timestamp key, e.g. `2026-10-15T09:30:12.123456Z`
    pub fn timestamp_key(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

/// Writes attempts to the ledger without ever failing the caller.
///
/// A ledger outage must not mask the step's own error, so append failures
/// are only reported through the process log.
#[derive(Clone)]
pub struct AuditRecorder {
    ledger: Arc<dyn AuditLedger>,
}

impl AuditRecorder {
    /// Wrap a ledger
    pub fn new(ledger: Arc<dyn AuditLedger>) -> Self {
        Self { ledger }
    }

    /// Append `attempt`; returns whether it was persisted
    pub async fn record(&self, attempt: &RotationAttempt) -> bool {
        match self.ledger.append(attempt).await {
            Ok(()) => {
                tracing::info!(
                    secret_id = %attempt.secret_id,
                    step = %attempt.step,
                    status = %attempt.status,
                    "Recorded rotation attempt"
                );
                true
            }
            Err(e) => {
                tracing::error!(
                    secret_id = %attempt.secret_id,
                    step = %attempt.step,
                    status = %attempt.status,
                    error = %e,
                    "Failed to record rotation attempt"
                );
                false
            }
        }
    }
}

impl fmt::Debug for AuditRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditRecorder").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::testing::InMemoryAuditLedger;

    fn secret() -> SecretId {
        SecretId::new("S1").unwrap()
    }

    #[test]
    fn test_failure_carries_error_text() {
        let err = RotationError::InvalidStep {
            step: "bogusStep".into(),
        };
        let attempt = RotationAttempt::failure(secret(), "T1", "bogusStep", &err);

        assert_eq!(attempt.status, AttemptStatus::Failure);
        assert_eq!(attempt.error.as_deref(), Some("invalid rotation step 'bogusStep'"));
    }

    #[test]
    fn test_timestamp_key_is_utc_micros() {
        let attempt = RotationAttempt::success(secret(), "T1", "setSecret");
        let key = attempt.timestamp_key();
        assert!(key.ends_with('Z'));
        assert_eq!(key.split('.').nth(1).map(str::len), Some(7));
    }

    #[tokio::test]
    async fn test_recorder_swallows_ledger_failure() {
        let ledger = Arc::new(InMemoryAuditLedger::new());
        ledger.fail_next_append(ServiceError::not_found(
            "dynamodb",
            "PutItem",
            "Requested resource not found",
        ));
        let recorder = AuditRecorder::new(ledger.clone());

        let attempt = RotationAttempt::success(secret(), "T1", "createSecret");
        assert!(!recorder.record(&attempt).await);
        assert!(ledger.attempts().is_empty());

        assert!(recorder.record(&attempt).await);
        assert_eq!(ledger.attempts().len(), 1);
    }
}
