//! Rotation step dispatcher
//!
//! Entry point for one invocation of the rotation contract: validates the
//! request, checks the secret's stage layout, runs the matching step and
//! records exactly one [`RotationAttempt`] for it.
//!
//! # Example
//!
//! ```rust,ignore
//! let dispatcher = RotationDispatcher::builder()
//!     .secrets(secrets)
//!     .identity(identity)
//!     .ledger(ledger)
//!     .probe(probe)
//!     .config(config)
//!     .build()?;
//!
//! dispatcher.handle(&event).await?;
//! ```

use std::fmt;
use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::audit::{AuditRecorder, RotationAttempt};
use crate::config::{ComponentConfig, ConfigError, LedgerProvisioning, RotationConfig};
use crate::credential::AccessKeyCredential;
use crate::error::{RotationError, RotationResult};
use crate::event::{RotationEvent, RotationStep};
use crate::id::{SecretId, VersionId};
use crate::ports::{
    AuditLedger, CredentialProbe, IdentityDirectory, LedgerTable, SecretStore, VersionSelector,
};
use crate::steps::StepContext;

/// Runs rotation steps against injected service handles.
pub struct RotationDispatcher {
    pub(crate) secrets: Arc<dyn SecretStore>,
    pub(crate) identity: Arc<dyn IdentityDirectory>,
    pub(crate) probe: Arc<dyn CredentialProbe>,
    ledger: Arc<dyn AuditLedger>,
    recorder: AuditRecorder,
    pub(crate) config: RotationConfig,
    ledger_ready: OnceCell<LedgerTable>,
}

impl fmt::Debug for RotationDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotationDispatcher")
            .field("config", &self.config)
            .field("ledger_ready", &self.ledger_ready.get())
            .finish()
    }
}

impl RotationDispatcher {
    /// Start building a dispatcher
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    /// Handle one invocation record from the rotation driver.
    ///
    /// A blank `SecretId` is rejected before dispatch and is the one outcome
    /// with no [`RotationAttempt`]: the ledger is keyed by secret id and has
    /// nothing to file it under. It is logged at `error` instead.
    pub async fn handle(&self, event: &RotationEvent) -> RotationResult<()> {
        let secret_id = SecretId::new(event.secret_id.as_str()).map_err(|e| {
            tracing::error!(
                step = %event.step,
                token = %event.client_request_token,
                error = %e,
                "Rejected rotation event without a usable SecretId"
            );
            RotationError::InvalidRequest {
                reason: format!("SecretId: {e}"),
            }
        })?;
        self.handle_step(&secret_id, &event.client_request_token, &event.step)
            .await
    }

    /// Run `step` for `secret_id` with request token `token`.
    ///
    /// The outcome is appended to the audit ledger before it is returned; a
    /// handler error is passed back unchanged after the audit write.
    #[tracing::instrument(skip(self), fields(secret_id = %secret_id))]
    pub async fn handle_step(
        &self,
        secret_id: &SecretId,
        token: &str,
        step: &str,
    ) -> RotationResult<()> {
        self.ensure_ledger().await?;

        let outcome = self.dispatch(secret_id, token, step).await;

        let attempt = match &outcome {
            Ok(()) => {
                tracing::info!("Rotation step completed");
                RotationAttempt::success(secret_id.clone(), token, step)
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    kind = ?e.kind(),
                    retryable = e.is_retryable(),
                    "Rotation step failed"
                );
                RotationAttempt::failure(secret_id.clone(), token, step, e)
            }
        };
        self.recorder.record(&attempt).await;

        outcome
    }

    async fn dispatch(&self, secret_id: &SecretId, token: &str, step: &str) -> RotationResult<()> {
        let step: RotationStep = step.parse()?;
        let token = VersionId::new(token).map_err(|e| RotationError::InvalidRequest {
            reason: format!("ClientRequestToken: {e}"),
        })?;

        let stages = self.secrets.describe(secret_id).await?;
        let current = stages.current_version(secret_id)?;
        tracing::debug!(current_version = %current, versions = stages.len(), "Resolved current version");

        let ctx = StepContext {
            secret_id,
            token: &token,
            current: &current,
            stages: &stages,
        };

        match step {
            RotationStep::CreateSecret => self.create_secret(&ctx).await,
            RotationStep::SetSecret => self.set_secret(&ctx).await,
            RotationStep::TestSecret => self.test_secret(&ctx).await,
            RotationStep::FinishSecret => self.finish_secret(&ctx).await,
        }
    }

    /// Lazy provisioning runs once per dispatcher; a failure is not cached
    async fn ensure_ledger(&self) -> RotationResult<()> {
        if self.config.ledger_provisioning == LedgerProvisioning::Preprovisioned {
            return Ok(());
        }

        self.ledger_ready
            .get_or_try_init(|| async {
                let table = self.ledger.ensure_table().await?;
                tracing::info!(?table, "Audit ledger ready");
                Ok::<_, crate::error::ServiceError>(table)
            })
            .await
            .map(|_| ())
            .map_err(|source| {
                tracing::error!(error = %source, "Audit ledger could not be provisioned");
                RotationError::LedgerUnavailable { source }
            })
    }

    /// Read and decode an access-key payload
    pub(crate) async fn read_credential(
        &self,
        secret_id: &SecretId,
        selector: &VersionSelector,
    ) -> RotationResult<AccessKeyCredential> {
        let value = self.secrets.get_value(secret_id, selector).await?;
        AccessKeyCredential::from_payload(&value.payload).map_err(|e| {
            RotationError::MalformedPayload {
                secret_id: secret_id.clone(),
                version: value.version_id.to_string(),
                reason: e.to_string(),
            }
        })
    }

    /// Principal named by a payload, else the configured one
    pub(crate) fn resolve_principal(
        &self,
        secret_id: &SecretId,
        hint: Option<String>,
    ) -> RotationResult<String> {
        if let (Some(named), Some(configured)) = (&hint, &self.config.principal)
            && named != configured
        {
            tracing::warn!(
                payload_principal = %named,
                configured_principal = %configured,
                "Secret payload names a different principal than configuration; using the payload"
            );
        }

        hint.or_else(|| self.config.principal.clone())
            .ok_or_else(|| RotationError::MissingPrincipal {
                secret_id: secret_id.clone(),
            })
    }
}

/// Builder for [`RotationDispatcher`]
#[derive(Default)]
pub struct DispatcherBuilder {
    secrets: Option<Arc<dyn SecretStore>>,
    identity: Option<Arc<dyn IdentityDirectory>>,
    probe: Option<Arc<dyn CredentialProbe>>,
    ledger: Option<Arc<dyn AuditLedger>>,
    config: RotationConfig,
}

impl DispatcherBuilder {
    /// Secret store holding the staged versions
    pub fn secrets(mut self, secrets: Arc<dyn SecretStore>) -> Self {
        self.secrets = Some(secrets);
        self
    }

    /// Identity directory owning the access keys
    pub fn identity(mut self, identity: Arc<dyn IdentityDirectory>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Probe used by `testSecret`
    pub fn probe(mut self, probe: Arc<dyn CredentialProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Audit ledger
    pub fn ledger(mut self, ledger: Arc<dyn AuditLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Dispatcher configuration
    pub fn config(mut self, config: RotationConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate the configuration and assemble the dispatcher
    pub fn build(self) -> Result<RotationDispatcher, ConfigError> {
        self.config.validate()?;

        let missing = |field: &str| ConfigError::MissingRequired {
            field: field.to_string(),
        };
        let ledger = self.ledger.ok_or_else(|| missing("ledger"))?;

        Ok(RotationDispatcher {
            secrets: self.secrets.ok_or_else(|| missing("secrets"))?,
            identity: self.identity.ok_or_else(|| missing("identity"))?,
            probe: self.probe.ok_or_else(|| missing("probe"))?,
            recorder: AuditRecorder::new(ledger.clone()),
            ledger,
            config: self.config,
            ledger_ready: OnceCell::new(),
        })
    }
}

impl fmt::Debug for DispatcherBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherBuilder")
            .field("secrets", &self.secrets.is_some())
            .field("identity", &self.identity.is_some())
            .field("probe", &self.probe.is_some())
            .field("ledger", &self.ledger.is_some())
            .field("config", &self.config)
            .finish()
    }
}
