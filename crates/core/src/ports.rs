//! Contracts of the external systems a rotation talks to.
//!
//! The dispatcher only ever holds these as `Arc<dyn _>`, so production
//! adapters (see `keyrot-aws`) and the in-memory doubles in
//! [`crate::testing`] are interchangeable.

use async_trait::async_trait;
use secrecy::SecretString;

use crate::audit::RotationAttempt;
use crate::credential::{AccessKeyCredential, AccessKeyStatus, AccessKeySummary};
use crate::error::ServiceError;
use crate::id::{SecretId, VersionId};
use crate::stage::{StageLabel, VersionStages};

/// Which version of a secret to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSelector {
    /// Whichever version holds the label
    Stage(StageLabel),
    /// A specific version, which must also hold the label
    VersionAtStage(VersionId, StageLabel),
}

/// A secret version's payload.
#[derive(Debug)]
pub struct SecretValue {
    /// Version that was read
    pub version_id: VersionId,
    /// Secret payload
    pub payload: SecretString,
}

/// Versioned secret store with movable stage labels.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Every live version of the secret and its labels
    async fn describe(&self, secret_id: &SecretId) -> Result<VersionStages, ServiceError>;

    /// Read one version's payload
    async fn get_value(
        &self,
        secret_id: &SecretId,
        selector: &VersionSelector,
    ) -> Result<SecretValue, ServiceError>;

    /// Create version `token` with `payload`, attaching `stages`.
    ///
    /// Re-putting an identical payload under the same token is a no-op.
    async fn put_value(
        &self,
        secret_id: &SecretId,
        token: &VersionId,
        payload: &SecretString,
        stages: &[StageLabel],
    ) -> Result<(), ServiceError>;

    /// Move `stage` onto `move_to`.
    ///
    /// `remove_from` names the version currently holding the stage. Moving
    /// CURRENT demotes its previous holder to PREVIOUS.
    async fn move_stage(
        &self,
        secret_id: &SecretId,
        stage: &StageLabel,
        move_to: &VersionId,
        remove_from: Option<&VersionId>,
    ) -> Result<(), ServiceError>;

    /// Overwrite the secret with a new CURRENT version
    async fn update_value(
        &self,
        secret_id: &SecretId,
        payload: &SecretString,
    ) -> Result<VersionId, ServiceError>;
}

/// Access-key lifecycle for named principals.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Mint a new active key; the only time its secret half is visible
    async fn create_access_key(&self, principal: &str) -> Result<AccessKeyCredential, ServiceError>;

    /// Activate or deactivate a key
    async fn update_access_key_status(
        &self,
        principal: &str,
        access_key_id: &str,
        status: AccessKeyStatus,
    ) -> Result<(), ServiceError>;

    /// Delete a key
    async fn delete_access_key(&self, principal: &str, access_key_id: &str)
    -> Result<(), ServiceError>;

    /// List the principal's keys
    async fn list_access_keys(&self, principal: &str)
    -> Result<Vec<AccessKeySummary>, ServiceError>;
}

/// Outcome of ensuring the ledger table exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerTable {
    /// The table was already there
    Existing,
    /// The table was created and is now usable
    Created,
}

/// Append-only log of rotation attempts.
#[async_trait]
pub trait AuditLedger: Send + Sync {
    /// Create the backing table if absent and wait until it accepts writes
    async fn ensure_table(&self) -> Result<LedgerTable, ServiceError>;

    /// Append one attempt record
    async fn append(&self, attempt: &RotationAttempt) -> Result<(), ServiceError>;
}

/// Proves a credential authenticates against a live service.
#[async_trait]
pub trait CredentialProbe: Send + Sync {
    /// Make a minimal read-only call authenticated with `credential`
    async fn verify(&self, credential: &AccessKeyCredential) -> Result<(), ServiceError>;
}
