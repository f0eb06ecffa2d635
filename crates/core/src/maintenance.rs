//! Single-shot key maintenance outside the staged rotation contract.
//!
//! [`KeyMaintenance::rotate_now`] replaces a principal's keys in one pass and
//! overwrites the secret directly; [`KeyMaintenance::purge_inactive`] deletes
//! keys left behind in the `Inactive` state. Neither touches stage labels
//! other than the CURRENT label the secret store moves on overwrite.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::credential::{AccessKeyStatus, principal_hint};
use crate::error::{RotationError, RotationResult};
use crate::id::{SecretId, VersionId};
use crate::ports::{IdentityDirectory, SecretStore, VersionSelector};
use crate::stage::StageLabel;

/// Result of [`KeyMaintenance::rotate_now`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RotateNowReport {
    /// Principal whose keys were rotated
    pub principal: String,
    /// Keys switched to `Inactive`
    pub deactivated: Vec<String>,
    /// Id of the freshly minted key
    pub new_access_key_id: String,
    /// Secret version now holding the new key
    pub version_id: VersionId,
}

/// Result of [`KeyMaintenance::purge_inactive`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    /// Principal whose keys were inspected
    pub principal: String,
    /// Keys deleted
    pub deleted: Vec<String>,
    /// Active keys left untouched
    pub retained: Vec<String>,
}

/// Operator procedures acting on one secret's principal.
pub struct KeyMaintenance {
    secrets: Arc<dyn SecretStore>,
    identity: Arc<dyn IdentityDirectory>,
    principal: Option<String>,
}

impl KeyMaintenance {
    /// Create maintenance procedures; `principal` is the fallback when the
    /// secret payload does not name one
    pub fn new(
        secrets: Arc<dyn SecretStore>,
        identity: Arc<dyn IdentityDirectory>,
        principal: Option<String>,
    ) -> Self {
        Self {
            secrets,
            identity,
            principal,
        }
    }

    /// Deactivate every active key, mint a replacement and store it as the
    /// new CURRENT value.
    ///
    /// The identity directory allows two keys per principal, so a principal
    /// already holding two keys must be purged first.
    #[tracing::instrument(skip(self), fields(secret_id = %secret_id))]
    pub async fn rotate_now(&self, secret_id: &SecretId) -> RotationResult<RotateNowReport> {
        let principal = self.principal_of(secret_id).await?;

        let mut deactivated = Vec::new();
        for key in self.identity.list_access_keys(&principal).await? {
            if key.status != AccessKeyStatus::Active {
                continue;
            }
            self.identity
                .update_access_key_status(&principal, &key.access_key_id, AccessKeyStatus::Inactive)
                .await?;
            tracing::info!(access_key_id = %key.access_key_id, "Deactivated access key");
            deactivated.push(key.access_key_id);
        }

        let minted = self.identity.create_access_key(&principal).await?;
        let version_id = self
            .secrets
            .update_value(secret_id, &minted.to_maintenance_payload())
            .await?;
        tracing::info!(
            access_key_id = %minted.access_key_id,
            version = %version_id,
            "Stored replacement access key"
        );

        Ok(RotateNowReport {
            principal,
            deactivated,
            new_access_key_id: minted.access_key_id,
            version_id,
        })
    }

    /// Delete every inactive key of the secret's principal
    #[tracing::instrument(skip(self), fields(secret_id = %secret_id))]
    pub async fn purge_inactive(&self, secret_id: &SecretId) -> RotationResult<PurgeReport> {
        let principal = self.principal_of(secret_id).await?;

        let mut report = PurgeReport {
            principal,
            deleted: Vec::new(),
            retained: Vec::new(),
        };
        for key in self.identity.list_access_keys(&report.principal).await? {
            match key.status {
                AccessKeyStatus::Inactive => {
                    match self
                        .identity
                        .delete_access_key(&report.principal, &key.access_key_id)
                        .await
                    {
                        Ok(()) => {}
                        Err(e) if e.is_not_found() => {
                            tracing::warn!(access_key_id = %key.access_key_id, "Key vanished before delete");
                        }
                        Err(e) => return Err(e.into()),
                    }
                    tracing::info!(access_key_id = %key.access_key_id, "Deleted inactive access key");
                    report.deleted.push(key.access_key_id);
                }
                AccessKeyStatus::Active => report.retained.push(key.access_key_id),
            }
        }

        Ok(report)
    }

    async fn principal_of(&self, secret_id: &SecretId) -> RotationResult<String> {
        let current = self
            .secrets
            .get_value(secret_id, &VersionSelector::Stage(StageLabel::Current))
            .await?;
        let hint = principal_hint(&current.payload).map_err(|e| RotationError::MalformedPayload {
            secret_id: secret_id.clone(),
            version: current.version_id.to_string(),
            reason: e.to_string(),
        })?;

        hint.or_else(|| self.principal.clone())
            .ok_or_else(|| RotationError::MissingPrincipal {
                secret_id: secret_id.clone(),
            })
    }
}

impl fmt::Debug for KeyMaintenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaintenance")
            .field("principal", &self.principal)
            .finish_non_exhaustive()
    }
}
