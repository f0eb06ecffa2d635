use crate::credential::{AccessKeyCredential, AccessKeyStatus};
use crate::dispatcher::RotationDispatcher;
use crate::error::{RotationError, RotationResult};
use crate::ports::VersionSelector;
use crate::stage::StageLabel;

use super::StepContext;

/// What happened to the key of the PREVIOUS version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retirement {
    /// Deactivated and deleted by this invocation
    Retired,
    /// Already gone from the identity directory
    AlreadyRetired,
}

impl RotationDispatcher {
    /// `finishSecret`: promote the token version and retire the old key.
    ///
    /// Only a PENDING token version is promoted. A token that is already
    /// CURRENT skips the move; any other token is refused before any stage
    /// or key is touched.
    pub(crate) async fn finish_secret(&self, ctx: &StepContext<'_>) -> RotationResult<()> {
        if ctx.current == ctx.token {
            tracing::info!(token = %ctx.token, "Token version is already current");
        } else if !ctx.stages.holds(ctx.token, &StageLabel::Pending) {
            return Err(RotationError::TokenNotPending {
                secret_id: ctx.secret_id.clone(),
                token: ctx.token.clone(),
            });
        } else {
            self.secrets
                .move_stage(
                    ctx.secret_id,
                    &StageLabel::Current,
                    ctx.token,
                    Some(ctx.current),
                )
                .await?;
            tracing::info!(
                token = %ctx.token,
                demoted = %ctx.current,
                "Promoted token version to current"
            );
        }

        let previous = match self
            .secrets
            .get_value(ctx.secret_id, &VersionSelector::Stage(StageLabel::Previous))
            .await
        {
            Ok(value) => value,
            Err(e) if e.is_not_found() => {
                tracing::info!("No previous version, nothing to retire");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let Ok(previous_key) = AccessKeyCredential::from_payload(&previous.payload) else {
            tracing::warn!(
                version = %previous.version_id,
                "Previous version holds no access key, nothing to retire"
            );
            return Ok(());
        };

        let current_key = self
            .read_credential(
                ctx.secret_id,
                &VersionSelector::VersionAtStage(ctx.token.clone(), StageLabel::Current),
            )
            .await?;
        if previous_key.access_key_id == current_key.access_key_id {
            return Err(RotationError::RetireCurrentKey {
                secret_id: ctx.secret_id.clone(),
                access_key_id: previous_key.access_key_id,
            });
        }

        let principal = self.resolve_principal(
            ctx.secret_id,
            previous_key.principal().map(str::to_string),
        )?;

        match self.retire_key(&principal, &previous_key.access_key_id).await? {
            Retirement::Retired => tracing::info!(
                principal = %principal,
                access_key_id = %previous_key.access_key_id,
                "Retired previous access key"
            ),
            Retirement::AlreadyRetired => tracing::warn!(
                principal = %principal,
                access_key_id = %previous_key.access_key_id,
                "Previous access key was already gone"
            ),
        }

        Ok(())
    }

    /// Deactivate, then delete. A key that no longer exists counts as retired.
    async fn retire_key(&self, principal: &str, access_key_id: &str) -> RotationResult<Retirement> {
        match self
            .identity
            .update_access_key_status(principal, access_key_id, AccessKeyStatus::Inactive)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Ok(Retirement::AlreadyRetired),
            Err(e) => return Err(e.into()),
        }

        match self.identity.delete_access_key(principal, access_key_id).await {
            Ok(()) => Ok(Retirement::Retired),
            Err(e) if e.is_not_found() => Ok(Retirement::AlreadyRetired),
            Err(e) => Err(e.into()),
        }
    }
}
