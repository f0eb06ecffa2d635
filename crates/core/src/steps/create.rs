use crate::credential::{AccessKeyCredential, principal_hint};
use crate::dispatcher::RotationDispatcher;
use crate::error::{RotationError, RotationResult};
use crate::ports::VersionSelector;
use crate::stage::StageLabel;

use super::StepContext;

impl RotationDispatcher {
    /// `createSecret`: mint a key and store it as the PENDING version.
    ///
    /// A re-run for a token whose PENDING version already holds a key does
    /// nothing, so a retried invocation never mints a second key.
    pub(crate) async fn create_secret(&self, ctx: &StepContext<'_>) -> RotationResult<()> {
        let pending = VersionSelector::VersionAtStage(ctx.token.clone(), StageLabel::Pending);
        match self.read_credential(ctx.secret_id, &pending).await {
            Ok(existing) => {
                tracing::info!(
                    token = %ctx.token,
                    access_key_id = %existing.access_key_id,
                    "Pending version already holds a key, skipping creation"
                );
                return Ok(());
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        // a labelled token version that is not PENDING belongs to a finished
        // or superseded rotation
        if ctx.stages.labels(ctx.token).is_some() {
            return Err(RotationError::TokenNotPending {
                secret_id: ctx.secret_id.clone(),
                token: ctx.token.clone(),
            });
        }

        let current = self
            .secrets
            .get_value(ctx.secret_id, &VersionSelector::Stage(StageLabel::Current))
            .await?;
        let hint =
            principal_hint(&current.payload).map_err(|e| RotationError::MalformedPayload {
                secret_id: ctx.secret_id.clone(),
                version: current.version_id.to_string(),
                reason: e.to_string(),
            })?;
        let principal = self.resolve_principal(ctx.secret_id, hint)?;

        let minted = self.identity.create_access_key(&principal).await?;
        tracing::info!(
            principal = %principal,
            access_key_id = %minted.access_key_id,
            "Minted access key"
        );

        if let Err(e) = self
            .secrets
            .put_value(
                ctx.secret_id,
                ctx.token,
                &minted.to_payload(),
                &[StageLabel::Pending],
            )
            .await
        {
            self.discard_minted(&principal, &minted).await;
            return Err(e.into());
        }

        tracing::info!(token = %ctx.token, "Stored pending version");
        Ok(())
    }

    /// Best effort; an orphaned key is logged so an operator can remove it
    async fn discard_minted(&self, principal: &str, minted: &AccessKeyCredential) {
        match self
            .identity
            .delete_access_key(principal, &minted.access_key_id)
            .await
        {
            Ok(()) => tracing::warn!(
                access_key_id = %minted.access_key_id,
                "Deleted minted key after the pending version could not be stored"
            ),
            Err(e) => tracing::error!(
                principal = %principal,
                access_key_id = %minted.access_key_id,
                error = %e,
                "Minted key is orphaned and must be deleted manually"
            ),
        }
    }
}
