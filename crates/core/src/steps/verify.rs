use crate::dispatcher::RotationDispatcher;
use crate::error::{RotationError, RotationResult};
use crate::ports::VersionSelector;
use crate::stage::StageLabel;

use super::StepContext;

impl RotationDispatcher {
    /// `testSecret`: authenticate with the pending key.
    ///
    /// Newly minted keys can take a few seconds to propagate; a rejection is
    /// reported as a retryable failure and the driver re-invokes the step.
    pub(crate) async fn test_secret(&self, ctx: &StepContext<'_>) -> RotationResult<()> {
        let pending = self
            .read_credential(
                ctx.secret_id,
                &VersionSelector::VersionAtStage(ctx.token.clone(), StageLabel::Pending),
            )
            .await?;

        self.probe
            .verify(&pending)
            .await
            .map_err(|source| RotationError::ValidationFailed {
                secret_id: ctx.secret_id.clone(),
                source,
            })?;

        tracing::info!(access_key_id = %pending.access_key_id, "Pending key authenticated");
        Ok(())
    }
}
