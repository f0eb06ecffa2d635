use crate::dispatcher::RotationDispatcher;
use crate::error::RotationResult;

use super::StepContext;

impl RotationDispatcher {
    /// `setSecret`: access keys have no downstream system to push to.
    pub(crate) async fn set_secret(&self, ctx: &StepContext<'_>) -> RotationResult<()> {
        tracing::debug!(
            secret_id = %ctx.secret_id,
            token = %ctx.token,
            token_stages = ?ctx.stages.labels(ctx.token),
            "setSecret has nothing to deploy for access keys"
        );
        Ok(())
    }
}
