//! The four rotation step handlers.
//!
//! Each handler is an inherent method on [`RotationDispatcher`] and runs only
//! after the dispatcher has confirmed the secret has exactly one CURRENT
//! version.
//!
//! [`RotationDispatcher`]: crate::RotationDispatcher

mod create;
mod finish;
mod set;
mod verify;

use crate::id::{SecretId, VersionId};
use crate::stage::VersionStages;

/// Facts resolved by the dispatcher before a handler runs.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StepContext<'a> {
    /// Secret under rotation
    pub secret_id: &'a SecretId,
    /// Request token; also the id of the version being rotated in
    pub token: &'a VersionId,
    /// The version holding CURRENT at dispatch time
    pub current: &'a VersionId,
    /// Stage layout at dispatch time
    pub stages: &'a VersionStages,
}
