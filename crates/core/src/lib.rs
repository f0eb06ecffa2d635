//! # keyrot-core
//!
//! Staged rotation of IAM access keys held in a versioned secret store.
//!
//! A rotation driver invokes [`RotationDispatcher::handle`] once per step of
//! the four-step contract:
//!
//! ```text
//! createSecret → setSecret → testSecret → finishSecret
//! ```
//!
//! - **createSecret** mints a key and stores it under the PENDING stage
//! - **setSecret** has nothing to deploy for access keys
//! - **testSecret** authenticates with the pending key
//! - **finishSecret** promotes the pending version to CURRENT and retires the
//!   key of the PREVIOUS version
//!
//! Every invocation with a usable secret id appends one [`RotationAttempt`]
//! to the audit ledger.
//!
//! External systems are reached through the traits in [`ports`]; the AWS
//! implementations live in `keyrot-aws` and in-memory doubles in
//! [`testing`] (behind the `test-util` feature).
//!
//! ## Usage
//!
//! ```rust,ignore
//! use keyrot_core::prelude::*;
//!
//! let dispatcher = RotationDispatcher::builder()
//!     .secrets(secrets)
//!     .identity(identity)
//!     .probe(probe)
//!     .ledger(ledger)
//!     .build()?;
//!
//! let event = RotationEvent::new(secret_arn, token, RotationStep::CreateSecret);
//! dispatcher.handle(&event).await?;
//! ```

pub mod audit;
pub mod config;
pub mod credential;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod id;
pub mod maintenance;
pub mod ports;
pub mod stage;
mod steps;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use audit::{AttemptStatus, AuditRecorder, RotationAttempt};
pub use config::{ComponentConfig, ConfigError, LedgerProvisioning, RotationConfig};
pub use credential::{AccessKeyCredential, AccessKeyStatus, AccessKeySummary, principal_hint};
pub use dispatcher::{DispatcherBuilder, RotationDispatcher};
pub use error::{ErrorKind, RotationError, RotationResult, ServiceError, ServiceErrorKind};
pub use event::{RotationEvent, RotationStep};
pub use id::{IdError, SecretId, VersionId};
pub use maintenance::{KeyMaintenance, PurgeReport, RotateNowReport};
pub use ports::{
    AuditLedger, CredentialProbe, IdentityDirectory, LedgerTable, SecretStore, SecretValue,
    VersionSelector,
};
pub use stage::{StageLabel, VersionStages};

/// Common imports for hosts wiring a dispatcher
pub mod prelude {
    pub use super::{
        AccessKeyCredential, AuditLedger, ComponentConfig, CredentialProbe, ErrorKind,
        IdentityDirectory, KeyMaintenance, LedgerProvisioning, RotationConfig, RotationDispatcher,
        RotationError, RotationEvent, RotationResult, RotationStep, SecretId, SecretStore,
        ServiceError, ServiceErrorKind,
    };
}
