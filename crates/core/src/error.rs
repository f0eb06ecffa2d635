//! Error types for rotation operations
//!
//! Two tiers:
//! - [`ServiceError`]: a failed call against one of the external systems
//!   (secret store, identity directory, audit ledger, credential probe).
//!   Adapters classify their SDK errors into a [`ServiceErrorKind`].
//! - [`RotationError`]: what a step handler or the dispatcher reports back to
//!   the rotation driver. Every variant falls into one [`ErrorKind`].
//!
//! ```
//! use keyrot_core::{ErrorKind, RotationError, ServiceError};
//!
//! let err: RotationError = ServiceError::not_found("iam", "DeleteAccessKey", "AKIA1").into();
//! assert_eq!(err.kind(), ErrorKind::Dependency);
//! assert!(err.is_not_found());
//! ```

use std::fmt;

use thiserror::Error;

use crate::id::{SecretId, VersionId};

/// Classification of a failed external call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceErrorKind {
    /// The addressed resource (secret, version, key, table) does not exist
    NotFound,
    /// A create call collided with an existing resource
    AlreadyExists,
    /// Authentication or authorization was rejected
    AccessDenied,
    /// A service quota was hit (e.g. two access keys per user)
    LimitExceeded,
    /// The request was throttled
    Throttled,
    /// The request was malformed or not valid in the resource's current state
    InvalidRequest,
    /// Network failure, timeout, or a 5xx from the service
    Unavailable,
    /// Anything else
    Other,
}

impl fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "not found",
            Self::AlreadyExists => "already exists",
            Self::AccessDenied => "access denied",
            Self::LimitExceeded => "limit exceeded",
            Self::Throttled => "throttled",
            Self::InvalidRequest => "invalid request",
            Self::Unavailable => "unavailable",
            Self::Other => "error",
        };
        f.write_str(name)
    }
}

/// A failed call against an external system.
#[derive(Debug, Clone, Error)]
#[error("{service} {operation} failed ({kind}): {message}")]
pub struct ServiceError {
    /// Short service name, e.g. `"secretsmanager"`
    pub service: &'static str,
    /// API operation, e.g. `"PutSecretValue"`
    pub operation: &'static str,
    /// Classified failure
    pub kind: ServiceErrorKind,
    /// Service-provided detail
    pub message: String,
}

impl ServiceError {
    /// Create a new service error
    pub fn new(
        service: &'static str,
        operation: &'static str,
        kind: ServiceErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            service,
            operation,
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for a [`ServiceErrorKind::NotFound`] error
    pub fn not_found(
        service: &'static str,
        operation: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::new(service, operation, ServiceErrorKind::NotFound, message)
    }

    /// Whether the addressed resource does not exist
    pub fn is_not_found(&self) -> bool {
        self.kind == ServiceErrorKind::NotFound
    }

    /// Whether re-running the same step later can reasonably succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self.kind,
            ServiceErrorKind::InvalidRequest | ServiceErrorKind::AlreadyExists
        )
    }
}

/// Error taxonomy reported to the rotation driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The invocation itself is unusable; never retried
    Input,
    /// An external call failed; the driver retries on its own schedule
    Dependency,
    /// The systems disagree about which key is current
    Consistency,
}

/// Errors returned by the rotation step handlers and the dispatcher.
#[derive(Debug, Error)]
pub enum RotationError {
    /// The step name is not one of the four rotation steps
    #[error("invalid rotation step '{step}'")]
    InvalidStep {
        /// Step name as received
        step: String,
    },

    /// The secret identifier or request token is empty or malformed
    #[error("invalid rotation request: {reason}")]
    InvalidRequest {
        /// What is wrong with the request
        reason: String,
    },

    /// No version of the secret carries the CURRENT stage
    #[error("secret '{secret_id}' has no version labelled AWSCURRENT")]
    NoCurrentVersion {
        /// Secret being rotated
        secret_id: SecretId,
    },

    /// More than one version claims the CURRENT stage
    #[error("secret '{secret_id}' has {} versions labelled AWSCURRENT", versions.len())]
    AmbiguousCurrentVersion {
        /// Secret being rotated
        secret_id: SecretId,
        /// Every version holding CURRENT
        versions: Vec<VersionId>,
    },

    /// A secret version does not hold an access-key payload
    #[error("secret '{secret_id}' version {version} holds a malformed access key payload: {reason}")]
    MalformedPayload {
        /// Secret being rotated
        secret_id: SecretId,
        /// Version or stage that was read
        version: String,
        /// Decoder message
        reason: String,
    },

    /// Neither the CURRENT payload nor the configuration names a principal
    #[error("no principal found for secret '{secret_id}' in its payload or configuration")]
    MissingPrincipal {
        /// Secret being rotated
        secret_id: SecretId,
    },

    /// The pending credential was rejected by the probe service
    #[error("pending credential for '{secret_id}' failed validation: {source}")]
    ValidationFailed {
        /// Secret being rotated
        secret_id: SecretId,
        /// Probe failure
        #[source]
        source: ServiceError,
    },

    /// The PREVIOUS version points at the key that is now CURRENT
    #[error("refusing to retire access key '{access_key_id}' of '{secret_id}': it is the current key")]
    RetireCurrentKey {
        /// Secret being rotated
        secret_id: SecretId,
        /// Key that would have been deleted
        access_key_id: String,
    },

    /// The request token names a version that is neither PENDING nor CURRENT,
    /// e.g. a late re-delivery for a rotation that has already been superseded
    #[error("version '{token}' of secret '{secret_id}' is not staged as AWSPENDING")]
    TokenNotPending {
        /// Secret being rotated
        secret_id: SecretId,
        /// Request token as received
        token: VersionId,
    },

    /// The audit ledger could not be provisioned on first use
    #[error("audit ledger unavailable: {source}")]
    LedgerUnavailable {
        /// Provisioning failure
        #[source]
        source: ServiceError,
    },

    /// A call to an external system failed
    #[error(transparent)]
    Dependency(#[from] ServiceError),
}

impl RotationError {
    /// Where this error sits in the rotation error taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidStep { .. } | Self::InvalidRequest { .. } => ErrorKind::Input,
            Self::NoCurrentVersion { .. }
            | Self::AmbiguousCurrentVersion { .. }
            | Self::MalformedPayload { .. }
            | Self::RetireCurrentKey { .. }
            | Self::TokenNotPending { .. } => ErrorKind::Consistency,
            Self::MissingPrincipal { .. } => ErrorKind::Input,
            Self::ValidationFailed { .. }
            | Self::LedgerUnavailable { .. }
            | Self::Dependency(_) => ErrorKind::Dependency,
        }
    }

    /// Whether the rotation driver should re-invoke the same step later
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ValidationFailed { .. } => true,
            Self::LedgerUnavailable { source } | Self::Dependency(source) => {
                source.is_retryable()
            }
            _ => false,
        }
    }

    /// Whether the underlying external resource was missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Dependency(source) if source.is_not_found())
    }
}

/// Result type alias for rotation operations
pub type RotationResult<T> = Result<T, RotationError>;
