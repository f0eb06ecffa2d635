//! SDK error classification
//!
//! Every adapter funnels its `SdkError` through [`classify`], so the step
//! handlers only ever see a [`ServiceError`] with a [`ServiceErrorKind`].

use aws_sdk_secretsmanager::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use keyrot_core::{ServiceError, ServiceErrorKind};

/// Convert an SDK error into a port-level [`ServiceError`]
pub fn classify<E, R>(service: &'static str, operation: &'static str, err: SdkError<E, R>) -> ServiceError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let kind = match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => ServiceErrorKind::Unavailable,
        SdkError::ServiceError(_) | SdkError::ResponseError(_) => kind_for_code(err.code()),
        _ => ServiceErrorKind::Other,
    };
    let message = err
        .message()
        .map_or_else(|| DisplayErrorContext(&err).to_string(), str::to_string);

    tracing::debug!(service, operation, code = ?err.code(), %kind, "AWS call failed");
    ServiceError::new(service, operation, kind, message)
}

/// Map an AWS error code to a [`ServiceErrorKind`]
pub fn kind_for_code(code: Option<&str>) -> ServiceErrorKind {
    let Some(code) = code else {
        return ServiceErrorKind::Other;
    };

    match code {
        "ResourceNotFoundException" | "NoSuchEntity" | "NoSuchEntityException" | "TableNotFoundException" => {
            ServiceErrorKind::NotFound
        }
        "ResourceExistsException" | "EntityAlreadyExists" | "ResourceInUseException" => {
            ServiceErrorKind::AlreadyExists
        }
        "AccessDenied"
        | "AccessDeniedException"
        | "InvalidAccessKeyId"
        | "InvalidClientTokenId"
        | "SignatureDoesNotMatch"
        | "UnrecognizedClientException"
        | "ExpiredToken"
        | "ExpiredTokenException" => ServiceErrorKind::AccessDenied,
        "LimitExceeded" | "LimitExceededException" => ServiceErrorKind::LimitExceeded,
        "Throttling"
        | "ThrottlingException"
        | "TooManyRequestsException"
        | "RequestLimitExceeded"
        | "ProvisionedThroughputExceededException" => ServiceErrorKind::Throttled,
        "InvalidRequestException"
        | "InvalidParameterException"
        | "ValidationException"
        | "InvalidInput"
        | "ConditionalCheckFailedException"
        | "DecryptionFailure" => ServiceErrorKind::InvalidRequest,
        "InternalServiceError"
        | "InternalServiceErrorException"
        | "InternalFailure"
        | "InternalServerError"
        | "InternalError"
        | "ServiceFailure"
        | "ServiceUnavailable" => ServiceErrorKind::Unavailable,
        _ => ServiceErrorKind::Other,
    }
}
