//! AWS error classification and handling
//!
//! Classifies SDK errors from their service error code (via
//! `ProvideErrorMetadata`) instead of string matching on Debug output.

use aws_sdk_s3::error::ProvideErrorMetadata;
use thiserror::Error;

/// AWS error categories for cleanup and get-or-create logic
#[derive(Debug, Error)]
pub enum AwsError {
    /// Resource or parameter was not found (a valid state, skipped in cleanup)
    #[error("Resource not found: {message}")]
    NotFound { code: String, message: String },

    /// Resource already exists (safe to ignore in create operations)
    #[error("Resource already exists: {message}")]
    AlreadyExists { message: String },

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    Throttled,

    /// Resource still referenced by another resource
    #[error("Resource is still in use: {message}")]
    InUse { message: String },

    /// Generic AWS SDK error with code and message
    #[error("AWS error: {message}")]
    Sdk {
        code: Option<String>,
        message: String,
    },
}

impl AwsError {
    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AwsError::NotFound { .. })
    }

    /// Check if this is an "already exists" error
    pub fn is_already_exists(&self) -> bool {
        matches!(self, AwsError::AlreadyExists { .. })
    }
}

/// Known AWS error codes for "not found" conditions
const NOT_FOUND_CODES: &[&str] = &[
    // AgentCore, Bedrock Agent, Cognito, Lambda
    "ResourceNotFoundException",
    // Cognito user pool domain lookups
    "UserPoolNotFoundException",
    // IAM
    "NoSuchEntity",
    // S3
    "NoSuchBucket",
    "NoSuchKey",
    "NotFound",
    // SSM
    "ParameterNotFound",
];

/// Known AWS error codes for "already exists" conditions
const ALREADY_EXISTS_CODES: &[&str] = &[
    "EntityAlreadyExists",
    "BucketAlreadyOwnedByYou",
    "ResourceConflictException",
    "ParameterAlreadyExists",
    // Cognito
    "GroupExistsException",
    "UsernameExistsException",
];

/// Known AWS error codes for throttling/rate limiting
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "TooManyRequestsException",
];

/// Known AWS error codes for resources still referenced elsewhere
const IN_USE_CODES: &[&str] = &["DeleteConflict", "BucketNotEmpty", "ConflictException"];

/// Classify an AWS SDK error using the error code.
pub fn classify_aws_error(code: Option<&str>, message: Option<&str>) -> AwsError {
    let message = message.unwrap_or("Unknown error").to_string();

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => AwsError::NotFound {
            code: c.to_string(),
            message,
        },
        Some(c) if ALREADY_EXISTS_CODES.contains(&c) => AwsError::AlreadyExists { message },
        Some(c) if THROTTLING_CODES.contains(&c) => AwsError::Throttled,
        Some(c) if IN_USE_CODES.contains(&c) => AwsError::InUse { message },
        _ => AwsError::Sdk {
            code: code.map(|s| s.to_string()),
            message,
        },
    }
}

/// Classify any SDK error.
///
/// `SdkError<E>` and every operation error implement `ProvideErrorMetadata`,
/// whichever service crate they come from.
pub fn classify_sdk_error<E: ProvideErrorMetadata>(error: &E) -> AwsError {
    classify_aws_error(error.code(), error.message())
}

/// Map a not-found SDK error to `Ok(None)`.
pub trait NotFoundExt<T, E> {
    fn not_found_as_none(self) -> Result<Option<T>, E>;
}

impl<T, E: ProvideErrorMetadata> NotFoundExt<T, E> for Result<T, E> {
    fn not_found_as_none(self) -> Result<Option<T>, E> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(e) if classify_sdk_error(&e).is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Treat a not-found error as success, for idempotent deletes.
pub fn ignore_not_found<T, E: ProvideErrorMetadata>(result: Result<T, E>) -> Result<(), E> {
    result.not_found_as_none().map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::error::ErrorMetadata;

    #[test]
    fn not_found_codes() {
        for code in NOT_FOUND_CODES {
            let err = classify_aws_error(Some(code), Some("some message"));
            assert!(err.is_not_found(), "Expected NotFound for code: {code}");
        }
    }

    #[test]
    fn already_exists_codes() {
        for code in ALREADY_EXISTS_CODES {
            let err = classify_aws_error(Some(code), Some("msg"));
            assert!(
                err.is_already_exists(),
                "Expected AlreadyExists for code: {code}"
            );
        }
    }

    #[test]
    fn throttling_and_in_use_codes() {
        for code in THROTTLING_CODES {
            assert!(matches!(
                classify_aws_error(Some(code), None),
                AwsError::Throttled
            ));
        }
        for code in IN_USE_CODES {
            assert!(matches!(
                classify_aws_error(Some(code), None),
                AwsError::InUse { .. }
            ));
        }
    }

    #[test]
    fn unknown_and_missing_codes() {
        let err = classify_aws_error(Some("SomeNewError"), Some("details"));
        assert!(matches!(err, AwsError::Sdk { .. }));

        let err2 = classify_aws_error(None, Some("something failed"));
        assert!(matches!(err2, AwsError::Sdk { code: None, .. }));
    }

    #[test]
    fn error_metadata_is_classified() {
        let meta = ErrorMetadata::builder()
            .code("ParameterNotFound")
            .message("Parameter /app/octank/agentcore/memory_id not found")
            .build();
        assert!(classify_sdk_error(&meta).is_not_found());
    }

    #[test]
    fn not_found_becomes_none() {
        let missing: Result<u8, ErrorMetadata> =
            Err(ErrorMetadata::builder().code("NoSuchEntity").build());
        assert_eq!(missing.not_found_as_none().ok(), Some(None));

        let denied: Result<u8, ErrorMetadata> =
            Err(ErrorMetadata::builder().code("AccessDenied").build());
        assert!(denied.not_found_as_none().is_err());

        let found: Result<u8, ErrorMetadata> = Ok(7);
        assert_eq!(found.not_found_as_none().ok(), Some(Some(7)));
    }

    #[test]
    fn ignore_not_found_only_swallows_not_found() {
        let gone: Result<(), ErrorMetadata> =
            Err(ErrorMetadata::builder().code("ResourceNotFoundException").build());
        assert!(ignore_not_found(gone).is_ok());

        let other: Result<(), ErrorMetadata> =
            Err(ErrorMetadata::builder().code("ValidationException").build());
        assert!(ignore_not_found(other).is_err());
    }
}
