//! Errors returned by the folio content core
//!
//! Network and validation failures are reported as [`FolioError`].
//! The optimistic [`ContentStore`](crate::store::ContentStore) converts them into
//! [`MutationResult`] values, so UI code only ever sees `{success, message}`.
//!
use std::path::PathBuf;

use serde::Serialize;
use snafu::prelude::*;

/// Errors returned by folio crate
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum FolioError {
    // Http connection or timeout error
    #[snafu(display("HTTP error {method} url:{url}"))]
    Http {
        method: String,
        url: String,
        source: reqwest::Error,
    },

    /// Content api responded with error.
    #[snafu(display("Api Server reported error ({code}) {method} {url}: {message}"))]
    ApiError {
        code: u16,
        method: String,
        url: String,
        message: String,
    },

    /// Encountered server error on "retryable" request, but all retry attempts failed.
    #[snafu(display("server api request: failed {n} times"))]
    TooManyRetries { n: u32 },

    /// Deserialization error. The server response did not match the expected shape.
    #[snafu(display("Deserialization: {source}"))]
    Deserialization { source: serde_json::Error },

    /// Serialization error. unlikely to occur. If you see this error, please report it as a bug.
    #[snafu(display("Serialization: {source}"))]
    Serialization { source: serde_json::Error },

    /// Expected item was not found, either locally or on the server.
    #[snafu(display("{obj_type} {key} not found"))]
    NotFound { obj_type: String, key: String },

    /// Request requires an admin token, or the token was rejected (http 401).
    /// Token refresh is handled outside this crate.
    #[snafu(display("Client is not authenticated"))]
    Unauthorized,

    /// Token was accepted but lacks permission (http 403)
    #[snafu(display("Permission denied"))]
    Forbidden,

    /// Too many requests. The http client waits and retries up to
    /// `rate_limit_max_retries` times before returning this error.
    #[snafu(display("Rate limit exceeded: \"{header}\" (parsed wait_time: {} secs)", duration.as_secs()))]
    RateLimitExceeded {
        header: String,
        duration: std::time::Duration,
    },

    /// Local validation failed. These errors are raised before any network request.
    #[snafu(display("Validation error: {message}"))]
    Validation { message: String },

    /// Persistent override store could not be read or written.
    #[snafu(display("override store {path:?}: {source}"))]
    OverrideFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Persistent override store contained invalid json.
    #[snafu(display("override store {path:?}: {source}"))]
    OverrideFormat {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// A failed optimistic mutation, taken out of its [`MutationResult`].
    #[snafu(display("{message}"))]
    MutationFailed { kind: ErrorKind, message: String },

    /// Some other error occurred
    #[snafu(display("{message}"))]
    Other { message: String },
}

/// Broad class of a [`FolioError`]. Survives conversion into a [`MutationResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Unauthorized,
    Forbidden,
    /// Network failure, server error, or rate limit
    Unavailable,
    /// Payload could not be encoded or decoded
    Data,
    /// Local override file
    Storage,
    Other,
}

impl FolioError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FolioError::Http { .. }
            | FolioError::ApiError { .. }
            | FolioError::TooManyRetries { .. }
            | FolioError::RateLimitExceeded { .. } => ErrorKind::Unavailable,
            FolioError::Deserialization { .. } | FolioError::Serialization { .. } => ErrorKind::Data,
            FolioError::NotFound { .. } => ErrorKind::NotFound,
            FolioError::Unauthorized => ErrorKind::Unauthorized,
            FolioError::Forbidden => ErrorKind::Forbidden,
            FolioError::Validation { .. } => ErrorKind::Validation,
            FolioError::OverrideFile { .. } | FolioError::OverrideFormat { .. } => ErrorKind::Storage,
            FolioError::MutationFailed { kind, .. } => *kind,
            FolioError::Other { .. } => ErrorKind::Other,
        }
    }
}

/// Structured outcome of an optimistic mutation.
///
/// `success == false` always means the local state was restored to the
/// snapshot taken before the mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Class of the error behind a failure
    #[serde(skip)]
    pub kind: Option<ErrorKind>,
}

impl<T> MutationResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            kind: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
            kind: Some(ErrorKind::Other),
        }
    }

    /// Converts into a `Result`. Failures become `FolioError::MutationFailed`
    /// with the kind of the original error.
    pub fn into_result(self) -> crate::Result<Option<T>> {
        if self.success {
            Ok(self.data)
        } else {
            Err(FolioError::MutationFailed {
                kind: self.kind.unwrap_or(ErrorKind::Other),
                message: self.message.unwrap_or_else(|| "mutation failed".to_string()),
            })
        }
    }
}

impl<T> From<FolioError> for MutationResult<T> {
    fn from(err: FolioError) -> Self {
        Self {
            kind: Some(err.kind()),
            ..Self::failed(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutation_result_from_error_keeps_message() {
        let result: MutationResult<()> = FolioError::Validation {
            message: "title is required".to_string(),
        }
        .into();
        assert!(!result.success);
        assert_eq!(
            result.message.as_deref(),
            Some("Validation error: title is required")
        );
        assert_eq!(result.kind, Some(ErrorKind::Validation));
        let err = result.into_result().expect_err("failed mutation");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.to_string(), "Validation error: title is required");
    }

    #[test]
    fn failed_mutation_keeps_its_kind() {
        let result: MutationResult<u32> = FolioError::Unauthorized.into();
        assert_eq!(result.kind, Some(ErrorKind::Unauthorized));
        assert_eq!(MutationResult::ok(3).into_result().expect("ok"), Some(3));
        assert!(matches!(
            result.into_result(),
            Err(FolioError::MutationFailed {
                kind: ErrorKind::Unauthorized,
                ..
            })
        ));
    }

    #[test]
    fn mutation_result_serializes_without_empty_fields() {
        let value = serde_json::to_value(MutationResult::ok(3)).expect("serialize");
        assert_eq!(value, serde_json::json!({"success": true, "data": 3}));
    }
}
