//! Error types for sdcadm core
//!
//! Every failure carries:
//! - a stable machine-readable [`ErrorCode`]
//! - a human message
//! - an optional wrapped cause
//! - a process exit status
//!
//! Callers branch on [`UpgradeError::code`] without matching the concrete
//! variant.

use serde::Deserialize;
use std::error::Error as StdError;
use std::fmt;

/// Boxed foreign cause
pub type Cause = Box<dyn StdError + Send + Sync + 'static>;

/// Stable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Programming or environment fault
    Internal,
    /// Bad caller input
    Usage,
    /// Update workflow fault
    Update,
    /// Remote collaborator error
    SdcClient,
    /// Aggregate of several failures
    MultiError,
}

impl ErrorCode {
    /// Code as rendered to operators
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Internal => "Internal",
            ErrorCode::Usage => "Usage",
            ErrorCode::Update => "Update",
            ErrorCode::SdcClient => "SDCClient",
            ErrorCode::MultiError => "MultiError",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main sdcadm error type
#[derive(Debug, thiserror::Error)]
pub enum UpgradeError {
    /// Programming/environment fault
    #[error("{message}")]
    Internal {
        message: String,
        #[source]
        cause: Option<Cause>,
    },

    /// Caller input fault
    #[error("{message}")]
    Usage {
        message: String,
        #[source]
        cause: Option<Cause>,
    },

    /// Precondition, timeout or remote-task failure during an update
    #[error("{message}")]
    Update {
        message: String,
        #[source]
        cause: Option<Cause>,
    },

    /// Error returned by a remote collaborator API
    #[error("{message}")]
    SdcClient {
        /// Collaborator name, e.g. `cnapi`
        client: String,
        message: String,
        #[source]
        cause: ClientError,
    },

    /// Non-empty aggregate of failures
    #[error("{0}")]
    Multi(MultiError),
}

impl UpgradeError {
    /// Create internal error
    #[inline]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            cause: None,
        }
    }

    /// Create usage error
    #[inline]
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            cause: None,
        }
    }

    /// Create update error
    #[inline]
    pub fn update(message: impl Into<String>) -> Self {
        Self::Update {
            message: message.into(),
            cause: None,
        }
    }

    /// Wrap a collaborator failure.
    ///
    /// `ClientError` always exposes a string message: bodies without one
    /// are rejected while decoding, so this cannot be handed a cause it
    /// is unable to describe.
    pub fn sdc_client(client: impl Into<String>, cause: ClientError) -> Self {
        let client = client.into();
        let message = format!("{client} client error: {}", cause.describe());
        Self::SdcClient {
            client,
            message,
            cause,
        }
    }

    /// Aggregate failures; `None` when there is nothing to report
    #[must_use]
    pub fn multi(errors: Vec<UpgradeError>) -> Option<Self> {
        MultiError::new(errors).map(Self::Multi)
    }

    /// Attach a cause to an internal, usage or update error.
    ///
    /// Collaborator and aggregate errors already own their cause and are
    /// returned unchanged.
    #[must_use]
    pub fn with_cause(self, source: impl Into<Cause>) -> Self {
        match self {
            Self::Internal { message, .. } => Self::Internal {
                message,
                cause: Some(source.into()),
            },
            Self::Usage { message, .. } => Self::Usage {
                message,
                cause: Some(source.into()),
            },
            Self::Update { message, .. } => Self::Update {
                message,
                cause: Some(source.into()),
            },
            other => other,
        }
    }

    /// Stable error code
    #[inline]
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Internal { .. } => ErrorCode::Internal,
            Self::Usage { .. } => ErrorCode::Usage,
            Self::Update { .. } => ErrorCode::Update,
            Self::SdcClient { .. } => ErrorCode::SdcClient,
            Self::Multi(_) => ErrorCode::MultiError,
        }
    }

    /// Human message
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Wrapped cause, if any. For aggregates this is the first child.
    #[must_use]
    pub fn cause(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Internal { cause, .. }
            | Self::Usage { cause, .. }
            | Self::Update { cause, .. } => {
                cause.as_deref().map(|c| c as &(dyn StdError + 'static))
            }
            Self::SdcClient { cause, .. } => Some(cause),
            Self::Multi(multi) => Some(multi.first()),
        }
    }

    /// Exit status used at the process boundary
    #[inline]
    #[must_use]
    pub fn exit_status(&self) -> i32 {
        match self {
            Self::Usage { .. } | Self::Update { .. } => 2,
            Self::Internal { .. } | Self::SdcClient { .. } | Self::Multi(_) => 1,
        }
    }

    /// Children of an aggregate, or just `self`
    #[must_use]
    pub fn flatten(&self) -> Vec<&UpgradeError> {
        match self {
            Self::Multi(multi) => multi.errors().iter().collect(),
            other => vec![other],
        }
    }
}

impl From<std::io::Error> for UpgradeError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(format!("i/o error: {err}")).with_cause(err)
    }
}

/// Ordered, non-empty list of failures
#[derive(Debug)]
pub struct MultiError {
    errors: Vec<UpgradeError>,
}

impl MultiError {
    /// Create aggregate; `None` for an empty list
    #[must_use]
    pub fn new(errors: Vec<UpgradeError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self { errors })
        }
    }

    /// Children in the order they were recorded
    #[inline]
    #[must_use]
    pub fn errors(&self) -> &[UpgradeError] {
        &self.errors
    }

    /// Number of children
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Always false; kept for clippy's `len_without_is_empty`
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// First child
    #[must_use]
    pub fn first(&self) -> &UpgradeError {
        &self.errors[0]
    }

    /// Consume into children
    #[must_use]
    pub fn into_errors(self) -> Vec<UpgradeError> {
        self.errors
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "multiple ({}) errors", self.errors.len())?;
        for err in &self.errors {
            write!(f, "\n    {}: {}", err.code(), err)?;
        }
        Ok(())
    }
}

/// Field-level error reported by a collaborator
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldError {
    /// Offending field
    pub field: String,
    /// Error code, e.g. `Missing`
    #[serde(default)]
    pub code: Option<String>,
    /// Field message
    #[serde(default)]
    pub message: Option<String>,
}

/// Structured error body returned by a collaborator API
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiErrorBody {
    /// Remote error code, e.g. `ResourceNotFound`
    #[serde(default)]
    pub code: Option<String>,
    /// Remote error message
    pub message: String,
    /// Field errors
    #[serde(default)]
    pub errors: Vec<FieldError>,
}

/// Collaborator call failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Remote API returned a structured error
    #[error("{}", .body.message)]
    Api {
        /// HTTP status
        status: u16,
        /// Decoded error body
        body: ApiErrorBody,
    },

    /// Request never produced a response
    #[error("{0}")]
    Transport(String),

    /// Response could not be decoded
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// Create an API error
    pub fn api(status: u16, code: Option<&str>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            body: ApiErrorBody {
                code: code.map(str::to_string),
                message: message.into(),
                errors: Vec::new(),
            },
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Api { status, body } => {
                let mut out = format!(
                    "{} ({})",
                    body.message,
                    body.code.as_deref().map_or_else(|| status.to_string(), str::to_string)
                );
                for field in &body.errors {
                    out.push_str(&format!(
                        "; {}: {}",
                        field.field,
                        field
                            .message
                            .as_deref()
                            .or(field.code.as_deref())
                            .unwrap_or("invalid")
                    ));
                }
                out
            }
            Self::Transport(message) => format!("{message} (Transport)"),
            Self::InvalidResponse(message) => {
                format!("invalid response: {message} (InvalidResponse)")
            }
        }
    }
}

/// Result alias for core operations
pub type Result<T> = std::result::Result<T, UpgradeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_exit_status() {
        let cases = [
            (UpgradeError::internal("x"), "Internal", 1),
            (UpgradeError::usage("x"), "Usage", 2),
            (UpgradeError::update("x"), "Update", 2),
            (
                UpgradeError::sdc_client("cnapi", ClientError::Transport("reset".into())),
                "SDCClient",
                1,
            ),
        ];
        for (err, code, status) in cases {
            assert_eq!(err.code().as_str(), code);
            assert_eq!(err.exit_status(), status);
        }
    }

    #[test]
    fn sdc_client_message_embeds_remote_detail() {
        let cause = ClientError::Api {
            status: 409,
            body: ApiErrorBody {
                code: Some("InvalidParameters".to_string()),
                message: "bad image".to_string(),
                errors: vec![FieldError {
                    field: "image_uuid".to_string(),
                    code: Some("Invalid".to_string()),
                    message: Some("not an agent image".to_string()),
                }],
            },
        };
        let err = UpgradeError::sdc_client("cnapi", cause);

        assert_eq!(
            err.message(),
            "cnapi client error: bad image (InvalidParameters); image_uuid: not an agent image"
        );
        assert!(err.cause().is_some());
    }

    #[test]
    fn sdc_client_falls_back_to_status() {
        let err = UpgradeError::sdc_client("cnapi", ClientError::api(503, None, "unavailable"));
        assert_eq!(err.message(), "cnapi client error: unavailable (503)");
    }

    #[test]
    fn api_body_requires_message() {
        let missing: std::result::Result<ApiErrorBody, _> =
            serde_json::from_str(r#"{"code":"Oops"}"#);
        assert!(missing.is_err());

        let raw = r#"{"code":"ResourceNotFound","message":"no such task"}"#;
        let body: ApiErrorBody = serde_json::from_str(raw).unwrap();
        assert_eq!(body.message, "no such task");
        assert!(body.errors.is_empty());
    }

    #[test]
    fn multi_rejects_empty() {
        assert!(UpgradeError::multi(Vec::new()).is_none());
    }

    #[test]
    fn multi_lists_every_child() {
        let err = UpgradeError::multi(vec![
            UpgradeError::update("server a timed out"),
            UpgradeError::sdc_client("cnapi", ClientError::api(500, Some("InternalError"), "boom")),
        ])
        .unwrap();

        assert_eq!(err.code(), ErrorCode::MultiError);
        assert_eq!(err.exit_status(), 1);
        let rendered = err.to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "multiple (2) errors");
        assert_eq!(lines[1], "    Update: server a timed out");
        assert_eq!(lines[2], "    SDCClient: cnapi client error: boom (InternalError)");

        let first = err.cause().unwrap().to_string();
        assert_eq!(first, "server a timed out");
        assert_eq!(err.flatten().len(), 2);
    }

    #[test]
    fn with_cause_keeps_message() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = UpgradeError::usage("bad config").with_cause(io);
        assert_eq!(err.message(), "bad config");
        assert_eq!(err.cause().unwrap().to_string(), "gone");
        assert!(std::error::Error::source(&err).is_some());
    }
}
