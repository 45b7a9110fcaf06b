use serde::Serialize;
use serde_json::{Map, Value};

/// The code reported when an error carries no message of its own.
pub const UNSPECIFIED_ERROR: &str = "unspecified-error";

/// ErrorKind
///
/// The catalogue of errors raised by the service itself (as opposed to errors a
/// route handler invents). Each kind maps to a stable wire code and an HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No route matched the request.
    NotFound,
    /// An explicitly versioned route was called with a version it does not declare.
    VersionNotSupported,
    /// The request failed its declared validation schemas.
    ValidationError,
    /// The request body could not be decoded.
    BodyParseError,
    // Session / credential failures reported by the authentication collaborators.
    CredentialsRequired,
    CredentialsBadSchema,
    InvalidToken,
    SessionRequired,
    SessionHeaderIsInvalid,
    SessionHeaderHasNoUserId,
    SessionIsEmpty,
    SessionHasNoUserId,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not-found",
            ErrorKind::VersionNotSupported => "version-not-supported",
            ErrorKind::ValidationError => "validation-error",
            ErrorKind::BodyParseError => "body-parse-error",
            ErrorKind::CredentialsRequired => "credentials-required",
            ErrorKind::CredentialsBadSchema => "credentials-bad-schema",
            ErrorKind::InvalidToken => "invalid-token",
            ErrorKind::SessionRequired => "session-required",
            ErrorKind::SessionHeaderIsInvalid => "session-header-is-invalid",
            ErrorKind::SessionHeaderHasNoUserId => "session-header-has-no-userId",
            ErrorKind::SessionIsEmpty => "session-is-empty",
            ErrorKind::SessionHasNoUserId => "session-has-no-userId",
        }
    }

    /// The default status for this kind. Session kinds raised while issuing a token
    /// (`session-is-empty`, `session-has-no-userId`) override it to 400 at the call site.
    pub fn status(self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::VersionNotSupported
            | ErrorKind::ValidationError
            | ErrorKind::BodyParseError
            | ErrorKind::SessionIsEmpty => 400,
            ErrorKind::CredentialsRequired
            | ErrorKind::CredentialsBadSchema
            | ErrorKind::InvalidToken
            | ErrorKind::SessionRequired
            | ErrorKind::SessionHeaderIsInvalid
            | ErrorKind::SessionHeaderHasNoUserId
            | ErrorKind::SessionHasNoUserId => 401,
        }
    }
}

/// HttpError
///
/// The single error type flowing through a route's chain into the error pipeline.
///
/// Every field is optional so that an error raised without a message, a status or a
/// context is faithfully represented as such; the accessors apply the defaults
/// (`unspecified-error`, 500, `{}`). When the development environment echoes the raw
/// error back to the client, it is this struct that gets serialized, absent fields
/// omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, thiserror::Error)]
#[error("{}", self.code())]
pub struct HttpError {
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<Map<String, Value>>,
}

impl HttpError {
    /// Build an error with an explicit code, status and context. This is the one
    /// construction helper the rest of the crate goes through.
    pub fn new(code: impl Into<String>, status: u16, context: Map<String, Value>) -> Self {
        Self {
            message: Some(code.into()),
            status: Some(status),
            context: Some(context),
        }
    }

    /// An application error carrying only a message; status and context fall back
    /// to their defaults when rendered.
    pub fn message(code: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            message: (!code.is_empty()).then_some(code),
            ..Self::default()
        }
    }

    pub fn kind(kind: ErrorKind) -> Self {
        Self::new(kind.code(), kind.status(), Map::new())
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach a context object. Non-object values are stored under a `value` key.
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(match context {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        });
        self
    }

    pub fn code(&self) -> &str {
        self.message.as_deref().unwrap_or(UNSPECIFIED_ERROR)
    }

    pub fn status(&self) -> u16 {
        self.status.unwrap_or(500)
    }

    pub fn context(&self) -> Map<String, Value> {
        self.context.clone().unwrap_or_default()
    }

    pub fn is_server_error(&self) -> bool {
        self.status() >= 500
    }
}

impl From<ErrorKind> for HttpError {
    fn from(kind: ErrorKind) -> Self {
        HttpError::kind(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_apply_when_fields_are_absent() {
        let err = HttpError::default();
        assert_eq!(err.code(), "unspecified-error");
        assert_eq!(err.status(), 500);
        assert!(err.context().is_empty());
        assert_eq!(serde_json::to_value(&err).unwrap(), json!({}));
    }

    #[test]
    fn test_empty_message_is_unspecified() {
        assert_eq!(HttpError::message("").code(), "unspecified-error");
        assert_eq!(HttpError::message("bar-error").to_string(), "bar-error");
    }

    #[test]
    fn test_kind_carries_code_and_status() {
        let err = HttpError::kind(ErrorKind::VersionNotSupported)
            .with_context(json!({ "version": ["v1", "v2"] }));
        assert_eq!(err.code(), "version-not-supported");
        assert_eq!(err.status(), 400);
        assert_eq!(err.context()["version"], json!(["v1", "v2"]));
        assert!(!err.is_server_error());
    }
}
