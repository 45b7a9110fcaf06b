use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    config::Env,
    error::{ErrorKind, HttpError},
};

/// The catch-all: what a request no route answered turns into.
pub fn not_found(url: impl Into<String>) -> HttpError {
    HttpError::kind(ErrorKind::NotFound).with_context(serde_json::json!({ "url": url.into() }))
}

/// ErrorBody
///
/// The fixed error envelope. `error` (the raw error) is only present in
/// development-like environments.
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub code: &'a str,
    pub status: u16,
    pub context: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a HttpError>,
}

/// ErrorResponder
///
/// The terminal stage every request-time failure ends in. It logs according to the
/// environment and renders the envelope; it cannot fail.
///
/// - Development: status >= 500 logged at error, anything else at warn; the raw error
///   is echoed under `error`.
/// - Production: only status >= 500 is logged; the raw error never leaves the process.
#[derive(Debug, Clone, Copy)]
pub struct ErrorResponder {
    env: Env,
}

impl ErrorResponder {
    pub fn new(env: Env) -> Self {
        Self { env }
    }

    pub fn env(&self) -> Env {
        self.env
    }

    fn log(&self, err: &HttpError) {
        let context = Value::Object(err.context());
        if err.is_server_error() {
            tracing::error!(code = err.code(), status = err.status(), %context, "Error: {err}");
        } else if self.env == Env::Development {
            tracing::warn!(code = err.code(), status = err.status(), %context, "Error: {err}");
        }
    }

    /// The JSON body sent for `err`.
    pub fn body(&self, err: &HttpError) -> Value {
        self.envelope(err, response_status(err))
    }

    fn envelope(&self, err: &HttpError, status: StatusCode) -> Value {
        let body = ErrorBody {
            code: err.code(),
            status: status.as_u16(),
            context: err.context(),
            error: (self.env == Env::Development).then_some(err),
        };
        serde_json::to_value(body).unwrap_or_else(|_| Value::Object(Map::new()))
    }

    pub fn respond(&self, err: HttpError) -> Response {
        self.log(&err);
        let status = response_status(&err);
        (status, Json(self.envelope(&err, status))).into_response()
    }
}

/// The status actually sent for `err`: anything outside 100..=599 becomes 500.
fn response_status(err: &HttpError) -> StatusCode {
    StatusCode::from_u16(err.status())
        .ok()
        .filter(|status| status.as_u16() <= 599)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_production_never_leaks_the_error() {
        let responder = ErrorResponder::new(Env::Production);
        assert_eq!(
            responder.body(&HttpError::default()),
            json!({ "code": "unspecified-error", "status": 500, "context": {} })
        );
        assert_eq!(
            responder.body(&not_found("/404")),
            json!({ "code": "not-found", "status": 404, "context": { "url": "/404" } })
        );
    }

    #[test]
    fn test_development_includes_the_error() {
        let responder = ErrorResponder::new(Env::Development);
        assert_eq!(
            responder.body(&HttpError::default()),
            json!({ "code": "unspecified-error", "status": 500, "context": {}, "error": {} })
        );

        let body = responder.body(&not_found("/404"));
        assert_eq!(body["error"]["status"], 404);
        assert_eq!(body["error"]["context"]["url"], "/404");
    }

    #[test]
    fn test_custom_status_and_context() {
        let responder = ErrorResponder::new(Env::Production);
        let err = HttpError::message("bar-extendable-error")
            .with_status(505)
            .with_context(json!({ "test": true }));
        let response = responder.respond(err);
        assert_eq!(response.status().as_u16(), 505);

        let err = HttpError::kind(ErrorKind::SessionRequired);
        assert_eq!(responder.respond(err).status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_out_of_range_status_falls_back_to_500() {
        let responder = ErrorResponder::new(Env::Production);
        let err = HttpError::message("weird").with_status(42);
        assert_eq!(responder.body(&err)["status"], 500);
        let response = responder.respond(err);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = HttpError::message("weirder").with_status(700);
        assert_eq!(
            responder.body(&err),
            json!({ "code": "weirder", "status": 500, "context": {} })
        );
    }

    #[tokio::test]
    async fn test_sent_status_and_body_status_agree() {
        let responder = ErrorResponder::new(Env::Production);
        let response = responder.respond(HttpError::message("weird").with_status(42));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], 500);
    }
}
