use std::collections::HashMap;

use axum::{
    Json,
    body::{Body, to_bytes},
    extract::{Query, Request},
    http::{HeaderMap, Method, Uri, header},
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ErrorKind, HttpError};

/// The session attached to a request by an authentication guard.
pub type Session = Value;

/// RouteRequest
///
/// The per-request value threaded through a route's chain. Each stage receives it by
/// value and hands it back (possibly enriched) via [`Flow::Next`], so no stage ever
/// shares mutable state with another.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// The matched version segment, if the URL carried one.
    pub version: Option<String>,
    pub params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
    /// Decoded JSON body; an empty object when the request had none.
    pub body: Value,
    pub session: Option<Session>,
}

impl RouteRequest {
    /// Build a request value from an incoming HTTP request.
    ///
    /// Only JSON bodies are decoded; an absent or non-JSON body becomes `{}`.
    pub async fn from_http(request: Request, body_limit: usize) -> Result<Self, HttpError> {
        let (parts, body) = request.into_parts();

        let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .map(|Query(q)| q)
            .unwrap_or_default();

        let cookies = CookieJar::from_headers(&parts.headers)
            .iter()
            .map(|c| (c.name().to_string(), c.value().to_string()))
            .collect();

        let is_json = parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        let bytes = to_bytes(body, body_limit).await.map_err(|e| {
            HttpError::kind(ErrorKind::BodyParseError)
                .with_context(serde_json::json!({ "reason": e.to_string() }))
        })?;

        let body = if is_json && !bytes.is_empty() {
            serde_json::from_slice(&bytes).map_err(|e| {
                HttpError::kind(ErrorKind::BodyParseError)
                    .with_context(serde_json::json!({ "reason": e.to_string() }))
            })?
        } else {
            Value::Object(Map::new())
        };

        Ok(Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            version: None,
            params: HashMap::new(),
            query,
            cookies,
            body,
            session: None,
        })
    }

    /// A bare request, used by tests and by callers that build requests by hand.
    pub fn new(method: Method, uri: Uri) -> Self {
        let query = Query::<HashMap<String, String>>::try_from_uri(&uri)
            .map(|Query(q)| q)
            .unwrap_or_default();
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            version: None,
            params: HashMap::new(),
            query,
            cookies: HashMap::new(),
            body: Value::Object(Map::new()),
            session: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The full request target (path and query), as reported in `not-found` errors.
    pub fn url(&self) -> String {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| self.uri.path().to_string())
    }

    /// Headers as a JSON object of lower-cased names to string values. Repeated headers
    /// are joined with `", "`.
    pub fn headers_json(&self) -> Value {
        let mut map = Map::new();
        for name in self.headers.keys() {
            let joined = self
                .headers
                .get_all(name)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .collect::<Vec<_>>()
                .join(", ");
            map.insert(name.as_str().to_string(), Value::String(joined));
        }
        Value::Object(map)
    }
}

pub(crate) fn string_map_json(values: &HashMap<String, String>) -> Value {
    Value::Object(
        values
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

/// Flow
///
/// What a chain stage decided: hand the request to the next stage, or end the chain
/// with a response.
#[derive(Debug)]
pub enum Flow {
    Next(RouteRequest),
    Respond(Response),
}

impl Flow {
    pub fn json<T: Serialize>(value: T) -> Self {
        Flow::Respond(Json(value).into_response())
    }

    pub fn respond(response: impl IntoResponse) -> Self {
        Flow::Respond(response.into_response())
    }
}

impl From<Response<Body>> for Flow {
    fn from(response: Response<Body>) -> Self {
        Flow::Respond(response)
    }
}
