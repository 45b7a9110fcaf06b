//! Request-shape validation.
//!
//! Routes declare JSON Schemas per request location; at registration time these are
//! compiled into a [`RequestValidator`], which the chain runs as a guard before the
//! route's handlers.

use jsonschema::Validator;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    error::{ErrorKind, HttpError},
    request::{RouteRequest, string_map_json},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Headers,
    Cookies,
    Params,
    Query,
    Body,
}

impl Location {
    pub fn as_str(self) -> &'static str {
        match self {
            Location::Headers => "headers",
            Location::Cookies => "cookies",
            Location::Params => "params",
            Location::Query => "query",
            Location::Body => "body",
        }
    }

    fn instance(self, request: &RouteRequest) -> Value {
        match self {
            Location::Headers => request.headers_json(),
            Location::Cookies => string_map_json(&request.cookies),
            Location::Params => string_map_json(&request.params),
            Location::Query => string_map_json(&request.query),
            Location::Body => request.body.clone(),
        }
    }
}

/// ValidationOptions
///
/// Per-location tolerance for keys the schema does not describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationOptions {
    pub allow_unknown_headers: bool,
    pub allow_unknown_cookies: bool,
    pub allow_unknown_params: bool,
    pub allow_unknown_query: bool,
    pub allow_unknown_body: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            allow_unknown_headers: true,
            allow_unknown_cookies: true,
            allow_unknown_params: true,
            allow_unknown_query: false,
            allow_unknown_body: false,
        }
    }
}

impl ValidationOptions {
    fn allows_unknown(&self, location: Location) -> bool {
        match location {
            Location::Headers => self.allow_unknown_headers,
            Location::Cookies => self.allow_unknown_cookies,
            Location::Params => self.allow_unknown_params,
            Location::Query => self.allow_unknown_query,
            Location::Body => self.allow_unknown_body,
        }
    }
}

/// ValidationSchemas
///
/// The `validate` block of a route descriptor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationSchemas {
    pub headers: Option<Value>,
    pub cookies: Option<Value>,
    pub params: Option<Value>,
    pub query: Option<Value>,
    pub body: Option<Value>,
    pub options: ValidationOptions,
}

impl ValidationSchemas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn headers(mut self, schema: Value) -> Self {
        self.headers = Some(schema);
        self
    }

    pub fn cookies(mut self, schema: Value) -> Self {
        self.cookies = Some(schema);
        self
    }

    pub fn params(mut self, schema: Value) -> Self {
        self.params = Some(schema);
        self
    }

    pub fn query(mut self, schema: Value) -> Self {
        self.query = Some(schema);
        self
    }

    pub fn body(mut self, schema: Value) -> Self {
        self.body = Some(schema);
        self
    }

    pub fn options(mut self, options: ValidationOptions) -> Self {
        self.options = options;
        self
    }

    /// Declared schemas in a fixed location order.
    pub fn declared(&self) -> impl Iterator<Item = (Location, &Value)> {
        [
            (Location::Headers, self.headers.as_ref()),
            (Location::Cookies, self.cookies.as_ref()),
            (Location::Params, self.params.as_ref()),
            (Location::Query, self.query.as_ref()),
            (Location::Body, self.body.as_ref()),
        ]
        .into_iter()
        .filter_map(|(location, schema)| schema.map(|s| (location, s)))
    }

    /// The documentation view published on `/routes`: declared schemas only, as written.
    pub fn summary(&self) -> ValidationSummary {
        ValidationSummary {
            headers: self.headers.clone(),
            cookies: self.cookies.clone(),
            params: self.params.clone(),
            query: self.query.clone(),
            body: self.body.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid `validate.{}` schema: {reason}", location.as_str())]
pub struct SchemaError {
    pub location: Location,
    pub reason: String,
}

/// Close an object schema to unknown keys unless it already says otherwise.
fn close_object_schema(schema: &Value) -> Value {
    let mut schema = schema.clone();
    if let Value::Object(map) = &mut schema {
        let describes_object =
            map.get("type") == Some(&json!("object")) || map.contains_key("properties");
        if describes_object && !map.contains_key("additionalProperties") {
            map.insert("additionalProperties".to_string(), Value::Bool(false));
        }
    }
    schema
}

/// RequestValidator
///
/// Compiled form of [`ValidationSchemas`].
pub struct RequestValidator {
    checks: Vec<(Location, Validator)>,
}

impl std::fmt::Debug for RequestValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let locations: Vec<_> = self.checks.iter().map(|(l, _)| l.as_str()).collect();
        f.debug_struct("RequestValidator")
            .field("locations", &locations)
            .finish()
    }
}

impl RequestValidator {
    pub fn compile(schemas: &ValidationSchemas) -> Result<Self, SchemaError> {
        let checks = schemas
            .declared()
            .map(|(location, schema)| {
                let schema = if schemas.options.allows_unknown(location) {
                    schema.clone()
                } else {
                    close_object_schema(schema)
                };
                jsonschema::validator_for(&schema)
                    .map(|validator| (location, validator))
                    .map_err(|e| SchemaError {
                        location,
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { checks })
    }

    /// Check every declared location, collecting all violations before failing.
    pub fn check(&self, request: &RouteRequest) -> Result<(), HttpError> {
        let mut errors = Vec::new();
        for (location, validator) in &self.checks {
            let instance = location.instance(request);
            for error in validator.iter_errors(&instance) {
                errors.push(json!({
                    "location": location.as_str(),
                    "field": error.instance_path.to_string(),
                    "message": error.to_string(),
                }));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(HttpError::kind(ErrorKind::ValidationError).with_context(json!({ "errors": errors })))
        }
    }
}
