use std::{fmt, future::Future, str::FromStr, sync::Arc};

use axum::http::Method;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    auth::{AuthMode, AuthOptions},
    error::HttpError,
    request::{Flow, RouteRequest},
    validation::{ValidationSchemas, ValidationSummary},
};

// --- Methods ---

/// RouteMethod
///
/// The verbs a route descriptor may declare. `All` matches every request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteMethod {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Patch,
    All,
}

impl RouteMethod {
    pub const NAMES: [&'static str; 7] = ["get", "post", "put", "delete", "head", "patch", "all"];

    pub fn as_str(self) -> &'static str {
        match self {
            RouteMethod::Get => "get",
            RouteMethod::Post => "post",
            RouteMethod::Put => "put",
            RouteMethod::Delete => "delete",
            RouteMethod::Head => "head",
            RouteMethod::Patch => "patch",
            RouteMethod::All => "all",
        }
    }

    /// Whether a request with `method` is served by a route declared with `self`.
    /// `get` routes also answer `HEAD`.
    pub fn matches(self, method: &Method) -> bool {
        match self {
            RouteMethod::All => true,
            RouteMethod::Get => method == Method::GET || method == Method::HEAD,
            RouteMethod::Post => method == Method::POST,
            RouteMethod::Put => method == Method::PUT,
            RouteMethod::Delete => method == Method::DELETE,
            RouteMethod::Head => method == Method::HEAD,
            RouteMethod::Patch => method == Method::PATCH,
        }
    }
}

impl FromStr for RouteMethod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(RouteMethod::Get),
            "post" => Ok(RouteMethod::Post),
            "put" => Ok(RouteMethod::Put),
            "delete" => Ok(RouteMethod::Delete),
            "head" => Ok(RouteMethod::Head),
            "patch" => Ok(RouteMethod::Patch),
            "all" => Ok(RouteMethod::All),
            _ => Err(()),
        }
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Handlers ---

pub type HandlerFuture = BoxFuture<'static, Result<Flow, HttpError>>;
type HandlerFn = dyn Fn(RouteRequest) -> HandlerFuture + Send + Sync;

/// Handler
///
/// One request-handling step of a route. Handlers run in declaration order; each one
/// either answers (`Flow::Respond`) or passes the request on (`Flow::Next`).
#[derive(Clone)]
pub struct Handler {
    name: Option<String>,
    func: Arc<HandlerFn>,
}

/// The display name of a `fn` item, or `None` for closures.
fn fn_name<F>() -> Option<String> {
    let full = std::any::type_name::<F>();
    if full.contains("{{closure}}") || full.contains('<') {
        return None;
    }
    full.rsplit("::").next().map(str::to_string)
}

impl Handler {
    /// Wrap an async function. Named `fn` items keep their name for the route listing.
    pub fn new<F, Fut>(func: F) -> Self
    where
        F: Fn(RouteRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Flow, HttpError>> + Send + 'static,
    {
        let name = fn_name::<F>();
        Self {
            name,
            func: Arc::new(move |req| -> HandlerFuture { Box::pin(func(req)) }),
        }
    }

    pub fn named<F, Fut>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(RouteRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Flow, HttpError>> + Send + 'static,
    {
        Self {
            name: Some(name.into()),
            ..Self::new(func)
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn call(&self, request: RouteRequest) -> HandlerFuture {
        (self.func)(request)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").field("name", &self.name).finish()
    }
}

// --- Descriptors ---

/// Documentation
///
/// Free-form documentation published alongside a route on `/routes`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Documentation {
    pub description: Option<String>,
    pub response: Option<Value>,
    /// Access-control hints for consumers of the listing. Not enforced here.
    pub can: Option<Value>,
    pub is: Option<Value>,
}

/// RouteDescriptor
///
/// A route as authored by a module. Every field is optional so that incomplete
/// declarations can be represented and rejected by the descriptor validator at
/// registration time rather than failing to be built at all.
#[derive(Debug, Clone, Default)]
pub struct RouteDescriptor {
    pub path: Option<String>,
    /// Raw method names, normalized and checked during validation.
    pub methods: Vec<String>,
    /// `None` or `["*"]` means any version.
    pub versions: Option<Vec<String>>,
    pub handlers: Vec<Handler>,
    pub auth: Option<AuthOptions>,
    pub validate: Option<ValidationSchemas>,
    pub documentation: Documentation,
    pub name: Option<String>,
}

impl RouteDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for the common single method, single handler declaration.
    pub fn route(method: &str, path: &str, handler: Handler) -> Self {
        Self::new().method(method).path(path).handler(handler)
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.methods.push(method.into());
        self
    }

    pub fn methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods.extend(methods.into_iter().map(Into::into));
        self
    }

    pub fn version(self, version: impl Into<String>) -> Self {
        self.versions([version])
    }

    pub fn versions<I, S>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.versions
            .get_or_insert_with(Vec::new)
            .extend(versions.into_iter().map(Into::into));
        self
    }

    pub fn handler(mut self, handler: Handler) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn handlers(mut self, handlers: impl IntoIterator<Item = Handler>) -> Self {
        self.handlers.extend(handlers);
        self
    }

    pub fn auth(mut self, options: AuthOptions) -> Self {
        self.auth = Some(options);
        self
    }

    pub fn validate(mut self, schemas: ValidationSchemas) -> Self {
        self.validate = Some(schemas);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.documentation.description = Some(description.into());
        self
    }

    pub fn response(mut self, response: Value) -> Self {
        self.documentation.response = Some(response);
        self
    }

    /// ACL hint: the permission a caller needs, as published on `/routes`.
    pub fn can(mut self, can: Value) -> Self {
        self.documentation.can = Some(can);
        self
    }

    /// ACL hint: the role a caller must have, as published on `/routes`.
    pub fn is(mut self, is: Value) -> Self {
        self.documentation.is = Some(is);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// ModuleRoutes
///
/// What the module loader hands over for one module: its display name and its route
/// descriptors in declaration order.
#[derive(Debug, Clone)]
pub struct ModuleRoutes {
    pub name: String,
    pub routes: Vec<RouteDescriptor>,
}

impl ModuleRoutes {
    pub fn new(name: impl Into<String>, routes: Vec<RouteDescriptor>) -> Self {
        Self {
            name: name.into(),
            routes,
        }
    }
}

// --- Registry entries ---

/// AuthSummary
///
/// How a route's auth slot appears on `/routes`: `false`, or `{"type": ...}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuthSummary {
    Disabled(bool),
    Enabled {
        #[serde(rename = "type")]
        mode: AuthMode,
    },
}

impl From<Option<&AuthOptions>> for AuthSummary {
    fn from(options: Option<&AuthOptions>) -> Self {
        match options {
            Some(options) => AuthSummary::Enabled { mode: options.mode },
            None => AuthSummary::Disabled(false),
        }
    }
}

/// RegisteredRoute
///
/// One `(route, version, method)` combination accepted at startup, as listed on
/// `GET /routes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredRoute {
    pub module: String,
    pub name: String,
    pub description: String,
    /// A literal version, or `*` for routes that accept any version.
    pub version: String,
    pub method: RouteMethod,
    /// The path a client calls, including the version prefix for explicit versions.
    pub path: String,
    pub auth: AuthSummary,
    /// ACL hints; `false` when the route declares none.
    pub can: Value,
    pub is: Value,
    pub validate: ValidationSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}
