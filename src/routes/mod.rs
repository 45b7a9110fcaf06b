//! Route registration.
//!
//! # Data Flow
//! ```text
//! ModuleSource::list_modules()
//!     → per module, per descriptor (in order):
//!         descriptor.rs  validate (invalid → logged, skipped)
//!         pattern.rs     build the versioned pattern
//!         chain.rs       compose version gate / auth / validate / handlers
//!         registry.rs    expand versions × methods into listing entries
//!     → Catalog { table, registry }, frozen before the listener starts
//! ```

pub mod chain;
pub mod descriptor;
pub mod pattern;
pub mod registry;
pub mod table;

use std::sync::Arc;

use crate::{auth::SessionState, models::ModuleRoutes};

use self::{
    chain::Chain,
    descriptor::{AcceptedRoute, validate_descriptor},
    pattern::PathPattern,
    registry::{RouteRegistry, registered_routes},
    table::{RouteEntry, RouteTable},
};

/// ModuleSource
///
/// The module loader contract: every module's name and route descriptors, in the
/// order they should be registered.
pub trait ModuleSource {
    fn list_modules(&self) -> Vec<ModuleRoutes>;
}

impl ModuleSource for Vec<ModuleRoutes> {
    fn list_modules(&self) -> Vec<ModuleRoutes> {
        self.clone()
    }
}

/// Catalog
///
/// The outcome of registration: the dispatch table and the published listing. Both
/// are read-only once built.
#[derive(Clone)]
pub struct Catalog {
    pub table: Arc<RouteTable>,
    pub registry: Arc<RouteRegistry>,
}

/// Registrar
///
/// Accumulates modules during startup. Each descriptor is fully compiled before
/// anything about it is recorded, so a route is either in both the table and the
/// registry or in neither.
pub struct Registrar {
    sessions: SessionState,
    table: RouteTable,
    registry: RouteRegistry,
}

impl Registrar {
    pub fn new(sessions: SessionState) -> Self {
        Self {
            sessions,
            table: RouteTable::new(),
            registry: RouteRegistry::new(),
        }
    }

    /// Register one module's routes, returning how many descriptors were accepted.
    pub fn add_module(&mut self, module: ModuleRoutes) -> usize {
        tracing::info!("Adding {} routes", module.name);
        let mut accepted = 0;
        for (index, descriptor) in module.routes.into_iter().enumerate() {
            let route = match validate_descriptor(&module.name, index, descriptor) {
                Ok(route) => route,
                Err(err) => {
                    tracing::error!("{err}");
                    continue;
                }
            };
            match self.compile(&route) {
                Ok(entries) => {
                    self.table.extend(entries);
                    self.registry.extend(registered_routes(&module.name, &route));
                    accepted += 1;
                }
                Err(err) => {
                    tracing::error!("Module [{}]: Route {}: {err}", module.name, route.path);
                }
            }
        }
        accepted
    }

    fn compile(&self, route: &AcceptedRoute) -> Result<Vec<RouteEntry>, pattern::PatternError> {
        let pattern = PathPattern::build(&route.versions, &route.path)?;
        let chain = Arc::new(Chain::compose(route, &self.sessions));
        tracing::debug!(
            pattern = pattern.as_str(),
            methods = ?route.methods,
            stages = chain.stages().len(),
            "Route attached"
        );
        Ok(route
            .methods
            .iter()
            .map(|method| RouteEntry {
                method: *method,
                pattern: pattern.clone(),
                versions: route.versions.clone(),
                chain: Arc::clone(&chain),
            })
            .collect())
    }

    pub fn finish(self) -> Catalog {
        Catalog {
            table: Arc::new(self.table),
            registry: Arc::new(self.registry),
        }
    }
}

/// register_modules
///
/// The startup routine: register every module the source lists, in order.
pub fn register_modules(source: &impl ModuleSource, sessions: SessionState) -> Catalog {
    let mut registrar = Registrar::new(sessions);
    for module in source.list_modules() {
        registrar.add_module(module);
    }
    registrar.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::ProxySessions,
        error::HttpError,
        models::{Handler, RouteDescriptor},
        request::{Flow, RouteRequest},
    };
    use axum::{
        body::to_bytes,
        http::{Method, StatusCode, Uri},
    };
    use serde_json::{Value, json};

    fn echo(label: &'static str) -> Handler {
        Handler::new(move |req: RouteRequest| async move {
            Ok::<_, HttpError>(Flow::json(json!({
                "label": label,
                "version": req.version,
                "params": req.params,
            })))
        })
    }

    fn catalog(modules: Vec<ModuleRoutes>) -> Catalog {
        register_modules(&modules, Arc::new(ProxySessions))
    }

    async fn call(catalog: &Catalog, method: Method, uri: &str) -> Result<Value, HttpError> {
        let uri: Uri = uri.parse().unwrap();
        let response = catalog
            .table
            .dispatch(RouteRequest::new(method, uri))
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        Ok(serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_bad_descriptors_do_not_block_siblings() {
        let catalog = catalog(vec![ModuleRoutes::new(
            "foo",
            vec![
                RouteDescriptor::route("post", "/foo", echo("foo")),
                RouteDescriptor::new().method("post"),
                RouteDescriptor::new().path("/foo"),
                RouteDescriptor::new().path("/foo").method("bad"),
                RouteDescriptor::new().path("/foo").method("put"),
                RouteDescriptor::route("get", "/fou", echo("fou")).version("v1"),
            ],
        )]);
        assert_eq!(catalog.registry.len(), 2);
        assert_eq!(catalog.table.len(), 2);
    }

    #[test]
    fn test_uncompilable_pattern_is_skipped_entirely() {
        let catalog = catalog(vec![ModuleRoutes::new(
            "foo",
            vec![RouteDescriptor::route("get", "/x/:version", echo("x"))],
        )]);
        assert!(catalog.registry.is_empty());
        assert!(catalog.table.is_empty());
    }

    #[test]
    fn test_registration_is_deterministic() {
        let modules = vec![
            ModuleRoutes::new(
                "bar",
                vec![RouteDescriptor::route("post", "/bar", echo("bar")).versions(["v1", "v2"])],
            ),
            ModuleRoutes::new("foo", vec![RouteDescriptor::route("get", "/foo", echo("foo"))]),
        ];
        let first = register_modules(&modules, Arc::new(ProxySessions));
        let second = register_modules(&modules, Arc::new(ProxySessions));
        assert_eq!(first.registry, second.registry);
        assert_eq!(first.registry.len(), 3);
    }

    #[tokio::test]
    async fn test_dispatch_versions() {
        let catalog = catalog(vec![ModuleRoutes::new(
            "foo",
            vec![
                RouteDescriptor::route("post", "/foo", echo("any")),
                RouteDescriptor::route("post", "/bar", echo("bar")).versions(["v1", "v2"]),
            ],
        )]);

        let body = call(&catalog, Method::POST, "/foo").await.unwrap();
        assert_eq!(body["version"], Value::Null);
        let body = call(&catalog, Method::POST, "/v10/foo").await.unwrap();
        assert_eq!(body["version"], "v10");
        assert_eq!(body["params"]["version"], "v10");

        let body = call(&catalog, Method::POST, "/v2/bar").await.unwrap();
        assert_eq!(body["label"], "bar");

        let err = call(&catalog, Method::POST, "/v3/bar").await.unwrap_err();
        assert_eq!(err.code(), "version-not-supported");
        assert_eq!(err.context()["version"], json!(["v1", "v2"]));

        let err = call(&catalog, Method::POST, "/no-version/bar").await.unwrap_err();
        assert_eq!(err.code(), "not-found");
        assert_eq!(err.context()["url"], "/no-version/bar");

        let err = call(&catalog, Method::GET, "/foo?x=1").await.unwrap_err();
        assert_eq!(err.status(), 404);
        assert_eq!(err.context()["url"], "/foo?x=1");
    }

    #[tokio::test]
    async fn test_dispatch_non_numeric_version_literals() {
        let catalog = catalog(vec![ModuleRoutes::new(
            "labels",
            vec![
                RouteDescriptor::route("get", "/foo", echo("beta")).version("beta"),
                RouteDescriptor::route("get", "/bar", echo("dated")).version("2023-01"),
                RouteDescriptor::route("get", "/baz", echo("upper")).version("V1"),
            ],
        )]);
        let paths: Vec<_> = catalog.registry.routes().iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, ["/beta/foo", "/2023-01/bar", "/V1/baz"]);

        let body = call(&catalog, Method::GET, "/beta/foo").await.unwrap();
        assert_eq!(body["label"], "beta");
        assert_eq!(body["version"], "beta");
        let body = call(&catalog, Method::GET, "/2023-01/bar").await.unwrap();
        assert_eq!(body["label"], "dated");
        let body = call(&catalog, Method::GET, "/V1/baz").await.unwrap();
        assert_eq!(body["label"], "upper");

        let err = call(&catalog, Method::GET, "/v2/foo").await.unwrap_err();
        assert_eq!(err.code(), "version-not-supported");
        assert_eq!(err.context()["version"], json!(["beta"]));

        let err = call(&catalog, Method::GET, "/alpha/foo").await.unwrap_err();
        assert_eq!(err.code(), "not-found");
    }

    #[tokio::test]
    async fn test_get_routes_answer_head() {
        let catalog = catalog(vec![ModuleRoutes::new(
            "foo",
            vec![RouteDescriptor::route("get", "/foo", echo("foo"))],
        )]);
        let body = call(&catalog, Method::HEAD, "/foo").await.unwrap();
        assert_eq!(body["label"], "foo");
    }

    #[tokio::test]
    async fn test_split_versions_across_descriptors() {
        let catalog = catalog(vec![ModuleRoutes::new(
            "items",
            vec![
                RouteDescriptor::route("get", "/items/:id", echo("one")).version("v1"),
                RouteDescriptor::route("get", "/items/:id", echo("two")).version("v2"),
            ],
        )]);
        let body = call(&catalog, Method::GET, "/v2/items/9").await.unwrap();
        assert_eq!(body["label"], "two");
        assert_eq!(body["params"]["id"], "9");

        let err = call(&catalog, Method::GET, "/v3/items/9").await.unwrap_err();
        assert_eq!(err.code(), "version-not-supported");
        assert_eq!(err.context()["version"], json!(["v1"]));
    }

    #[tokio::test]
    async fn test_pass_through_reaches_next_route() {
        let pass = Handler::new(|req: RouteRequest| async move { Ok::<_, HttpError>(Flow::Next(req)) });
        let catalog = catalog(vec![ModuleRoutes::new(
            "chain",
            vec![
                RouteDescriptor::route("all", "/x", pass.clone()),
                RouteDescriptor::route("get", "/x", echo("second")),
            ],
        )]);
        let body = call(&catalog, Method::GET, "/x").await.unwrap();
        assert_eq!(body["label"], "second");

        let err = call(&catalog, Method::POST, "/x").await.unwrap_err();
        assert_eq!(err.code(), "not-found");
    }
}
