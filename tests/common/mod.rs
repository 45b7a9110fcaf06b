#![allow(dead_code)]

use micro_routes::{
    AppConfig, Flow, Handler, HttpError, ModuleRoutes, RouteDescriptor, RouteRequest,
    ValidationSchemas, build_router,
    config::Env,
};
use serde_json::json;
use tokio::net::TcpListener;

#[derive(Debug)]
pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }
}

/// Serve `modules` on an ephemeral port, the way `main` does.
pub async fn spawn_app(config: AppConfig, modules: Vec<ModuleRoutes>) -> TestApp {
    let router = build_router(config, &modules);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        address,
        client: reqwest::Client::new(),
    }
}

pub fn development() -> AppConfig {
    AppConfig {
        name: "micro-foo".to_string(),
        ..AppConfig::default()
    }
}

pub fn production() -> AppConfig {
    AppConfig {
        env: Env::Production,
        ..development()
    }
}

// --- Fixture modules ---

async fn create_foo(request: RouteRequest) -> Result<Flow, HttpError> {
    Ok(Flow::json(request.body))
}

async fn handler(_request: RouteRequest) -> Result<Flow, HttpError> {
    Err(HttpError::default())
}

/// `bar`: one explicitly versioned, validated route plus one that always fails.
pub fn bar_module() -> ModuleRoutes {
    let bar = Handler::new(|request: RouteRequest| async move {
        if request.query("error").is_some() {
            if request.param("version") == Some("v1") {
                return Err(HttpError::message("bar-error"));
            }
            return Err(HttpError::message("bar-extendable-error")
                .with_status(505)
                .with_context(json!({ "test": true })));
        }
        Ok(Flow::json(json!({ "bar": "foo" })))
    });

    ModuleRoutes::new(
        "bar",
        vec![
            RouteDescriptor::route("POST", "/bar", bar)
                .versions(["v1", "v2"])
                .validate(
                    ValidationSchemas::new()
                        .body(json!({
                            "type": "object",
                            "properties": { "bar": { "type": "boolean", "const": true } }
                        }))
                        .headers(json!({ "type": "object" }))
                        .query(json!({
                            "type": "object",
                            "properties": { "error": { "type": "string" } }
                        }))
                        .params(json!({ "type": "object" })),
                ),
            RouteDescriptor::route("get", "/bar-fail", Handler::new(handler)),
        ],
    )
}

/// `foo`: two valid routes among four broken descriptors.
pub fn foo_module() -> ModuleRoutes {
    ModuleRoutes::new(
        "foo",
        vec![
            RouteDescriptor::route("post", "/foo", Handler::new(create_foo))
                .description("Foo route")
                .response(json!({ "fake": true })),
            RouteDescriptor::route("post", "/fou", Handler::new(create_foo)).version("v1"),
            RouteDescriptor::new().method("post"),
            RouteDescriptor::new().path("/foo"),
            RouteDescriptor::new().path("/foo").method("bad"),
            RouteDescriptor::new().path("/foo").method("put"),
        ],
    )
}

pub fn micro_foo() -> Vec<ModuleRoutes> {
    vec![bar_module(), foo_module()]
}
