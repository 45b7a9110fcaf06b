use serde_json::{Value, json};

use crate::{
    auth::{AuthOptions, JwtSessions},
    config::AppConfig,
    error::HttpError,
    models::{Handler, ModuleRoutes, RouteDescriptor},
    request::{Flow, RouteRequest},
    validation::ValidationSchemas,
};

/// The caller's own session. The guard has already rejected anonymous requests.
async fn me(request: RouteRequest) -> Result<Flow, HttpError> {
    Ok(Flow::json(json!({ "session": request.session })))
}

/// Like `me`, but anonymous callers get `{"session": null}`.
async fn me_optional(request: RouteRequest) -> Result<Flow, HttpError> {
    Ok(Flow::json(json!({ "session": request.session.unwrap_or(Value::Null) })))
}

fn issue_token(sessions: JwtSessions) -> Handler {
    Handler::named("createToken", move |request: RouteRequest| {
        let sessions = sessions.clone();
        async move {
            let token = sessions.generate_jwt(Some(&request.body))?;
            Ok(Flow::json(json!({ "token": token })))
        }
    })
}

pub fn module(config: &AppConfig) -> ModuleRoutes {
    let mut routes = vec![
        RouteDescriptor::route("get", "/me", Handler::new(me))
            .auth(AuthOptions::require())
            .description("The session attached to the request.")
            .response(json!({ "session": { "userId": "string" } })),
        RouteDescriptor::route("get", "/me-load", Handler::new(me_optional))
            .auth(AuthOptions::load())
            .name("getMeLoad")
            .description("The session, when the request carries a valid one."),
    ];

    // A proxy owns authentication; there is nothing to sign with.
    if !config.has_proxy {
        routes.push(
            RouteDescriptor::route("post", "/tokens", issue_token(JwtSessions::from_config(config)))
                .version("v1")
                .validate(ValidationSchemas::new().body(json!({
                    "type": "object",
                    "properties": {
                        "userId": { "type": ["string", "integer"] },
                        "roles": { "type": "array", "items": { "type": "string" } }
                    },
                    "required": ["userId"]
                })))
                .description("Sign a session into a bearer token.")
                .response(json!({ "token": "string" })),
        );
    }

    ModuleRoutes::new("session", routes)
}
