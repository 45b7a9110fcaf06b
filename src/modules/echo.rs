use serde_json::json;

use crate::{
    error::HttpError,
    models::{Handler, ModuleRoutes, RouteDescriptor},
    request::{Flow, RouteRequest},
    validation::ValidationSchemas,
};

async fn echo(request: RouteRequest) -> Result<Flow, HttpError> {
    Ok(Flow::json(json!({
        "version": request.version,
        "message": request.body["message"],
        "query": request.query,
    })))
}

pub fn module() -> ModuleRoutes {
    let schemas = ValidationSchemas::new()
        .body(json!({
            "type": "object",
            "properties": { "message": { "type": "string", "minLength": 1 } },
            "required": ["message"]
        }))
        .query(json!({
            "type": "object",
            "properties": { "trace": { "type": "string", "enum": ["true", "false"] } }
        }));

    ModuleRoutes::new(
        "echo",
        vec![
            RouteDescriptor::route("post", "/echo", Handler::new(echo))
                .versions(["v1", "v2"])
                .validate(schemas)
                .description("Send the message back.")
                .response(json!({ "version": "string", "message": "string" })),
        ],
    )
}
