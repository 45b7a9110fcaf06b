//! Structural validation of route descriptors.
//!
//! A descriptor that fails any rule is logged and dropped; its siblings are unaffected.

use std::sync::Arc;

use crate::{
    auth::AuthOptions,
    models::{Documentation, Handler, RouteDescriptor, RouteMethod},
    validation::{RequestValidator, SchemaError, ValidationSchemas},
};

use super::pattern::VersionSpec;

#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("Module [{module}]: Route with index [{index}] must have a `path` defined.")]
    MissingPath { module: String, index: usize },
    #[error(
        "Module [{module}]: Route {path} must have a valid `method` (get, post, put, delete, head, patch, all)"
    )]
    InvalidMethod { module: String, path: String },
    #[error("Module [{module}]: Route {methods} - {path} must have a `handler` attached")]
    MissingHandler {
        module: String,
        methods: String,
        path: String,
    },
    #[error("Module [{module}]: Route {methods} - {path} has an {source}")]
    InvalidSchema {
        module: String,
        methods: String,
        path: String,
        #[source]
        source: SchemaError,
    },
}

/// AcceptedRoute
///
/// A descriptor that passed validation, with its fields normalized.
#[derive(Debug)]
pub struct AcceptedRoute {
    pub path: String,
    pub methods: Vec<RouteMethod>,
    pub versions: VersionSpec,
    pub handlers: Vec<Handler>,
    pub auth: Option<AuthOptions>,
    pub validate: Option<ValidationSchemas>,
    pub validator: Option<Arc<RequestValidator>>,
    pub documentation: Documentation,
    pub name: Option<String>,
}

fn method_label(methods: &[RouteMethod]) -> String {
    methods
        .iter()
        .map(|m| m.as_str().to_uppercase())
        .collect::<Vec<_>>()
        .join("/")
}

/// Check a descriptor against the registration rules, in order, stopping at the
/// first failure.
pub fn validate_descriptor(
    module: &str,
    index: usize,
    descriptor: RouteDescriptor,
) -> Result<AcceptedRoute, DescriptorError> {
    let path = match descriptor.path {
        Some(path) if !path.is_empty() => path,
        _ => {
            return Err(DescriptorError::MissingPath {
                module: module.to_string(),
                index,
            });
        }
    };

    let methods = descriptor
        .methods
        .iter()
        .map(|m| m.parse::<RouteMethod>())
        .collect::<Result<Vec<_>, _>>()
        .ok()
        .filter(|methods| !methods.is_empty())
        .ok_or_else(|| DescriptorError::InvalidMethod {
            module: module.to_string(),
            path: path.clone(),
        })?;

    if descriptor.handlers.is_empty() {
        return Err(DescriptorError::MissingHandler {
            module: module.to_string(),
            methods: method_label(&methods),
            path,
        });
    }

    let validator = descriptor
        .validate
        .as_ref()
        .map(RequestValidator::compile)
        .transpose()
        .map_err(|source| DescriptorError::InvalidSchema {
            module: module.to_string(),
            methods: method_label(&methods),
            path: path.clone(),
            source,
        })?
        .map(Arc::new);

    // The last handler names the route when the descriptor does not.
    let name = descriptor
        .name
        .or_else(|| descriptor.handlers.last().and_then(|h| h.name().map(str::to_string)));

    Ok(AcceptedRoute {
        path,
        methods,
        versions: VersionSpec::from_declared(descriptor.versions.as_deref()),
        handlers: descriptor.handlers,
        auth: descriptor.auth,
        validate: descriptor.validate,
        validator,
        documentation: descriptor.documentation,
        name,
    })
}
