//! The list of routes accepted at startup, as published on `GET /routes`.

use serde_json::Value;

use crate::models::{AuthSummary, RegisteredRoute};

use super::{descriptor::AcceptedRoute, pattern::VersionSpec};

/// RouteRegistry
///
/// Append-only while modules are being registered, then frozen behind an `Arc` and
/// only read. Entries keep registration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteRegistry {
    routes: Vec<RegisteredRoute>,
}

/// Upper-case the first character, as used in derived route names (`postBar`).
fn capitalize(module: &str) -> String {
    let mut chars = module.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn acl_hint(hint: Option<&Value>) -> Value {
    hint.cloned().unwrap_or(Value::Bool(false))
}

/// Expand an accepted route into one entry per `(version, method)` pair.
pub fn registered_routes(module: &str, route: &AcceptedRoute) -> Vec<RegisteredRoute> {
    let description = route.documentation.description.clone().unwrap_or_default();
    let validate = route
        .validate
        .as_ref()
        .map(|v| v.summary())
        .unwrap_or_default();
    let auth = AuthSummary::from(route.auth.as_ref());
    let can = acl_hint(route.documentation.can.as_ref());
    let is = acl_hint(route.documentation.is.as_ref());

    route
        .versions
        .labels()
        .into_iter()
        .flat_map(|version| {
            route.methods.iter().map(move |method| (version.clone(), *method))
        })
        .map(|(version, method)| RegisteredRoute {
            module: module.to_string(),
            name: route
                .name
                .clone()
                .unwrap_or_else(|| format!("{}{}", method.as_str(), capitalize(module))),
            description: description.clone(),
            path: VersionSpec::qualified_path(&version, &route.path),
            version,
            method,
            auth,
            can: can.clone(),
            is: is.clone(),
            validate: validate.clone(),
            response: route.documentation.response.clone(),
        })
        .collect()
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn extend(&mut self, entries: Vec<RegisteredRoute>) {
        self.routes.extend(entries);
    }

    pub fn routes(&self) -> &[RegisteredRoute] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
