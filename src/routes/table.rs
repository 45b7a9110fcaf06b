//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled `(method, pattern, chain)` entries in registration order
//! - Run the first matching entry's chain; fall through when it passes the request on
//! - Report `not-found` when nothing answers
//!
//! # Design Decisions
//! - Immutable after construction (shared without locks)
//! - First match wins
//! - A route whose version gate would reject the request is skipped while a later
//!   route may still own that version; it only answers (with its 400) when nothing
//!   else does

use std::{collections::HashMap, sync::Arc};

use axum::response::Response;
use crate::{
    error::HttpError,
    models::RouteMethod,
    pipeline::not_found,
    request::{Flow, RouteRequest},
};

use super::{chain::Chain, pattern::{PathPattern, VersionSpec}};

/// RouteEntry
///
/// One method of one accepted descriptor, attached under its pattern.
pub struct RouteEntry {
    pub method: RouteMethod,
    pub pattern: PathPattern,
    pub versions: VersionSpec,
    pub chain: Arc<Chain>,
}

#[derive(Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn extend(&mut self, entries: Vec<RouteEntry>) {
        self.entries.extend(entries);
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// dispatch
    ///
    /// Find the route for `request` and run it. Every failure, including "nothing
    /// matched", comes back as an `HttpError` for the error pipeline.
    pub async fn dispatch(&self, mut request: RouteRequest) -> Result<Response, HttpError> {
        let path = request.uri.path().to_string();
        let url = request.url();
        let mut gated: Option<&RouteEntry> = None;

        for entry in &self.entries {
            if !entry.method.matches(&request.method) {
                continue;
            }
            let Some(found) = entry.pattern.matches(&path) else {
                continue;
            };
            if !entry.versions.admits(found.version.as_deref()) {
                gated.get_or_insert(entry);
                continue;
            }

            apply_match(&mut request, found.version, found.params);
            match entry.chain.run(request).await? {
                Flow::Respond(response) => return Ok(response),
                Flow::Next(next) => request = next,
            }
        }

        if let Some(entry) = gated {
            tracing::debug!(
                pattern = entry.pattern.as_str(),
                path = %path,
                "Version not declared by the matching route"
            );
            if let Some(found) = entry.pattern.matches(&path) {
                apply_match(&mut request, found.version, found.params);
            }
            if let Flow::Respond(response) = entry.chain.run(request).await? {
                return Ok(response);
            }
        }

        Err(not_found(url))
    }
}

fn apply_match(
    request: &mut RouteRequest,
    version: Option<String>,
    params: HashMap<String, String>,
) {
    request.params = params;
    if let Some(version) = &version {
        request.params.insert("version".to_string(), version.clone());
    }
    request.version = version;
}
