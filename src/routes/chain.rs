//! Per-route middleware chains.
//!
//! # Data Flow
//! ```text
//! RouteRequest
//!     → version gate      (explicit versions only)
//!     → auth guard        (if `auth` declared)
//!     → validation guard  (if `validate` declared)
//!     → handler 1..n      (each isolated: errors and panics become HttpError)
//!     → Flow::Respond | Flow::Next (falls through to the next matching route)
//! ```
//!
//! The first stage to fail ends the chain; its error goes to the error pipeline.

use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};

use futures_util::FutureExt;
use serde_json::json;

use crate::{
    auth::{AuthMode, AuthOptions, SessionState},
    error::{ErrorKind, HttpError},
    models::Handler,
    request::{Flow, RouteRequest},
    validation::RequestValidator,
};

use super::{descriptor::AcceptedRoute, pattern::VersionSpec};

/// Stage
///
/// One step of a composed chain.
pub enum Stage {
    VersionGate(Vec<String>),
    Authenticate {
        options: AuthOptions,
        sessions: SessionState,
    },
    Validate(Arc<RequestValidator>),
    Handle(Handler),
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::VersionGate(_) => "version-gate",
            Stage::Authenticate { .. } => "auth",
            Stage::Validate(_) => "validate",
            Stage::Handle(_) => "handler",
        }
    }

    async fn run(&self, mut request: RouteRequest) -> Result<Flow, HttpError> {
        match self {
            Stage::VersionGate(allowed) => {
                let admitted = request
                    .version
                    .as_deref()
                    .is_some_and(|v| allowed.iter().any(|a| a == v));
                if admitted {
                    Ok(Flow::Next(request))
                } else {
                    Err(HttpError::kind(ErrorKind::VersionNotSupported)
                        .with_context(json!({ "version": allowed })))
                }
            }
            Stage::Authenticate { options, sessions } => {
                match sessions
                    .load_session(&request, options.get_token.as_ref())
                    .await
                {
                    Ok(session) => request.session = Some(session),
                    Err(err) if options.mode == AuthMode::Require => return Err(err),
                    Err(err) => {
                        tracing::debug!(code = err.code(), "Continuing without a session");
                    }
                }
                Ok(Flow::Next(request))
            }
            Stage::Validate(validator) => {
                validator.check(&request)?;
                Ok(Flow::Next(request))
            }
            Stage::Handle(handler) => run_isolated(handler, request).await,
        }
    }
}

/// Turn a panic payload into the error the pipeline reports.
fn panic_error(payload: Box<dyn Any + Send>) -> HttpError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_default();
    HttpError::message(message)
}

/// Run one handler so that neither a returned error nor a panic (while building the
/// future or while polling it) can escape the request.
async fn run_isolated(handler: &Handler, request: RouteRequest) -> Result<Flow, HttpError> {
    let future = std::panic::catch_unwind(AssertUnwindSafe(|| handler.call(request)))
        .map_err(panic_error)?;
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(panic_error)?
}

/// Chain
///
/// The ordered stages attached to the route table for one descriptor. The same
/// chain is shared by every method the descriptor declares.
pub struct Chain {
    stages: Vec<Stage>,
}

impl Chain {
    /// compose
    ///
    /// Assemble the stages for an accepted route in their fixed order.
    pub fn compose(route: &AcceptedRoute, sessions: &SessionState) -> Self {
        let mut stages = Vec::new();
        if let VersionSpec::Only(allowed) = &route.versions {
            stages.push(Stage::VersionGate(allowed.clone()));
        }
        if let Some(options) = &route.auth {
            stages.push(Stage::Authenticate {
                options: options.clone(),
                sessions: Arc::clone(sessions),
            });
        }
        if let Some(validator) = &route.validator {
            stages.push(Stage::Validate(Arc::clone(validator)));
        }
        stages.extend(route.handlers.iter().cloned().map(Stage::Handle));
        Self { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Thread the request through every stage, stopping at the first response or error.
    pub async fn run(&self, mut request: RouteRequest) -> Result<Flow, HttpError> {
        for stage in &self.stages {
            match stage.run(request).await? {
                Flow::Next(next) => request = next,
                respond @ Flow::Respond(_) => return Ok(respond),
            }
        }
        Ok(Flow::Next(request))
    }
}
