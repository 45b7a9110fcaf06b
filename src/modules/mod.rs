//! The route modules the `micro-routes` binary serves.

pub mod echo;
pub mod session;

use crate::{config::AppConfig, models::ModuleRoutes};

/// builtin
///
/// Every built-in module, in registration order.
pub fn builtin(config: &AppConfig) -> Vec<ModuleRoutes> {
    vec![session::module(config), echo::module()]
}
