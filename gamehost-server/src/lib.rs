//! Game host server
//!
//! This crate provides the HTTP server around `gamehost-core`: configuration,
//! caller authentication, metrics and the axum router.

pub mod auth;
pub mod config;
pub mod metrics;
pub mod registry_init;
pub mod service;

use std::sync::Arc;

use anyhow::Context;
use gamehost_core::Dispatcher;

// Re-export main types
pub use config::{Cli, ServerConfig};
pub use service::{build_router, AppState, SharedState};

/// Load engines and assemble the shared application state
///
/// Any engine load failure is returned before a listener exists.
pub fn build_state(config: &ServerConfig) -> anyhow::Result<SharedState> {
    let catalog = registry_init::builtin_catalog();
    let engines = registry_init::load_engines(config, &catalog).context("failed to load game engines")?;

    let dispatcher = Dispatcher::new(Arc::new(engines), config.room_settings());
    let metrics = metrics::Metrics::new().context("failed to register metrics")?;
    let auth = auth::from_tokens(&config.auth_tokens);

    Ok(Arc::new(AppState::new(dispatcher, metrics, auth)))
}
