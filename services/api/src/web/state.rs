//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use learnsphere_core::pipeline::GenerationPipeline;
use learnsphere_core::ports::{CodeExecutionService, DatabaseService};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all
/// handlers. The pipeline and adapters are constructed explicitly and
/// injected here rather than living in module-level globals, so tests can
/// substitute fakes behind the port traits.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub pipeline: GenerationPipeline,
    pub executor: Arc<dyn CodeExecutionService>,
}
