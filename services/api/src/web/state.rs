//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use script_engine_core::{ports::OnboardingStore, EditingSession};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
///
/// The server hosts a single editing session.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<EditingSession>,
    pub onboarding: Arc<dyn OnboardingStore>,
    pub config: Arc<Config>,
}
