//! Shared application state.
//!
//! Built once at startup and handed to every command.

use crate::backend::Backend;
use crate::config::ConfigV1;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded at startup.
    pub config: Arc<ConfigV1>,
    /// Backend client whose auth sessions persist through the selected store.
    pub backend: Arc<Backend>,
}
