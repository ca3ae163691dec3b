use serde_json::{Map, Value};
use tracing::info;

use super::FlowError;
use crate::backend::Backend;
use crate::resolver::Route;

/// Result of switching between landlord and user mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeToggle {
    /// The `temp_user_mode` value now stored on the account.
    pub user_mode: bool,
    pub route: Route,
}

/// Flip `temp_user_mode` on the account. Leaving user mode goes to the
/// dashboard, entering it goes home.
pub async fn toggle_user_mode(backend: &Backend, is_user_mode: bool) -> Result<ModeToggle, FlowError> {
    let user_mode = !is_user_mode;
    let mut patch = Map::new();
    patch.insert("temp_user_mode".to_string(), Value::Bool(user_mode));
    backend.auth().update_user(patch).await?;

    let route = if is_user_mode {
        Route::Dashboard
    } else {
        Route::Home
    };
    info!(user_mode, route = route.as_str(), "user mode switched");
    Ok(ModeToggle { user_mode, route })
}

pub async fn sign_out(backend: &Backend) -> Result<Route, FlowError> {
    backend.auth().sign_out().await?;
    Ok(Route::Login)
}
