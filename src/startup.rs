//! Application startup.
//!
//! Selects the physical store for this platform, wraps it in the session
//! storage adapter and builds the backend client on top of it.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::backend::{Backend, BackendError};
use crate::config::ConfigV1;
use crate::resolver::{AuthResolver, AuthState, ChannelNavigator};
use crate::state::AppState;
use crate::store::{create_store, SessionStorage, StoreError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("could not open session store: {0}")]
    Store(#[from] StoreError),
    #[error("could not create backend client: {0}")]
    Backend(#[from] BackendError),
}

pub async fn build_state(config: ConfigV1) -> Result<AppState, StartupError> {
    let config = Arc::new(config);
    let store = create_store(&config.storage).await?;
    info!(
        store = store.get_name(),
        capacity = ?store.capacity(),
        "session store ready"
    );

    let storage = Arc::new(SessionStorage::new(store));
    let backend = Backend::new(&config.backend, config.auth.clone(), storage)?;

    Ok(AppState {
        config,
        backend: Arc::new(backend),
    })
}

/// Run the auth state resolver and print every navigation command until Ctrl-C.
pub async fn watch(state: &AppState) -> Result<(), std::io::Error> {
    let (navigator, mut routes) = ChannelNavigator::new();
    let handle = AuthResolver::start(state.backend.auth_handle(), Arc::new(navigator));
    let mut states = handle.watch();

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            Some(route) = routes.recv() => println!("navigate {}", route),
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let summary = match &*states.borrow_and_update() {
                    AuthState::Unknown => "loading".to_string(),
                    AuthState::Unauthenticated => "signed out".to_string(),
                    AuthState::Authenticated { user, .. } => format!("signed in as {}", user.id),
                };
                println!("state {}", summary);
            }
        }
    }

    handle.unsubscribe().await;
    Ok(())
}
