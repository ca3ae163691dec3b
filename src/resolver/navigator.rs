use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use super::route::Route;
use crate::backend::{AuthClient, BackendError};
use crate::models::{AuthChange, Session};

/// The Navigator trait replaces the current screen. There is no back stack:
/// every call is a full replacement.
pub trait Navigator: Send + Sync {
    fn replace(&self, route: Route);
}

/// Delivers routes on an unbounded channel, for whatever drives the UI.
pub struct ChannelNavigator {
    sender: mpsc::UnboundedSender<Route>,
}

impl ChannelNavigator {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Route>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (ChannelNavigator { sender }, receiver)
    }
}

impl Navigator for ChannelNavigator {
    fn replace(&self, route: Route) {
        if self.sender.send(route).is_err() {
            debug!(route = route.as_str(), "navigation dropped, receiver is gone");
        }
    }
}

/// Where the resolver gets the initial session and the event stream from.
#[async_trait]
pub trait SessionSource: Send + Sync {
    async fn current_session(&self) -> Result<Option<Session>, BackendError>;
    fn subscribe(&self) -> broadcast::Receiver<AuthChange>;
}

#[async_trait]
impl SessionSource for AuthClient {
    async fn current_session(&self) -> Result<Option<Session>, BackendError> {
        self.get_session().await
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.on_auth_state_change()
    }
}
