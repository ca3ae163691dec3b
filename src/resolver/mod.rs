pub mod navigator;
pub mod route;

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub use navigator::{ChannelNavigator, Navigator, SessionSource};
pub use route::Route;

use crate::models::{AuthChange, AuthEvent, Session, User};

/// What the app currently knows about the signed-in user.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AuthState {
    /// Before the first session lookup has finished.
    #[default]
    Unknown,
    Authenticated { user: User, session: Session },
    Unauthenticated,
}

impl AuthState {
    fn from_session(session: Option<Session>) -> Self {
        match session {
            Some(session) => AuthState::Authenticated {
                user: session.user.clone(),
                session,
            },
            None => AuthState::Unauthenticated,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated { .. })
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            AuthState::Authenticated { user, .. } => Some(user),
            _ => None,
        }
    }
}

/// The next state and the navigation command (if any) for one event.
///
/// A missing session always sends the user to `/register`, whatever the event.
/// Only a sign-in or sign-up with a session navigates by role.
pub fn transition(change: &AuthChange) -> (AuthState, Option<Route>) {
    match &change.session {
        None => (AuthState::Unauthenticated, Some(Route::Register)),
        Some(session) => {
            let route = match change.event {
                AuthEvent::SignedIn | AuthEvent::SignedUp => Some(Route::for_user(&session.user)),
                _ => None,
            };
            (AuthState::from_session(Some(session.clone())), route)
        }
    }
}

async fn load_state(source: &dyn SessionSource) -> AuthState {
    match source.current_session().await {
        Ok(session) => AuthState::from_session(session),
        Err(e) => {
            warn!(
                event_name = "resolver.session.seed_failed",
                event_domain = "resolver",
                "could not load the current session: {}",
                e
            );
            AuthState::Unauthenticated
        }
    }
}

/// Keeps the app's auth state in step with the auth client and issues
/// navigation commands on sign-in, sign-up and session loss.
///
/// Events arrive on a bounded broadcast channel. If the task falls behind and
/// events are dropped, the state is reloaded from the source instead, and a
/// missing session navigates to `/register` as a dropped `SIGNED_OUT` would.
pub struct AuthResolver;

impl AuthResolver {
    /// Subscribe to `source`, then spawn the task that seeds and maintains the state.
    /// The subscription is taken before the seed lookup so no event is missed.
    pub fn start(source: Arc<dyn SessionSource>, navigator: Arc<dyn Navigator>) -> ResolverHandle {
        let mut events = source.subscribe();
        let (state_tx, state_rx) = watch::channel(AuthState::Unknown);
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let seed = load_state(source.as_ref()).await;
            debug!(authenticated = seed.is_authenticated(), "auth state seeded");
            state_tx.send_replace(seed);
            // Held weakly so the channel still closes when the client goes away.
            let weak_source = Arc::downgrade(&source);
            drop(source);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    received = events.recv() => match received {
                        Ok(change) => {
                            let (state, route) = transition(&change);
                            state_tx.send_replace(state);
                            if let Some(route) = route {
                                info!(
                                    event_name = "resolver.navigation",
                                    event_domain = "resolver",
                                    auth_event = change.event.as_str(),
                                    route = route.as_str(),
                                    "navigating"
                                );
                                navigator.replace(route);
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "auth event receiver lagged, reloading the session");
                            let Some(source) = weak_source.upgrade() else { break };
                            let state = load_state(source.as_ref()).await;
                            let lost = !state.is_authenticated();
                            state_tx.send_replace(state);
                            if lost {
                                navigator.replace(Route::Register);
                            }
                        }
                        Err(RecvError::Closed) => {
                            debug!("auth event channel closed");
                            break;
                        }
                    }
                }
            }
        });

        ResolverHandle {
            state: state_rx,
            stop: Some(stop_tx),
            task: Some(task),
        }
    }
}

/// The running resolver. Dropping it aborts the task; `unsubscribe` stops it
/// and waits until it has finished.
pub struct ResolverHandle {
    state: watch::Receiver<AuthState>,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ResolverHandle {
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// A receiver that observes every state replacement.
    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.state.clone()
    }

    pub fn is_loading(&self) -> bool {
        matches!(*self.state.borrow(), AuthState::Unknown)
    }

    /// Stop consuming events. Once this returns the state no longer changes
    /// and no further navigation is issued.
    pub async fn unsubscribe(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!("resolver task ended abnormally: {}", e);
                }
            }
        }
    }
}

impl Drop for ResolverHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;
    use tokio::sync::{broadcast, mpsc};

    struct FakeSource {
        events: broadcast::Sender<AuthChange>,
        current: StdMutex<Option<Session>>,
        fail: bool,
    }

    impl FakeSource {
        fn new(initial: Option<Session>) -> Arc<Self> {
            Self::with_capacity(initial, 16)
        }

        fn with_capacity(initial: Option<Session>, capacity: usize) -> Arc<Self> {
            let (events, _) = broadcast::channel(capacity);
            Arc::new(FakeSource {
                events,
                current: StdMutex::new(initial),
                fail: false,
            })
        }
    }

    #[async_trait]
    impl SessionSource for FakeSource {
        async fn current_session(&self) -> Result<Option<Session>, BackendError> {
            if self.fail {
                return Err(BackendError::NotSignedIn);
            }
            Ok(self.current.lock().unwrap().clone())
        }

        fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
            self.events.subscribe()
        }
    }

    fn session(is_landlord: serde_json::Value) -> Session {
        serde_json::from_value(json!({
            "access_token": "at",
            "refresh_token": "rt",
            "user": {"id": "u1", "user_metadata": {"is_landlord": is_landlord}}
        }))
        .unwrap()
    }

    async fn started(
        source: Arc<FakeSource>,
    ) -> (ResolverHandle, mpsc::UnboundedReceiver<Route>) {
        let (navigator, routes) = ChannelNavigator::new();
        let handle = AuthResolver::start(source, Arc::new(navigator));
        let mut state = handle.watch();
        state
            .wait_for(|s| *s != AuthState::Unknown)
            .await
            .expect("resolver seeds its state");
        (handle, routes)
    }

    async fn next_route(routes: &mut mpsc::UnboundedReceiver<Route>) -> Route {
        tokio::time::timeout(Duration::from_secs(1), routes.recv())
            .await
            .expect("a navigation command")
            .expect("navigator channel open")
    }

    #[test]
    fn test_transition_table() {
        let landlord = session(json!(true));
        let tenant = session(json!(false));

        let (state, route) = transition(&AuthChange::new(AuthEvent::SignedIn, Some(landlord.clone())));
        assert!(state.is_authenticated());
        assert_eq!(route, Some(Route::Dashboard));

        let (_, route) = transition(&AuthChange::new(AuthEvent::SignedUp, Some(tenant.clone())));
        assert_eq!(route, Some(Route::Home));

        let (_, route) = transition(&AuthChange::new(AuthEvent::TokenRefreshed, Some(landlord)));
        assert_eq!(route, None);

        let (state, route) = transition(&AuthChange::new(AuthEvent::TokenRefreshed, None));
        assert_eq!(state, AuthState::Unauthenticated);
        assert_eq!(route, Some(Route::Register));
    }

    #[test]
    fn test_non_boolean_landlord_flag_routes_home() {
        let (_, route) = transition(&AuthChange::new(AuthEvent::SignedIn, Some(session(json!("true")))));
        assert_eq!(route, Some(Route::Home));
    }

    #[tokio::test]
    async fn test_seed_does_not_navigate() {
        let source = FakeSource::new(Some(session(json!(true))));
        let (handle, mut routes) = started(source).await;

        assert!(!handle.is_loading());
        assert_eq!(handle.state().user().map(|u| u.id.as_str()), Some("u1"));
        assert!(routes.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_seed_failure_is_unauthenticated() {
        let (events, _) = broadcast::channel(4);
        let source = Arc::new(FakeSource {
            events,
            current: StdMutex::new(None),
            fail: true,
        });
        let (handle, mut routes) = started(source).await;

        assert_eq!(handle.state(), AuthState::Unauthenticated);
        assert!(routes.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_signed_in_navigates_by_role() {
        let source = FakeSource::new(None);
        let (handle, mut routes) = started(source.clone()).await;

        source
            .events
            .send(AuthChange::new(AuthEvent::SignedIn, Some(session(json!(true)))))
            .unwrap();
        assert_eq!(next_route(&mut routes).await, Route::Dashboard);

        source
            .events
            .send(AuthChange::new(AuthEvent::SignedIn, Some(session(json!(false)))))
            .unwrap();
        assert_eq!(next_route(&mut routes).await, Route::Home);
        assert!(handle.state().is_authenticated());
    }

    #[tokio::test]
    async fn test_lost_session_navigates_to_register_every_time() {
        let source = FakeSource::new(Some(session(json!(false))));
        let (handle, mut routes) = started(source.clone()).await;

        for _ in 0..2 {
            source
                .events
                .send(AuthChange::new(AuthEvent::SignedOut, None))
                .unwrap();
            assert_eq!(next_route(&mut routes).await, Route::Register);
        }
        assert_eq!(handle.state(), AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_user_updated_changes_state_only() {
        let source = FakeSource::new(None);
        let (handle, mut routes) = started(source.clone()).await;
        let mut state = handle.watch();

        source
            .events
            .send(AuthChange::new(AuthEvent::UserUpdated, Some(session(json!(true)))))
            .unwrap();
        state.wait_for(|s| s.is_authenticated()).await.unwrap();

        assert!(routes.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_no_effect_after_unsubscribe() {
        let source = FakeSource::new(Some(session(json!(true))));
        let (handle, mut routes) = started(source.clone()).await;
        let state = handle.watch();

        source
            .events
            .send(AuthChange::new(AuthEvent::SignedOut, None))
            .unwrap();
        assert_eq!(next_route(&mut routes).await, Route::Register);

        handle.unsubscribe().await;
        let _ = source
            .events
            .send(AuthChange::new(AuthEvent::SignedIn, Some(session(json!(true)))));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*state.borrow(), AuthState::Unauthenticated);
        assert!(routes.recv().await.is_none(), "navigator dropped with the task");
    }

    #[tokio::test]
    async fn test_dropped_events_reload_the_session() {
        let source = FakeSource::with_capacity(Some(session(json!(true))), 1);
        let (navigator, mut routes) = ChannelNavigator::new();
        let handle = AuthResolver::start(source.clone(), Arc::new(navigator));

        // The task has not run yet, so the receiver overflows.
        for _ in 0..3 {
            source
                .events
                .send(AuthChange::new(AuthEvent::TokenRefreshed, Some(session(json!(true)))))
                .unwrap();
        }
        *source.current.lock().unwrap() = None;

        assert_eq!(next_route(&mut routes).await, Route::Register);
        let mut state = handle.watch();
        state.wait_for(|s| s.is_authenticated()).await.unwrap();
        assert!(routes.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_channel_stops_the_task() {
        let source = FakeSource::new(None);
        let (navigator, mut routes) = ChannelNavigator::new();
        let _handle = AuthResolver::start(source.clone(), Arc::new(navigator));
        drop(source);

        let ended = tokio::time::timeout(Duration::from_secs(1), routes.recv())
            .await
            .expect("task finishes on its own");
        assert!(ended.is_none());
    }
}
