use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use super::error::BackendError;
use super::http::{api_error, read_json, BackendHttp};
use crate::config::AuthOptions;
use crate::models::{AuthChange, AuthEvent, Session, SignUpMetadata, User};
use crate::store::StorageAdapter;

/// Sessions expiring within this window are refreshed before being handed out.
const REFRESH_MARGIN_SECS: i64 = 10;
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Result of a signup: a session only when the backend confirms accounts automatically.
#[derive(Debug, Clone)]
pub struct SignUpResponse {
    pub user: User,
    pub session: Option<Session>,
}

/// Client for the hosted auth API.
///
/// Holds the current session in memory, persists it through the injected
/// `StorageAdapter`, and publishes every lifecycle change on a broadcast
/// channel (`on_auth_state_change`).
pub struct AuthClient {
    http: Arc<BackendHttp>,
    storage: Arc<dyn StorageAdapter>,
    options: AuthOptions,
    storage_key: String,
    current: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthChange>,
}

impl AuthClient {
    pub fn new(
        http: Arc<BackendHttp>,
        project_ref: &str,
        options: AuthOptions,
        storage: Arc<dyn StorageAdapter>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        if options.detect_session_in_url {
            warn!(
                event_name = "auth.options.ignored",
                event_domain = "auth",
                "detect_session_in_url is set but this client never receives redirect URLs"
            );
        }
        AuthClient {
            http,
            storage,
            options,
            storage_key: format!("sb-{}-auth-token", project_ref),
            current: RwLock::new(None),
            events,
        }
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    pub fn options(&self) -> &AuthOptions {
        &self.options
    }

    /// A new receiver for lifecycle events; only events sent after this call are seen.
    pub fn on_auth_state_change(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }

    /// The access token of the in-memory session, without refreshing it.
    pub async fn access_token(&self) -> Option<String> {
        self.current
            .read()
            .await
            .as_ref()
            .map(|session| session.access_token.clone())
    }

    /// The current session: in memory first, then the persisted copy.
    /// Sessions close to expiry are refreshed when `auto_refresh_token` is on.
    pub async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        let session = match self.current_or_persisted().await {
            Some(session) => session,
            None => return Ok(None),
        };

        if self.options.auto_refresh_token && session.expires_within(REFRESH_MARGIN_SECS) {
            debug!(user_id = %session.user.id, "session expired or expiring, refreshing");
            return self.refresh_with(&session.refresh_token).await.map(Some);
        }

        *self.current.write().await = Some(session.clone());
        Ok(Some(session))
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        let response = self
            .http
            .request(Method::POST, "/auth/v1/token?grant_type=password", None)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let session: Session = read_json(response).await?;
        self.establish(AuthEvent::SignedIn, session.with_expiry_from(Utc::now().timestamp()))
            .await
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<SignUpResponse, BackendError> {
        let response = self
            .http
            .request(Method::POST, "/auth/v1/signup", None)
            .json(&json!({ "email": email, "password": password, "data": metadata }))
            .send()
            .await?;
        let body: Value = read_json(response).await?;

        if body.get("access_token").is_some() {
            let session: Session = serde_json::from_value(body)
                .map_err(|e| BackendError::Decode(format!("signup session: {}", e)))?;
            let session = self
                .establish(AuthEvent::SignedUp, session.with_expiry_from(Utc::now().timestamp()))
                .await?;
            return Ok(SignUpResponse {
                user: session.user.clone(),
                session: Some(session),
            });
        }

        // Confirmation pending: the body is the user, possibly wrapped.
        let user_json = match body.get("user") {
            Some(user) => user.clone(),
            None => body,
        };
        let user: User = serde_json::from_value(user_json)
            .map_err(|e| BackendError::Decode(format!("signup user: {}", e)))?;
        info!(user_id = %user.id, "account created, confirmation pending");
        Ok(SignUpResponse {
            user,
            session: None,
        })
    }

    /// Revoke the session server-side and forget it locally.
    /// An already-invalid token (401/403/404) still counts as signed out.
    pub async fn sign_out(&self) -> Result<(), BackendError> {
        if let Some(session) = self.current_or_persisted().await {
            let response = self
                .http
                .request(Method::POST, "/auth/v1/logout", Some(&session.access_token))
                .send()
                .await?;
            let status = response.status().as_u16();
            if !response.status().is_success() && !matches!(status, 401 | 403 | 404) {
                let body = response.text().await?;
                return Err(api_error(status, &body));
            }
        }

        let removed = self.forget_session().await;
        self.emit(AuthEvent::SignedOut, None);
        removed
    }

    /// Merge `metadata_patch` into the user's metadata on the backend.
    pub async fn update_user(&self, metadata_patch: Map<String, Value>) -> Result<User, BackendError> {
        let session = self.get_session().await?.ok_or(BackendError::NotSignedIn)?;
        let response = self
            .http
            .request(Method::PUT, "/auth/v1/user", Some(&session.access_token))
            .json(&json!({ "data": metadata_patch }))
            .send()
            .await?;
        let user: User = read_json(response).await?;

        let mut updated = session;
        updated.user = user.clone();
        self.establish(AuthEvent::UserUpdated, updated).await?;
        Ok(user)
    }

    pub async fn refresh_session(&self) -> Result<Session, BackendError> {
        let session = self
            .current_or_persisted()
            .await
            .ok_or(BackendError::NotSignedIn)?;
        self.refresh_with(&session.refresh_token).await
    }

    async fn refresh_with(&self, refresh_token: &str) -> Result<Session, BackendError> {
        let response = self
            .http
            .request(Method::POST, "/auth/v1/token?grant_type=refresh_token", None)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        match read_json::<Session>(response).await {
            Ok(session) => {
                self.establish(
                    AuthEvent::TokenRefreshed,
                    session.with_expiry_from(Utc::now().timestamp()),
                )
                .await
            }
            Err(BackendError::Api { status, message }) if (400..500).contains(&status) => {
                warn!(
                    event_name = "auth.session.refresh_rejected",
                    event_domain = "auth",
                    status,
                    "refresh token rejected, signing out: {}",
                    message
                );
                if let Err(e) = self.forget_session().await {
                    warn!("could not remove rejected session: {}", e);
                }
                self.emit(AuthEvent::SignedOut, None);
                Err(BackendError::Api { status, message })
            }
            Err(e) => Err(e),
        }
    }

    async fn current_or_persisted(&self) -> Option<Session> {
        let cached = self.current.read().await.clone();
        match cached {
            Some(session) => Some(session),
            None => self.load_persisted().await,
        }
    }

    async fn load_persisted(&self) -> Option<Session> {
        if !self.options.persist_session {
            return None;
        }
        let raw = self.storage.get_item(&self.storage_key).await?;
        match serde_json::from_str::<Session>(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!("ignoring unreadable persisted session: {}", e);
                None
            }
        }
    }

    async fn persist(&self, session: &Session) -> Result<(), BackendError> {
        if !self.options.persist_session {
            return Ok(());
        }
        let value = serde_json::to_string(session)
            .map_err(|e| BackendError::Decode(format!("session encoding: {}", e)))?;
        self.storage.set_item(&self.storage_key, &value).await?;
        Ok(())
    }

    /// Persist, adopt and announce a new session. A session that cannot be
    /// persisted is not adopted: the client reports itself signed out instead.
    async fn establish(&self, event: AuthEvent, session: Session) -> Result<Session, BackendError> {
        if let Err(e) = self.persist(&session).await {
            warn!(
                event_name = "auth.session.persist_failed",
                event_domain = "auth",
                auth_event = event.as_str(),
                "session could not be persisted, treating user as signed out: {}",
                e
            );
            *self.current.write().await = None;
            self.emit(AuthEvent::SignedOut, None);
            return Err(e);
        }

        *self.current.write().await = Some(session.clone());
        self.emit(event, Some(session.clone()));
        Ok(session)
    }

    async fn forget_session(&self) -> Result<(), BackendError> {
        *self.current.write().await = None;
        if self.options.persist_session {
            self.storage.remove_item(&self.storage_key).await?;
        }
        Ok(())
    }

    fn emit(&self, event: AuthEvent, session: Option<Session>) {
        info!(
            event_name = "auth.state.changed",
            event_domain = "auth",
            auth_event = event.as_str(),
            has_session = session.is_some(),
            "auth state changed"
        );
        if self.events.send(AuthChange::new(event, session)).is_err() {
            debug!("no subscribers for auth event");
        }
    }
}
