//! Session controller: the single owner of the client's authentication state.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};

use super::credentials::CredentialStore;
use super::session::{Credentials, LoginGrant, Session, UserIdentity};
use super::signal::{SessionEvent, SessionSignal};
use crate::api::{ApiClient, ApiError};
use crate::config::Config;

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    Unauthenticated,
    Authenticating,
    Authenticated(Session),
}

pub struct SessionController {
    api: ApiClient,
    store: Arc<dyn CredentialStore>,
    signal: SessionSignal,
    events: broadcast::Receiver<SessionEvent>,
    state: AuthState,
    /// Epoch armed for `state`, `None` while logged out
    active_epoch: Option<u64>,
}

impl SessionController {
    /// Build the controller and restore any stored session.
    pub fn new(config: &Config, store: Arc<dyn CredentialStore>) -> Result<Self, ApiError> {
        let signal = SessionSignal::new();
        let events = signal.subscribe();
        let api = ApiClient::new(config, store.clone(), signal.clone())?;

        let mut active_epoch = None;
        let state = match store.load() {
            Ok(Some(session)) => {
                active_epoch = Some(signal.arm());
                info!(username = %session.username(), "Restored stored session");
                AuthState::Authenticated(session)
            }
            Ok(None) => AuthState::Unauthenticated,
            Err(e) => {
                warn!(error = %e, "Stored session unreadable, starting logged out");
                if let Err(e) = store.clear() {
                    warn!(error = %e, "Failed to clear credentials");
                }
                AuthState::Unauthenticated
            }
        };

        Ok(Self {
            api,
            store,
            signal,
            events,
            state,
            active_epoch,
        })
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.signal.subscribe()
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, AuthState::Authenticated(_))
    }

    pub fn current_user(&self) -> Option<&UserIdentity> {
        match &self.state {
            AuthState::Authenticated(session) => Some(&session.user),
            _ => None,
        }
    }

    /// Epoch of the active session, used to tag background work
    pub fn session_epoch(&self) -> Option<u64> {
        self.signal.epoch()
    }

    pub fn remembered_username(&self) -> Option<String> {
        self.store.remembered_username().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read remembered username");
            None
        })
    }

    /// Move to `Authenticating`. Refused unless currently logged out.
    pub fn begin_login(&mut self) -> Result<(), ApiError> {
        match self.state {
            AuthState::Unauthenticated => {
                self.state = AuthState::Authenticating;
                Ok(())
            }
            _ => Err(ApiError::LoginInProgress),
        }
    }

    /// Apply the outcome of a login request started with [`begin_login`].
    ///
    /// [`begin_login`]: SessionController::begin_login
    pub fn complete_login(
        &mut self,
        result: Result<LoginGrant, ApiError>,
        remember: bool,
    ) -> Result<UserIdentity, ApiError> {
        let grant = match result {
            Ok(grant) => grant,
            Err(e) => {
                self.state = AuthState::Unauthenticated;
                debug!(error = %e, "Login failed");
                return Err(e);
            }
        };

        let session = Session::new(grant.user, grant.token);
        if let Err(e) = self.store.save(&session) {
            self.state = AuthState::Unauthenticated;
            return Err(e.into());
        }

        let remembered = remember.then(|| session.username());
        if let Err(e) = self.store.set_remembered_username(remembered) {
            warn!(error = %e, "Failed to update remembered username");
        }

        self.active_epoch = Some(self.signal.arm());
        info!(username = %session.username(), "Logged in");
        let user = session.user.clone();
        self.state = AuthState::Authenticated(session);
        Ok(user)
    }

    /// Validate, authenticate and persist in one call.
    pub async fn login(
        &mut self,
        credentials: &Credentials,
        remember: bool,
    ) -> Result<UserIdentity, ApiError> {
        credentials.validate()?;
        self.begin_login()?;
        let result = self.api.login(credentials).await;
        self.complete_login(result, remember)
    }

    /// Drop the local session. Returns the token that was in use so the
    /// caller can notify the backend.
    pub fn end_session(&mut self) -> Option<String> {
        let token = self.store.token().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read token during logout");
            None
        });
        self.signal.disarm();
        self.active_epoch = None;
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear credentials");
        }

        if self.is_authenticated() {
            info!("Logged out");
            self.signal.emit(SessionEvent::LoggedOut);
        }
        self.state = AuthState::Unauthenticated;
        token
    }

    /// End the session locally, then tell the backend. Remote failure is ignored.
    pub async fn logout(&mut self) {
        if let Some(token) = self.end_session() {
            if let Err(e) = self.api.notify_logout(&token).await {
                debug!(error = %e, "Logout notification failed");
            }
        }
    }

    /// Apply pending session events. Returns the invalidation that forced a
    /// logout, if one happened since the last call.
    ///
    /// Invalidations of any session other than the active one are dropped.
    pub fn sync(&mut self) -> Option<SessionEvent> {
        let mut forced = None;
        loop {
            match self.events.try_recv() {
                Ok(event @ SessionEvent::Invalidated { epoch, .. }) => {
                    if self.is_authenticated() && self.active_epoch == Some(epoch) {
                        info!("Session ended by backend");
                        self.state = AuthState::Unauthenticated;
                        self.active_epoch = None;
                        forced = Some(event);
                    } else {
                        debug!(epoch, "Ignoring invalidation of an earlier session");
                    }
                }
                Ok(SessionEvent::LoggedOut) => {}
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Session events lagged");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        forced
    }
}
