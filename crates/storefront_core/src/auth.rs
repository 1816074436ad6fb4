//! crates/storefront_core/src/auth.rs
//!
//! The auth session store: an explicit state machine over the customer's
//! session, plus the operations that drive it (restore, login, signup,
//! logout) and the stateless OTP calls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::domain::{AuthPayload, LoginRequest, SignupRequest, User};
use crate::ports::{ClientError, ClientResult, SessionStore};

//=========================================================================================
// State Machine
//=========================================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    Anonymous,
    Authenticating,
    Authenticated(User),
    /// A login or signup was rejected. Equivalent to `Anonymous` for
    /// authorization, but keeps the message for display.
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    Begin,
    Succeeded(User),
    Rejected(String),
    RestoreFailed,
    LoggedOut,
    ErrorCleared,
    /// The operation that began authenticating was dropped before settling.
    Abandoned,
}

impl AuthState {
    pub fn initial(has_token: bool) -> Self {
        if has_token {
            Self::Authenticating
        } else {
            Self::Anonymous
        }
    }

    /// Returns the next state, or `None` if `event` is illegal here.
    pub fn apply(&self, event: &AuthEvent) -> Option<AuthState> {
        use AuthEvent as E;
        match (self, event) {
            (Self::Anonymous | Self::Error(_), E::Begin) => Some(Self::Authenticating),
            (Self::Authenticating, E::Succeeded(user)) => Some(Self::Authenticated(user.clone())),
            (Self::Authenticating, E::Rejected(message)) => Some(Self::Error(message.clone())),
            (Self::Authenticating, E::RestoreFailed | E::Abandoned) => Some(Self::Anonymous),
            (_, E::LoggedOut) => Some(Self::Anonymous),
            (Self::Error(_), E::ErrorCleared) => Some(Self::Anonymous),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Authenticating => "authenticating",
            Self::Authenticated(_) => "authenticated",
            Self::Error(_) => "in error",
        }
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Authenticating)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error(message) => Some(message),
            _ => None,
        }
    }

    pub fn session(&self) -> Session {
        Session {
            user: self.user().cloned(),
            is_authenticated: self.is_authenticated(),
            is_loading: self.is_loading(),
            error: self.error().map(str::to_string),
        }
    }
}

/// Flattened view of the auth state for presentation.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user: Option<User>,
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub error: Option<String>,
}

//=========================================================================================
// The Store
//=========================================================================================

pub struct AuthSessionStore {
    api: ApiClient,
    tokens: Arc<dyn SessionStore>,
    state: watch::Sender<AuthState>,
    in_flight: AtomicBool,
}

/// Held for the duration of one auth-mutating operation. Once the operation
/// has moved the state to `Authenticating`, dropping the guard before the
/// state settles falls back to `Anonymous`.
struct InFlight<'a> {
    flag: &'a AtomicBool,
    state: &'a watch::Sender<AuthState>,
    pending: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.pending {
            let abandoned = self.state.send_if_modified(|current| {
                match current.apply(&AuthEvent::Abandoned) {
                    Some(next) => {
                        *current = next;
                        true
                    }
                    None => false,
                }
            });
            if abandoned {
                warn!("Auth operation dropped before it settled");
            }
        }
        self.flag.store(false, Ordering::Release);
    }
}

impl AuthSessionStore {
    /// Builds the store, starting in `Authenticating` when a token is already
    /// stored. Call `restore` to resolve that state.
    pub fn new(api: ApiClient, tokens: Arc<dyn SessionStore>) -> Self {
        let has_token = read_token(tokens.as_ref()).is_some();
        let (state, _) = watch::channel(AuthState::initial(has_token));
        Self {
            api,
            tokens,
            state,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn session(&self) -> Session {
        self.state.borrow().session()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    fn begin_exclusive(&self) -> ClientResult<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| InFlight {
                flag: &self.in_flight,
                state: &self.state,
                pending: false,
            })
            .map_err(|_| ClientError::Busy)
    }

    fn transition(&self, event: AuthEvent, action: &'static str) -> ClientResult<()> {
        let mut outcome = Ok(());
        self.state.send_if_modified(|current| match current.apply(&event) {
            Some(next) => {
                *current = next;
                true
            }
            None => {
                outcome = Err(ClientError::InvalidTransition {
                    from: current.name(),
                    action,
                });
                false
            }
        });
        outcome
    }

    /// Resolves a stored token into a session. Any failure clears the token
    /// and lands in `Anonymous` without recording an error. A session that is
    /// already authenticated is kept without asking the backend.
    ///
    /// Returns whether the session is now authenticated.
    pub async fn restore(&self) -> ClientResult<bool> {
        let mut guard = self.begin_exclusive()?;
        if self.state.borrow().is_authenticated() {
            return Ok(true);
        }

        let Some(_) = read_token(self.tokens.as_ref()) else {
            if self.state.borrow().is_loading() {
                self.transition(AuthEvent::RestoreFailed, "restore the session")?;
            }
            return Ok(false);
        };
        if !self.state.borrow().is_loading() {
            self.transition(AuthEvent::Begin, "restore the session")?;
        }
        guard.pending = true;

        match self.api.profile().await {
            Ok(profile) => {
                if let Some(token) = profile.token.as_deref() {
                    write_token(self.tokens.as_ref(), token);
                }
                info!(user_id = %profile.user.id, "Session restored");
                self.transition(AuthEvent::Succeeded(profile.user), "restore the session")?;
                Ok(true)
            }
            Err(e) => {
                info!("Stored session could not be restored: {}", e);
                clear_token(self.tokens.as_ref());
                self.transition(AuthEvent::RestoreFailed, "restore the session")?;
                Ok(false)
            }
        }
    }

    /// Exchanges a verified phone/OTP pair for a session.
    pub async fn login(&self, request: &LoginRequest) -> ClientResult<User> {
        let mut guard = self.begin_exclusive()?;
        self.transition(AuthEvent::Begin, "log in")?;
        guard.pending = true;
        let result = self.api.login(request).await;
        self.settle(result, "log in")
    }

    pub async fn signup(&self, request: &SignupRequest) -> ClientResult<User> {
        let mut guard = self.begin_exclusive()?;
        self.transition(AuthEvent::Begin, "sign up")?;
        guard.pending = true;
        let result = self.api.signup(request).await;
        self.settle(result, "sign up")
    }

    fn settle(
        &self,
        result: ClientResult<AuthPayload>,
        action: &'static str,
    ) -> ClientResult<User> {
        match result {
            Ok(payload) => {
                write_token(self.tokens.as_ref(), &payload.token);
                info!(user_id = %payload.user.id, "Authenticated");
                self.transition(AuthEvent::Succeeded(payload.user.clone()), action)?;
                Ok(payload.user)
            }
            Err(e) => {
                warn!("Failed to {}: {}", action, e);
                self.transition(AuthEvent::Rejected(e.message()), action)?;
                Err(e)
            }
        }
    }

    /// Signs out locally. The backend is told when a token exists, but its
    /// answer never prevents the local session from being cleared.
    pub async fn logout(&self) -> ClientResult<()> {
        let _guard = self.begin_exclusive()?;

        if read_token(self.tokens.as_ref()).is_some() {
            if let Err(e) = self.api.logout().await {
                warn!("Backend logout failed, clearing local session anyway: {}", e);
            }
        }
        clear_token(self.tokens.as_ref());
        self.transition(AuthEvent::LoggedOut, "log out")?;
        info!("Logged out");
        Ok(())
    }

    /// Requests a one-time code. Never touches session state.
    pub async fn send_otp(&self, phone: &str) -> ClientResult<()> {
        self.api.send_otp(phone).await.map_err(|e| {
            warn!("Failed to send OTP: {}", e);
            e
        })
    }

    /// Checks a one-time code without logging in. Never touches session state.
    pub async fn verify_otp(&self, phone: &str, otp: &str) -> ClientResult<bool> {
        self.api.verify_otp(phone, otp).await.map_err(|e| {
            warn!("Failed to verify OTP: {}", e);
            e
        })
    }

    pub fn clear_error(&self) -> ClientResult<()> {
        self.transition(AuthEvent::ErrorCleared, "clear the error")
    }
}

//=========================================================================================
// Token Slot Helpers
//=========================================================================================

fn read_token(tokens: &dyn SessionStore) -> Option<String> {
    match tokens.get() {
        Ok(token) => token.filter(|t| !t.is_empty()),
        Err(e) => {
            warn!("Treating unreadable session token as absent: {}", e);
            None
        }
    }
}

fn write_token(tokens: &dyn SessionStore, token: &str) {
    if let Err(e) = tokens.set(token) {
        warn!("Session token could not be persisted: {}", e);
    }
}

fn clear_token(tokens: &dyn SessionStore) {
    if let Err(e) = tokens.clear() {
        warn!("Session token could not be removed: {}", e);
    }
}

//=========================================================================================
// Tests
//=========================================================================================
