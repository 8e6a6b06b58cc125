//! Authentication state machine for the remote backend
//!
//! Transitions:
//! - `Uninitialized -> SilentChecked` after a silent refresh that did not
//!   produce a token. Silent failures never set `AuthFailed`.
//! - `* -> Authenticated` whenever silent or interactive auth succeeds.
//! - `Authenticated -> (not authenticated)` once the token expires. There is
//!   no event for this; every read compares against the wall clock.
//! - `(not AuthFailed) -> AuthFailed` when the service rejects an
//!   interactive sign-in. A user cancelling the prompt or the flow failing
//!   before the service answers does not count.
//! - `* -> Uninitialized` on sign-out, which also drops cached credentials.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

/// A bearer token and when it stops being valid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub secret: String,
    pub expires_at: DateTime<Utc>,
    /// Signed-in account name, when the provider knows it
    pub account: Option<String>,
}

/// Result of a non-interactive credential refresh
#[derive(Debug)]
pub enum SilentOutcome {
    Acquired(AccessToken),
    /// No usable cached account; only an interactive prompt can help
    InteractionRequired,
    /// Network or service failure unrelated to user interaction
    Failed(anyhow::Error),
}

/// Result of an interactive sign-in prompt
#[derive(Debug)]
pub enum InteractiveOutcome {
    Acquired(AccessToken),
    /// The user dismissed the prompt or it timed out
    Cancelled,
    /// The service refused the sign-in
    Rejected(anyhow::Error),
    /// The flow broke before the service gave an answer
    Failed(anyhow::Error),
}

/// Source of tokens for the remote backend
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Refresh using cached state only. Must never show UI.
    async fn acquire_silent(&self) -> SilentOutcome;

    /// Run the interactive sign-in flow. Work that outlives the returned
    /// future must stop once `cancel` fires.
    async fn acquire_interactive(&self, cancel: &CancellationToken) -> InteractiveOutcome;

    /// Forget any cached account and tokens
    async fn clear(&self) -> Result<()>;
}

/// Sign-in state of the remote backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Uninitialized,
    SilentChecked,
    Authenticated { expires_at: DateTime<Utc> },
    AuthFailed,
}

#[derive(Debug)]
struct Session {
    state: AuthState,
    token: Option<AccessToken>,
}

/// Owns [`AuthState`] for the process lifetime.
///
/// Locks are held only briefly and never across an await.
pub struct AuthStateMachine {
    provider: RwLock<Option<Arc<dyn CredentialProvider>>>,
    session: RwLock<Session>,
}

impl Default for AuthStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthStateMachine {
    /// A machine without a provider; nothing can authenticate until
    /// [`initialize`](Self::initialize) is called.
    pub fn new() -> Self {
        Self {
            provider: RwLock::new(None),
            session: RwLock::new(Session {
                state: AuthState::Uninitialized,
                token: None,
            }),
        }
    }

    pub fn with_provider(provider: Arc<dyn CredentialProvider>) -> Self {
        let machine = Self::new();
        machine.initialize(provider);
        machine
    }

    /// Install the credential provider
    pub fn initialize(&self, provider: Arc<dyn CredentialProvider>) {
        *self.provider.write().unwrap_or_else(PoisonError::into_inner) = Some(provider);
    }

    pub fn is_initialized(&self) -> bool {
        self.provider
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Raw state as last recorded
    pub fn state(&self) -> AuthState {
        self.read_session().state.clone()
    }

    /// State as seen at `now`: an expired token reads as `SilentChecked`
    pub fn state_at(&self, now: DateTime<Utc>) -> AuthState {
        match self.state() {
            AuthState::Authenticated { expires_at } if now >= expires_at => AuthState::SilentChecked,
            state => state,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated_at(Utc::now())
    }

    pub fn is_authenticated_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.state_at(now), AuthState::Authenticated { .. })
    }

    /// Sticky interactive failure flag
    pub fn auth_failed(&self) -> bool {
        self.read_session().state == AuthState::AuthFailed
    }

    /// Current bearer token, if one is valid right now
    pub fn access_token(&self) -> Option<String> {
        let now = Utc::now();
        let session = self.read_session();
        session
            .token
            .as_ref()
            .filter(|t| now < t.expires_at)
            .map(|t| t.secret.clone())
    }

    /// Name of the signed-in account, if known
    pub fn account(&self) -> Option<String> {
        self.read_session().token.as_ref().and_then(|t| t.account.clone())
    }

    /// Attempt a non-interactive refresh. Safe to call on every search.
    pub async fn try_silent_auth(&self, cancel: &CancellationToken) -> bool {
        let Some(provider) = self.provider() else {
            return false;
        };
        if cancel.is_cancelled() {
            return false;
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return false,
            outcome = provider.acquire_silent() => outcome,
        };

        match outcome {
            SilentOutcome::Acquired(token) => {
                self.set_authenticated(token);
                true
            }
            SilentOutcome::InteractionRequired => {
                debug!("Silent auth: interaction required");
                self.mark_not_authenticated();
                false
            }
            SilentOutcome::Failed(e) => {
                debug!("Silent auth failed: {:#}", e);
                self.mark_not_authenticated();
                false
            }
        }
    }

    /// Silent refresh first, then the interactive prompt if the silent path
    /// specifically reported that interaction is required.
    pub async fn try_auth(&self, cancel: &CancellationToken) -> bool {
        let Some(provider) = self.provider() else {
            warn!("Sign-in requested before the remote client was initialized");
            return false;
        };
        if cancel.is_cancelled() {
            return false;
        }

        let silent = tokio::select! {
            biased;
            _ = cancel.cancelled() => return false,
            outcome = provider.acquire_silent() => outcome,
        };

        match silent {
            SilentOutcome::Acquired(token) => {
                self.set_authenticated(token);
                return true;
            }
            SilentOutcome::Failed(e) => {
                warn!("Sign-in aborted, silent refresh failed: {:#}", e);
                self.mark_not_authenticated();
                return false;
            }
            SilentOutcome::InteractionRequired => {}
        }

        let interactive = tokio::select! {
            biased;
            _ = cancel.cancelled() => return false,
            outcome = provider.acquire_interactive(cancel) => outcome,
        };

        match interactive {
            InteractiveOutcome::Acquired(token) => {
                self.set_authenticated(token);
                true
            }
            InteractiveOutcome::Cancelled => {
                info!("Interactive sign-in cancelled by user");
                self.mark_not_authenticated();
                false
            }
            InteractiveOutcome::Rejected(e) => {
                warn!("Interactive sign-in rejected: {:#}", e);
                let mut session = self.write_session();
                session.state = AuthState::AuthFailed;
                session.token = None;
                false
            }
            InteractiveOutcome::Failed(e) => {
                warn!("Interactive sign-in failed: {:#}", e);
                self.mark_not_authenticated();
                false
            }
        }
    }

    /// Install a token obtained outside the provider, such as one restored
    /// at startup
    pub fn adopt(&self, token: AccessToken) {
        self.set_authenticated(token);
    }

    /// Clear cached credentials and return to the initial state.
    ///
    /// The in-memory state is reset even if clearing the provider cache fails.
    pub async fn sign_out(&self) -> Result<()> {
        {
            let mut session = self.write_session();
            session.state = AuthState::Uninitialized;
            session.token = None;
        }
        info!("Signed out of remote backend");

        match self.provider() {
            Some(provider) => provider.clear().await,
            None => Ok(()),
        }
    }

    fn set_authenticated(&self, token: AccessToken) {
        info!(
            "Remote backend authenticated{} until {}",
            token
                .account
                .as_deref()
                .map(|a| format!(" as {}", a))
                .unwrap_or_default(),
            token.expires_at
        );
        let mut session = self.write_session();
        session.state = AuthState::Authenticated {
            expires_at: token.expires_at,
        };
        session.token = Some(token);
    }

    fn mark_not_authenticated(&self) {
        let mut session = self.write_session();
        if session.state != AuthState::AuthFailed {
            session.state = AuthState::SilentChecked;
        }
        session.token = None;
    }

    fn provider(&self) -> Option<Arc<dyn CredentialProvider>> {
        self.provider
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn read_session(&self) -> RwLockReadGuard<'_, Session> {
        self.session.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_session(&self) -> RwLockWriteGuard<'_, Session> {
        self.session.write().unwrap_or_else(PoisonError::into_inner)
    }
}
