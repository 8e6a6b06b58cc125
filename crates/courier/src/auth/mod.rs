//! Remote backend credential lifecycle
//!
//! [`AuthStateMachine`] owns the sign-in state for the remote mailbox and
//! drives a [`CredentialProvider`]. [`GraphAuth`] is the provider used in
//! production: OAuth2 against the Microsoft identity platform with a local
//! loopback redirect.

mod oauth;
mod state;

pub use oauth::{GraphAuth, OAuthError};
pub use state::{
    AccessToken, AuthState, AuthStateMachine, CredentialProvider, InteractiveOutcome,
    SilentOutcome,
};
