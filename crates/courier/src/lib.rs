//! Courier - unified mail and calendar search
//!
//! This crate provides a search orchestrator over two mail backends:
//! - A local desktop mail client driven through an automation host
//! - A remote cloud mailbox (Microsoft Graph) behind OAuth sign-in
//!
//! A query is routed by tag, streamed back as categorized result items
//! (quick actions, emails, events, sign-in/out prompts) and can be
//! cancelled at any point. Operations on results run through
//! [`ActionHandler`].

pub mod actions;
pub mod auth;
pub mod backends;
pub mod config;
pub mod graph;
pub mod local;
pub mod models;
pub mod results;
pub mod search;
pub mod settings;

pub use actions::{ActionError, ActionHandler, Launcher, SystemLauncher};
pub use auth::{AuthState, AuthStateMachine, CredentialProvider, GraphAuth};
pub use backends::{
    AvailabilityProbe, Backend, BackendAvailability, BackendSelection, BackendSelector,
    InMemoryLocalClient, InMemoryRemoteClient, LocalMailClient, RemoteMailClient,
};
pub use config::GraphCredentials;
pub use graph::GraphClient;
pub use local::BridgeClient;
pub use models::{CalendarEvent, Email, EmailAddress, ItemId};
pub use results::{Category, Operation, ResultItem, ResultKind};
pub use search::{SearchKind, SearchOrchestrator, SearchRequest, SearchStream};
pub use settings::{QuickAction, SearchSettings, SearchTags};
