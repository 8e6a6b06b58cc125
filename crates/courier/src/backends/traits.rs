//! Backend trait definitions

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::models::{CalendarEvent, Email, ItemId};

/// Desktop mail client reached through local automation.
///
/// Calls are synchronous and made directly from the async search task.
pub trait LocalMailClient: Send + Sync {
    /// Attach to (or start) the automation host. Returns whether it worked.
    fn try_connect(&self) -> bool;

    fn is_connected(&self) -> bool;

    fn search_emails(&self, text: &str, max: usize, days_back: u32) -> Result<Vec<Email>>;

    fn search_events(
        &self,
        text: &str,
        max: usize,
        days_back: u32,
        days_forward: u32,
    ) -> Result<Vec<CalendarEvent>>;

    /// Show the item in the desktop client
    fn open_item(&self, id: &ItemId) -> Result<()>;

    fn reply(&self, id: &ItemId) -> Result<bool>;

    fn reply_all(&self, id: &ItemId) -> Result<bool>;

    fn forward(&self, id: &ItemId) -> Result<bool>;
}

/// Cloud mailbox reached through an authenticated API
#[async_trait]
pub trait RemoteMailClient: Send + Sync {
    /// Configure the client with its application id
    async fn initialize(&self, client_id: &str) -> Result<()>;

    fn is_initialized(&self) -> bool;

    /// Pure function of auth state and the wall clock
    fn is_authenticated(&self) -> bool;

    /// Sticky flag set when the service rejected an interactive sign-in
    fn auth_failed(&self) -> bool;

    /// Signed-in account name, if known
    fn account(&self) -> Option<String> {
        None
    }

    /// Refresh from cached credentials only. Never shows UI.
    async fn try_silent_auth(&self, cancel: &CancellationToken) -> bool;

    /// Silent refresh, then interactive sign-in if required
    async fn try_auth(&self, cancel: &CancellationToken) -> bool;

    async fn sign_out(&self) -> Result<()>;

    async fn search_emails(
        &self,
        text: &str,
        max: usize,
        days_back: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<Email>>;

    async fn search_events(
        &self,
        text: &str,
        max: usize,
        days_back: u32,
        days_forward: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<CalendarEvent>>;
}
