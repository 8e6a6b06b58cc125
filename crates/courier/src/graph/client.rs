//! Graph API HTTP client
//!
//! Searches mail and calendar for the signed-in user. HTTP is synchronous
//! (ureq) and runs on the blocking pool; auth is delegated to an
//! [`AuthStateMachine`] driving [`GraphAuth`].

use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::api::{GraphEvent, GraphMessage, ListResponse};
use super::normalize::{normalize_event, normalize_message};
use crate::auth::{AuthStateMachine, GraphAuth};
use crate::backends::RemoteMailClient;
use crate::config::{DEFAULT_TENANT, GraphCredentials};
use crate::models::{CalendarEvent, Email};

/// Remote backend over Microsoft Graph
pub struct GraphClient {
    auth: AuthStateMachine,
    tenant: RwLock<String>,
}

impl Default for GraphClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphClient {
    const BASE_URL: &'static str = "https://graph.microsoft.com/v1.0";

    const MESSAGE_FIELDS: &'static str =
        "id,subject,from,bodyPreview,receivedDateTime,isRead,hasAttachments,webLink";

    const EVENT_FIELDS: &'static str =
        "id,subject,start,end,isAllDay,isCancelled,location,organizer,webLink,onlineMeeting";

    /// Events are filtered by text client-side, so fetch a wider page
    const CALENDAR_PAGE_SIZE: usize = 100;

    /// Upper bound on `@odata.nextLink` hops for one search
    const MAX_PAGES: usize = 10;

    /// An uninitialized client; call [`RemoteMailClient::initialize`] before use
    pub fn new() -> Self {
        Self {
            auth: AuthStateMachine::new(),
            tenant: RwLock::new(DEFAULT_TENANT.to_string()),
        }
    }

    /// A client initialized from loaded credentials
    pub fn from_credentials(credentials: &GraphCredentials) -> Result<Self> {
        let client = Self::new();
        *client.tenant.write().unwrap_or_else(PoisonError::into_inner) =
            credentials.tenant.clone();
        client
            .auth
            .initialize(Arc::new(GraphAuth::new(credentials)?));
        Ok(client)
    }

    /// A client driven by a custom state machine (alternate providers, tests)
    pub fn with_auth(auth: AuthStateMachine) -> Self {
        Self {
            auth,
            tenant: RwLock::new(DEFAULT_TENANT.to_string()),
        }
    }

    pub fn auth(&self) -> &AuthStateMachine {
        &self.auth
    }

    fn bearer(&self) -> Result<String> {
        self.auth
            .access_token()
            .context("Remote backend is not signed in")
    }

    fn messages_url(text: &str, max: usize, days_back: u32) -> Result<Url> {
        let top = max.to_string();
        let mut params: Vec<(&str, String)> = vec![
            ("$top", top),
            ("$select", Self::MESSAGE_FIELDS.to_string()),
        ];
        if text.is_empty() {
            let since = (Utc::now() - Duration::days(days_back as i64))
                .format("%Y-%m-%dT%H:%M:%SZ")
                .to_string();
            params.push(("$filter", format!("receivedDateTime ge {}", since)));
            params.push(("$orderby", "receivedDateTime desc".to_string()));
        } else {
            // $search cannot be combined with a date filter; the window is
            // applied after the response arrives
            params.push(("$search", format!("\"{}\"", text.replace('"', ""))));
        }
        Ok(Url::parse_with_params(
            &format!("{}/me/messages", Self::BASE_URL),
            &params,
        )?)
    }

    fn calendar_url(days_back: u32, days_forward: u32) -> Result<Url> {
        let now = Utc::now();
        let start = (now - Duration::days(days_back as i64)).format("%Y-%m-%dT%H:%M:%SZ");
        let end = (now + Duration::days(days_forward as i64)).format("%Y-%m-%dT%H:%M:%SZ");
        Ok(Url::parse_with_params(
            &format!("{}/me/calendarView", Self::BASE_URL),
            &[
                ("startDateTime", start.to_string()),
                ("endDateTime", end.to_string()),
                ("$top", Self::CALENDAR_PAGE_SIZE.to_string()),
                ("$orderby", "start/dateTime".to_string()),
                ("$select", Self::EVENT_FIELDS.to_string()),
            ],
        )?)
    }

    /// GET a JSON document on the blocking pool
    async fn get_json<T>(&self, url: Url) -> Result<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let token = self.bearer()?;
        debug!("GET {}", url.path());
        tokio::task::spawn_blocking(move || -> Result<T> {
            let mut response = ureq::get(url.as_str())
                .header("Authorization", &format!("Bearer {}", token))
                .header("Prefer", "outlook.timezone=\"UTC\"")
                .call()
                .with_context(|| format!("Failed to send request to {}", url.path()))?;
            response
                .body_mut()
                .read_json()
                .with_context(|| format!("Failed to parse response from {}", url.path()))
        })
        .await
        .map_err(|e| anyhow!(e))?
    }
}

#[async_trait]
impl RemoteMailClient for GraphClient {
    async fn initialize(&self, client_id: &str) -> Result<()> {
        let tenant = self
            .tenant
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let credentials = GraphCredentials {
            client_id: client_id.to_string(),
            tenant,
        };
        self.auth.initialize(Arc::new(GraphAuth::new(&credentials)?));
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.auth.is_initialized()
    }

    fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated()
    }

    fn auth_failed(&self) -> bool {
        self.auth.auth_failed()
    }

    fn account(&self) -> Option<String> {
        self.auth.account()
    }

    async fn try_silent_auth(&self, cancel: &CancellationToken) -> bool {
        self.auth.try_silent_auth(cancel).await
    }

    async fn try_auth(&self, cancel: &CancellationToken) -> bool {
        self.auth.try_auth(cancel).await
    }

    async fn sign_out(&self) -> Result<()> {
        self.auth.sign_out().await
    }

    async fn search_emails(
        &self,
        text: &str,
        max: usize,
        days_back: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<Email>> {
        if cancel.is_cancelled() {
            return Ok(Vec::new());
        }
        let url = Self::messages_url(text.trim(), max, days_back)?;
        let cutoff = Utc::now() - Duration::days(days_back as i64);
        let mut emails = collect_pages(
            url,
            max,
            Self::MAX_PAGES,
            cancel,
            move |url| self.get_json::<ListResponse<GraphMessage>>(url),
            |msg| {
                normalize_message(msg)
                    .inspect_err(|e| warn!("Skipping message: {:#}", e))
                    .ok()
                    .filter(|e| e.received_at >= cutoff)
            },
        )
        .await?;
        emails.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        emails.truncate(max);
        Ok(emails)
    }

    async fn search_events(
        &self,
        text: &str,
        max: usize,
        days_back: u32,
        days_forward: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<CalendarEvent>> {
        if cancel.is_cancelled() {
            return Ok(Vec::new());
        }
        let url = Self::calendar_url(days_back, days_forward)?;
        let needle = text.trim().to_lowercase();
        collect_pages(
            url,
            max,
            Self::MAX_PAGES,
            cancel,
            move |url| self.get_json::<ListResponse<GraphEvent>>(url),
            |event| matching_event(event, &needle),
        )
        .await
    }
}

/// Normalized event if it is live and matches `needle`
fn matching_event(event: GraphEvent, needle: &str) -> Option<CalendarEvent> {
    if event.is_cancelled {
        return None;
    }
    normalize_event(event)
        .inspect_err(|e| warn!("Skipping event: {:#}", e))
        .ok()
        .filter(|e| e.matches(needle))
}

/// Fetch `first` and follow `@odata.nextLink` until `keep` has accepted
/// `max` items, the links run out, `max_pages` pages were read, or `cancel`
/// fires. Items come back in page order, at most `max` of them.
async fn collect_pages<T, U, F, Fut>(
    first: Url,
    max: usize,
    max_pages: usize,
    cancel: &CancellationToken,
    mut fetch: F,
    mut keep: impl FnMut(T) -> Option<U>,
) -> Result<Vec<U>>
where
    F: FnMut(Url) -> Fut,
    Fut: std::future::Future<Output = Result<ListResponse<T>>>,
{
    let mut items = Vec::new();
    let mut next = Some(first);
    let mut pages = 0;

    while let Some(url) = next.take() {
        if cancel.is_cancelled() || items.len() >= max {
            break;
        }
        if pages == max_pages {
            debug!("Stopping after {} pages with {} matches", pages, items.len());
            break;
        }
        let page = fetch(url).await?;
        pages += 1;
        items.extend(page.value.into_iter().filter_map(&mut keep));
        next = page
            .next_link
            .as_deref()
            .map(Url::parse)
            .transpose()
            .context("Invalid @odata.nextLink")?;
    }

    items.truncate(max);
    Ok(items)
}
