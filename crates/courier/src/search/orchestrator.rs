//! Search orchestration
//!
//! One search runs as a spawned task feeding a bounded channel. The task
//! checks for cancellation before every backend call and every yielded
//! item, so a cancelled or dropped [`SearchStream`] stops producing
//! promptly and never issues further backend calls.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::stream::{Emitter, SearchStream};
use super::{Eligibility, SearchKind, SearchRequest, TagRoute, scores};
use crate::backends::{
    AvailabilityProbe, Backend, BackendAvailability, BackendSelection, BackendSelector,
    LocalMailClient, RemoteMailClient,
};
use crate::models::{CalendarEvent, Email};
use crate::results::{
    build_email_result, build_event_result, build_quick_action_results, build_sign_in_result,
    build_sign_out_result, email_operations, event_operations, matches_sign_out,
};
use crate::settings::SearchSettings;

/// Items produced ahead of the consumer
const STREAM_BUFFER: usize = 1;

/// Query window for a calendar search
#[derive(Debug, Clone, Copy)]
struct EventWindow {
    max: usize,
    days_back: u32,
    days_forward: u32,
}

/// Entry point for searches over the local and remote backends.
///
/// Cheap to clone; clones share the backends and the availability probe.
#[derive(Clone)]
pub struct SearchOrchestrator {
    local: Option<Arc<dyn LocalMailClient>>,
    remote: Option<Arc<dyn RemoteMailClient>>,
    probe: Arc<AvailabilityProbe>,
}

impl SearchOrchestrator {
    pub fn new(
        local: Option<Arc<dyn LocalMailClient>>,
        remote: Option<Arc<dyn RemoteMailClient>>,
    ) -> Self {
        let probe = Arc::new(AvailabilityProbe::new(local.clone()));
        Self {
            local,
            remote,
            probe,
        }
    }

    pub fn local(&self) -> Option<&Arc<dyn LocalMailClient>> {
        self.local.as_ref()
    }

    pub fn remote(&self) -> Option<&Arc<dyn RemoteMailClient>> {
        self.remote.as_ref()
    }

    /// Local availability, probing on first use
    pub fn availability(&self) -> BackendAvailability {
        self.probe.probe()
    }

    /// Usable backends for one request.
    ///
    /// An unauthenticated remote gets one silent refresh first, unless it
    /// is uninitialized or carries the sticky failure flag.
    pub async fn selection(&self, cancel: &CancellationToken) -> BackendSelection {
        let availability = self.availability();
        let remote_authenticated = match &self.remote {
            Some(remote) if remote.is_authenticated() => true,
            Some(remote) if remote.is_initialized() && !remote.auth_failed() => {
                !cancel.is_cancelled()
                    && remote.try_silent_auth(cancel).await
                    && remote.is_authenticated()
            }
            _ => false,
        };
        BackendSelector::select(availability, remote_authenticated)
    }

    /// Start a search. Results arrive on the returned stream in category
    /// order; dropping the stream cancels the search.
    pub fn search(
        &self,
        request: SearchRequest,
        settings: &SearchSettings,
        cancel: &CancellationToken,
    ) -> SearchStream {
        if cancel.is_cancelled() || request.kind == SearchKind::ProcessSearch {
            return SearchStream::empty();
        }
        let Some(route) = TagRoute::classify(&request.tag, &settings.tags) else {
            debug!("Ignoring search with unrecognized tag {:?}", request.tag);
            return SearchStream::empty();
        };

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let token = cancel.child_token();
        let stream = SearchStream::new(rx, token.clone());
        let this = self.clone();
        let settings = settings.clone();

        tokio::spawn(async move {
            let out = Emitter::new(tx, token);
            this.run(&request, route, &settings, &out).await;
            if out.cancel_token().is_cancelled() {
                debug!("Search for {:?} cancelled", request.query());
            }
        });

        stream
    }

    async fn run(
        &self,
        request: &SearchRequest,
        route: TagRoute,
        settings: &SearchSettings,
        out: &Emitter,
    ) {
        let text = request.query();
        let wants = Eligibility::new(route, settings);
        let tags = BTreeSet::from([request.tag.to_lowercase()]);
        let now = Utc::now();
        debug!("Searching {:?} via {:?}: {:?}", text, route, wants);

        if wants.actions && !self.emit_actions(text, settings, &tags, out).await {
            return;
        }

        if !out.is_live() {
            return;
        }
        let selection = self.selection(out.cancel_token()).await;
        if !out.is_live() {
            return;
        }

        if !selection.any() {
            let can_sign_in = self.remote.as_ref().is_some_and(|r| !r.auth_failed());
            if !text.is_empty() && can_sign_in {
                info!("No backend available, offering sign-in");
                out.emit(build_sign_in_result(&tags, scores::SIGN_IN)).await;
            }
            return;
        }

        if text.is_empty() {
            if wants.events && settings.show_upcoming_on_empty {
                let window = EventWindow {
                    max: settings.max_event_results,
                    days_back: 0,
                    days_forward: settings.upcoming_days_forward,
                };
                let events = self.fetch_events(&selection, "", window, out).await;
                self.emit_events(events, &selection, &tags, scores::UPCOMING_EVENT, now, out)
                    .await;
            }
            return;
        }

        if wants.emails {
            let emails = self
                .fetch_emails(
                    &selection,
                    text,
                    settings.max_email_results,
                    settings.email_days_back,
                    out,
                )
                .await;
            if !self.emit_emails(emails, &selection, &tags, now, out).await {
                return;
            }
        }

        if wants.events {
            let window = EventWindow {
                max: settings.max_event_results,
                days_back: settings.event_days_back,
                days_forward: settings.event_days_forward,
            };
            let events = self.fetch_events(&selection, text, window, out).await;
            self.emit_events(events, &selection, &tags, scores::EVENT, now, out)
                .await;
        }
    }

    /// Quick actions, then the sign-out item when signed in
    async fn emit_actions(
        &self,
        text: &str,
        settings: &SearchSettings,
        tags: &BTreeSet<String>,
        out: &Emitter,
    ) -> bool {
        for item in
            build_quick_action_results(&settings.quick_actions, text, tags, scores::QUICK_ACTION)
        {
            if !out.emit(item).await {
                return false;
            }
        }

        match &self.remote {
            Some(remote) if remote.is_authenticated() && matches_sign_out(text) => {
                let account = remote.account();
                out.emit(build_sign_out_result(
                    account.as_deref(),
                    tags,
                    scores::SIGN_OUT,
                ))
                .await
            }
            _ => true,
        }
    }

    async fn fetch_emails(
        &self,
        selection: &BackendSelection,
        text: &str,
        max: usize,
        days_back: u32,
        out: &Emitter,
    ) -> Vec<Email> {
        if !out.is_live() {
            return Vec::new();
        }
        let result = match (selection.for_query(), &self.local, &self.remote) {
            (Some(Backend::Local), Some(local), _) => local.search_emails(text, max, days_back),
            (Some(Backend::Remote), _, Some(remote)) => {
                remote
                    .search_emails(text, max, days_back, out.cancel_token())
                    .await
            }
            _ => return Vec::new(),
        };
        result.unwrap_or_else(|e| {
            warn!("Email search failed: {:#}", e);
            Vec::new()
        })
    }

    async fn fetch_events(
        &self,
        selection: &BackendSelection,
        text: &str,
        window: EventWindow,
        out: &Emitter,
    ) -> Vec<CalendarEvent> {
        if !out.is_live() {
            return Vec::new();
        }
        let EventWindow {
            max,
            days_back,
            days_forward,
        } = window;
        let result = match (selection.for_query(), &self.local, &self.remote) {
            (Some(Backend::Local), Some(local), _) => {
                local.search_events(text, max, days_back, days_forward)
            }
            (Some(Backend::Remote), _, Some(remote)) => {
                remote
                    .search_events(text, max, days_back, days_forward, out.cancel_token())
                    .await
            }
            _ => return Vec::new(),
        };
        result.unwrap_or_else(|e| {
            warn!("Calendar search failed: {:#}", e);
            Vec::new()
        })
    }

    async fn emit_emails(
        &self,
        emails: Vec<Email>,
        selection: &BackendSelection,
        tags: &BTreeSet<String>,
        now: DateTime<Utc>,
        out: &Emitter,
    ) -> bool {
        for (i, email) in emails.into_iter().enumerate() {
            let operations = email_operations(&email, selection);
            let score = scores::EMAIL - i as f64;
            if !out
                .emit(build_email_result(email, operations, tags, score, now))
                .await
            {
                return false;
            }
        }
        true
    }

    async fn emit_events(
        &self,
        events: Vec<CalendarEvent>,
        selection: &BackendSelection,
        tags: &BTreeSet<String>,
        base_score: f64,
        now: DateTime<Utc>,
        out: &Emitter,
    ) -> bool {
        for (i, event) in events.into_iter().enumerate() {
            let operations = event_operations(&event, selection);
            let score = base_score - i as f64;
            if !out
                .emit(build_event_result(event, operations, tags, score, now))
                .await
            {
                return false;
            }
        }
        true
    }
}
