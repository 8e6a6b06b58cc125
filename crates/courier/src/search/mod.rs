//! Unified search over both backends
//!
//! [`SearchOrchestrator::search`] routes a request by tag, decides which
//! result categories apply, queries the selected backend and streams
//! [`ResultItem`](crate::results::ResultItem)s in category order.

mod orchestrator;
mod stream;

pub use orchestrator::SearchOrchestrator;
pub use stream::SearchStream;

use crate::settings::{SearchSettings, SearchTags};

/// Starting score of each category. Items within a category count down by
/// one in emission order.
pub mod scores {
    pub const QUICK_ACTION: f64 = 1000.0;
    pub const SIGN_IN: f64 = 900.0;
    pub const UPCOMING_EVENT: f64 = 500.0;
    pub const EVENT: f64 = 400.0;
    pub const EMAIL: f64 = 300.0;
    /// Sorts after quick actions and data results
    pub const SIGN_OUT: f64 = 1.0;
}

/// How the host is searching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    /// Regular query typed by the user
    AllSearch,
    /// Process lookups; never handled here
    ProcessSearch,
}

/// One query from the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub text: String,
    pub tag: String,
    pub kind: SearchKind,
}

impl SearchRequest {
    pub fn new(text: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tag: tag.into(),
            kind: SearchKind::AllSearch,
        }
    }

    pub fn with_kind(mut self, kind: SearchKind) -> Self {
        self.kind = kind;
        self
    }

    /// Text with surrounding whitespace removed
    pub fn query(&self) -> &str {
        self.text.trim()
    }
}

/// Which recognized tag a request carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagRoute {
    Primary,
    EmailOnly,
    CalendarOnly,
}

impl TagRoute {
    /// Case-insensitive exact match against the configured tags
    pub fn classify(tag: &str, tags: &SearchTags) -> Option<Self> {
        if tag.eq_ignore_ascii_case(&tags.primary) {
            Some(Self::Primary)
        } else if tag.eq_ignore_ascii_case(&tags.email) {
            Some(Self::EmailOnly)
        } else if tag.eq_ignore_ascii_case(&tags.calendar) {
            Some(Self::CalendarOnly)
        } else {
            None
        }
    }
}

/// Categories that apply to one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eligibility {
    pub emails: bool,
    pub events: bool,
    pub actions: bool,
}

impl Eligibility {
    pub fn new(route: TagRoute, settings: &SearchSettings) -> Self {
        Self {
            emails: matches!(route, TagRoute::Primary | TagRoute::EmailOnly) && settings.search_emails,
            events: matches!(route, TagRoute::Primary | TagRoute::CalendarOnly)
                && settings.search_events,
            actions: route == TagRoute::Primary && settings.show_quick_actions,
        }
    }
}
