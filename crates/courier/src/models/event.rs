//! Calendar event produced by either backend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ItemId;

/// A calendar event as returned by a backend search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    #[serde(default)]
    pub local_id: Option<ItemId>,
    #[serde(default)]
    pub remote_id: Option<String>,
    pub subject: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub is_all_day: bool,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub organizer: Option<String>,
    #[serde(default)]
    pub web_link: Option<String>,
    /// Online meeting join URL, when the event has one
    #[serde(default)]
    pub join_url: Option<String>,
}

impl CalendarEvent {
    /// Whether `now` falls inside the event
    pub fn is_in_progress(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now < self.end
    }

    /// Case-insensitive substring match over the searchable fields.
    /// `needle` must already be lowercased.
    pub fn matches(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        [Some(&self.subject), self.location.as_ref(), self.organizer.as_ref()]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(needle))
    }
}
