//! Search settings snapshot
//!
//! A passive record read once per search. Every field has a serde default so
//! a partial `settings.json` only overrides what it names.

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Settings filename in the Courier config directory
pub const SETTINGS_FILE: &str = "settings.json";

const MAX_RESULTS_LIMIT: usize = 100;
const MAX_DAY_RANGE: u32 = 365;

/// Tag values the host uses to route a query to this plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchTags {
    /// Emails, events and quick actions
    pub primary: String,
    pub email: String,
    pub calendar: String,
}

impl Default for SearchTags {
    fn default() -> Self {
        Self {
            primary: "outlook".to_string(),
            email: "email".to_string(),
            calendar: "calendar".to_string(),
        }
    }
}

/// A configured shortcut shown ahead of data results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickAction {
    pub id: String,
    pub name: String,
    /// URI handed to the system launcher when the action runs
    pub uri: String,
}

impl QuickAction {
    pub fn new(id: &str, name: &str, uri: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            uri: uri.to_string(),
        }
    }

    /// Built-in actions, in priority order
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("new-email", "New email", "mailto:"),
            Self::new(
                "new-event",
                "New event",
                "https://outlook.office.com/calendar/deeplink/compose",
            ),
            Self::new("open-inbox", "Open inbox", "https://outlook.office.com/mail/inbox"),
            Self::new("open-calendar", "Open calendar", "https://outlook.office.com/calendar"),
        ]
    }
}

/// Toggles and limits consumed by the search orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub tags: SearchTags,
    pub search_emails: bool,
    pub search_events: bool,
    pub show_quick_actions: bool,
    pub show_upcoming_on_empty: bool,
    pub max_email_results: usize,
    pub max_event_results: usize,
    pub email_days_back: u32,
    pub event_days_back: u32,
    pub event_days_forward: u32,
    /// Look-ahead window for the upcoming-events list on an empty query
    pub upcoming_days_forward: u32,
    /// Emitted in list order
    pub quick_actions: Vec<QuickAction>,
    /// Command line of the local automation host, if one is installed
    pub local_host_command: Option<Vec<String>>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            tags: SearchTags::default(),
            search_emails: true,
            search_events: true,
            show_quick_actions: true,
            show_upcoming_on_empty: true,
            max_email_results: 10,
            max_event_results: 10,
            email_days_back: 30,
            event_days_back: 7,
            event_days_forward: 30,
            upcoming_days_forward: 7,
            quick_actions: QuickAction::defaults(),
            local_host_command: None,
        }
    }
}

impl SearchSettings {
    /// Load `settings.json` from the config directory, or defaults if absent
    pub fn load() -> Result<Self> {
        let settings: Self = config::load_json_or_default(SETTINGS_FILE)?;
        Ok(settings.validated())
    }

    pub fn save(&self) -> Result<()> {
        config::save_json(SETTINGS_FILE, self)
    }

    /// Clamp limits into the supported ranges
    pub fn validated(mut self) -> Self {
        self.max_email_results = self.max_email_results.clamp(1, MAX_RESULTS_LIMIT);
        self.max_event_results = self.max_event_results.clamp(1, MAX_RESULTS_LIMIT);
        self.email_days_back = self.email_days_back.min(MAX_DAY_RANGE);
        self.event_days_back = self.event_days_back.min(MAX_DAY_RANGE);
        self.event_days_forward = self.event_days_forward.min(MAX_DAY_RANGE);
        self.upcoming_days_forward = self.upcoming_days_forward.min(MAX_DAY_RANGE);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings: SearchSettings =
            serde_json::from_str(r#"{ "search_emails": false, "tags": { "email": "mail" } }"#)
                .unwrap();
        assert!(!settings.search_emails);
        assert!(settings.search_events);
        assert_eq!(settings.tags.email, "mail");
        assert_eq!(settings.tags.primary, "outlook");
        assert_eq!(settings.quick_actions.len(), 4);
    }

    #[test]
    fn test_validated_clamps_limits() {
        let settings = SearchSettings {
            max_email_results: 0,
            max_event_results: 5000,
            email_days_back: 10_000,
            ..SearchSettings::default()
        }
        .validated();

        assert_eq!(settings.max_email_results, 1);
        assert_eq!(settings.max_event_results, MAX_RESULTS_LIMIT);
        assert_eq!(settings.email_days_back, MAX_DAY_RANGE);
    }

    #[test]
    fn test_default_quick_actions_order() {
        let ids: Vec<_> = QuickAction::defaults().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, ["new-email", "new-event", "open-inbox", "open-calendar"]);
    }
}
