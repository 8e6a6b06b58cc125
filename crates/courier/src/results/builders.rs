//! Result category builders
//!
//! Pure mappings from (request text, settings, backend data) to
//! [`ResultItem`]s. Scores are assigned by the caller.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use super::labels::{event_status, relative_recency};
use super::{Category, Operation, ResultItem, ResultKind};
use crate::backends::BackendSelection;
use crate::models::{CalendarEvent, Email};
use crate::settings::QuickAction;

const SIGN_OUT_KEYWORDS: [&str; 2] = ["sign out", "logout"];

fn with_tags(base: &BTreeSet<String>, extra: &[&str]) -> BTreeSet<String> {
    let mut tags = base.clone();
    tags.extend(extra.iter().map(|t| t.to_string()));
    tags
}

/// Quick actions whose name or id contains `text` (case-insensitive), in
/// configured order with strictly decreasing scores from `base_score`.
/// An empty `text` keeps every action.
pub fn build_quick_action_results(
    actions: &[QuickAction],
    text: &str,
    tags: &BTreeSet<String>,
    base_score: f64,
) -> Vec<ResultItem> {
    let needle = text.trim().to_lowercase();
    actions
        .iter()
        .filter(|a| {
            needle.is_empty()
                || a.name.to_lowercase().contains(&needle)
                || a.id.to_lowercase().contains(&needle)
        })
        .enumerate()
        .map(|(i, action)| ResultItem {
            display_name: action.name.clone(),
            subtitle: "Quick action".to_string(),
            category: Category::Action,
            score: base_score - i as f64,
            tags: with_tags(tags, &["action"]),
            operations: vec![Operation::RunQuickAction {
                action_id: action.id.clone(),
                uri: action.uri.clone(),
            }],
            kind: ResultKind::Action {
                action_id: action.id.clone(),
            },
        })
        .collect()
}

/// Whether the sign-out item should be offered for `text`
pub fn matches_sign_out(text: &str) -> bool {
    let needle = text.trim().to_lowercase();
    needle.is_empty() || SIGN_OUT_KEYWORDS.iter().any(|k| k.contains(&needle))
}

pub fn build_sign_out_result(account: Option<&str>, tags: &BTreeSet<String>, score: f64) -> ResultItem {
    ResultItem {
        display_name: "Sign out".to_string(),
        subtitle: match account {
            Some(account) => format!("Signed in as {}", account),
            None => "Sign out of your online mailbox".to_string(),
        },
        category: Category::Action,
        score,
        tags: with_tags(tags, &["action"]),
        operations: vec![Operation::SignOut],
        kind: ResultKind::SignOut,
    }
}

pub fn build_sign_in_result(tags: &BTreeSet<String>, score: f64) -> ResultItem {
    ResultItem {
        display_name: "Sign in to search your mail and calendar".to_string(),
        subtitle: "No mail client is available. Sign in to your online mailbox.".to_string(),
        category: Category::Action,
        score,
        tags: with_tags(tags, &["action"]),
        operations: vec![Operation::SignIn],
        kind: ResultKind::SignIn,
    }
}

/// Operations for an email. Local operations depend only on local
/// usability and the email carrying a local id, not on which backend
/// returned it.
pub fn email_operations(email: &Email, selection: &BackendSelection) -> Vec<Operation> {
    let mut ops = Vec::new();
    if selection.supports_item_operations(email.local_id.as_ref())
        && let Some(id) = &email.local_id
    {
        ops.push(Operation::OpenItem { id: id.clone() });
        ops.push(Operation::Reply { id: id.clone() });
        ops.push(Operation::ReplyAll { id: id.clone() });
        ops.push(Operation::Forward { id: id.clone() });
    }
    if let Some(url) = &email.web_link {
        ops.push(Operation::OpenLink { url: url.clone() });
    }
    ops
}

pub fn build_email_result(
    email: Email,
    operations: Vec<Operation>,
    tags: &BTreeSet<String>,
    score: f64,
    now: DateTime<Utc>,
) -> ResultItem {
    let mut extra = vec!["email"];
    if !email.is_read {
        extra.push("unread");
    }
    if email.has_attachments {
        extra.push("attachment");
    }

    ResultItem {
        display_name: email.subject.clone(),
        subtitle: format!(
            "{} · {}",
            email.from.short_display(),
            relative_recency(email.received_at, now)
        ),
        category: Category::Email,
        score,
        tags: with_tags(tags, &extra),
        operations,
        kind: ResultKind::Email(email),
    }
}

/// Operations for an event: join first when a meeting link exists
pub fn event_operations(event: &CalendarEvent, selection: &BackendSelection) -> Vec<Operation> {
    let mut ops = Vec::new();
    if let Some(url) = &event.join_url {
        ops.push(Operation::JoinMeeting { url: url.clone() });
    }
    if selection.supports_item_operations(event.local_id.as_ref())
        && let Some(id) = &event.local_id
    {
        ops.push(Operation::OpenItem { id: id.clone() });
    }
    if let Some(url) = &event.web_link {
        ops.push(Operation::OpenLink { url: url.clone() });
    }
    ops
}

pub fn build_event_result(
    event: CalendarEvent,
    operations: Vec<Operation>,
    tags: &BTreeSet<String>,
    score: f64,
    now: DateTime<Utc>,
) -> ResultItem {
    let status = event_status(&event, now);
    let subtitle = match event.location.as_deref() {
        Some(location) => format!("{} · {}", status, location),
        None => status,
    };

    ResultItem {
        display_name: event.subject.clone(),
        subtitle,
        category: Category::Event,
        score,
        tags: with_tags(tags, &["event"]),
        operations,
        kind: ResultKind::Event(event),
    }
}
