//! Graph response normalization
//!
//! Converts Graph API payloads into the backend-neutral domain models.
//! Items from the remote backend never carry a local identifier.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};

use super::api::{DateTimeTimeZone, GraphEvent, GraphMessage, Recipient};
use crate::models::{CalendarEvent, Email, EmailAddress};

const NO_SUBJECT: &str = "(no subject)";

/// Normalize a Graph message into an [`Email`]
pub fn normalize_message(msg: GraphMessage) -> Result<Email> {
    let received_at = match msg.received_date_time.as_deref() {
        Some(raw) => parse_timestamp(raw)
            .with_context(|| format!("Invalid receivedDateTime on message {}", msg.id))?,
        None => anyhow::bail!("Message {} has no receivedDateTime", msg.id),
    };

    Ok(Email {
        local_id: None,
        remote_id: Some(msg.id),
        subject: non_empty(msg.subject).unwrap_or_else(|| NO_SUBJECT.to_string()),
        from: msg
            .from
            .map(to_address)
            .unwrap_or_else(|| EmailAddress::new("unknown")),
        preview: msg.body_preview.unwrap_or_default().trim().to_string(),
        received_at,
        is_read: msg.is_read,
        has_attachments: msg.has_attachments,
        web_link: msg.web_link,
    })
}

/// Normalize a Graph event into a [`CalendarEvent`]
pub fn normalize_event(event: GraphEvent) -> Result<CalendarEvent> {
    let start = parse_zoned(&event.start)
        .with_context(|| format!("Invalid start on event {}", event.id))?;
    let end =
        parse_zoned(&event.end).with_context(|| format!("Invalid end on event {}", event.id))?;

    Ok(CalendarEvent {
        local_id: None,
        remote_id: Some(event.id),
        subject: non_empty(event.subject).unwrap_or_else(|| NO_SUBJECT.to_string()),
        start,
        end,
        is_all_day: event.is_all_day,
        location: event.location.and_then(|l| non_empty(l.display_name)),
        organizer: event
            .organizer
            .map(|o| to_address(o).short_display().to_string()),
        web_link: event.web_link,
        join_url: event.online_meeting.and_then(|m| m.join_url),
    })
}

fn to_address(recipient: Recipient) -> EmailAddress {
    let address = recipient.email_address;
    EmailAddress {
        name: non_empty(address.name),
        email: address.address.unwrap_or_default(),
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// RFC 3339 timestamp, e.g. `2024-05-02T14:00:00Z`
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

/// Graph event time. We request UTC via the `Prefer` header, so the zone is
/// expected to be UTC; anything else is rejected rather than guessed.
fn parse_zoned(value: &DateTimeTimeZone) -> Result<DateTime<Utc>> {
    if let Some(zone) = value.time_zone.as_deref()
        && !zone.eq_ignore_ascii_case("UTC")
    {
        anyhow::bail!("unexpected time zone {}", zone);
    }
    let naive = NaiveDateTime::parse_from_str(&value.date_time, "%Y-%m-%dT%H:%M:%S%.f")?;
    Ok(naive.and_utc())
}
