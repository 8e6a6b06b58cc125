//! Time-relative display labels
//!
//! Pure functions of the item time and `now`, so they can be tested without
//! touching the wall clock.

use chrono::{DateTime, Datelike, Utc};

use crate::models::CalendarEvent;

/// "Just now", "5m ago", "3h ago", "Mon, May 2" or "May 2, 2024"
pub fn relative_recency(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now - at;
    let minutes = elapsed.num_minutes();

    if minutes < 1 {
        // Includes timestamps slightly in the future (clock skew)
        return "Just now".to_string();
    }
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }
    let hours = elapsed.num_hours();
    if hours < 24 {
        return format!("{}h ago", hours);
    }
    if at.year() == now.year() {
        at.format("%a, %b %-d").to_string()
    } else {
        at.format("%b %-d, %Y").to_string()
    }
}

/// "Happening now", "In 5 minutes", "In 3 hours", "All day", "Ended" or
/// "Mon, May 2 at 14:00"
pub fn event_status(event: &CalendarEvent, now: DateTime<Utc>) -> String {
    if event.is_in_progress(now) {
        return if event.is_all_day {
            "All day".to_string()
        } else {
            "Happening now".to_string()
        };
    }
    if event.end <= now {
        return "Ended".to_string();
    }

    let seconds = (event.start - now).num_seconds();
    let minutes = ((seconds + 59) / 60).max(1);
    if minutes < 60 {
        return format!("In {} minute{}", minutes, plural(minutes));
    }
    // 59m01s and later counts as the first hour
    let hours = (seconds / 3600).max(1);
    if hours < 24 {
        return format!("In {} hour{}", hours, plural(hours));
    }
    if event.is_all_day {
        event.start.format("%a, %b %-d").to_string()
    } else {
        event.start.format("%a, %b %-d at %H:%M").to_string()
    }
}

fn plural(n: i64) -> &'static str {
    if n == 1 { "" } else { "s" }
}
