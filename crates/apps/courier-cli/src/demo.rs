//! Sample backends for `--demo`

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use courier::{
    CalendarEvent, Email, EmailAddress, InMemoryLocalClient, InMemoryRemoteClient, ItemId,
    LocalMailClient, RemoteMailClient, SearchOrchestrator,
};

fn email(id: &str, subject: &str, sender: &str, received_at: DateTime<Utc>) -> Email {
    let address = format!("{}@example.com", sender.to_lowercase().replace(' ', "."));
    Email {
        local_id: Some(ItemId::new(id)),
        remote_id: None,
        subject: subject.to_string(),
        from: EmailAddress::with_name(sender, address),
        preview: String::new(),
        received_at,
        is_read: false,
        has_attachments: false,
        web_link: None,
    }
}

fn event(
    id: &str,
    subject: &str,
    start: DateTime<Utc>,
    minutes: i64,
    location: Option<&str>,
    join_url: Option<&str>,
) -> CalendarEvent {
    CalendarEvent {
        local_id: Some(ItemId::new(id)),
        remote_id: None,
        subject: subject.to_string(),
        start,
        end: start + Duration::minutes(minutes),
        is_all_day: false,
        location: location.map(str::to_string),
        organizer: None,
        web_link: None,
        join_url: join_url.map(str::to_string),
    }
}

/// An orchestrator over a connected local client and a signed-in remote
pub fn orchestrator() -> SearchOrchestrator {
    let now = Utc::now();
    let emails = vec![
        email("demo-1", "Q3 budget review", "Jane Doe", now - Duration::minutes(25)),
        email("demo-2", "Re: budget spreadsheet", "Sam Lee", now - Duration::hours(5)),
        email("demo-3", "Team offsite logistics", "Priya Patel", now - Duration::days(3)),
    ];
    let events = vec![
        event(
            "demo-ev-1",
            "Design review",
            now + Duration::minutes(20),
            30,
            Some("Room 4"),
            Some("https://meet.example.com/design"),
        ),
        event("demo-ev-2", "Budget sync", now + Duration::hours(26), 60, None, None),
        event("demo-ev-3", "1:1 with Jane", now + Duration::days(3), 30, None, None),
    ];

    let local = InMemoryLocalClient::new()
        .with_emails(emails.clone())
        .with_events(events.clone());
    let remote = InMemoryRemoteClient::new()
        .authenticated()
        .with_emails(emails)
        .with_events(events);

    SearchOrchestrator::new(
        Some(Arc::new(local) as Arc<dyn LocalMailClient>),
        Some(Arc::new(remote) as Arc<dyn RemoteMailClient>),
    )
}
