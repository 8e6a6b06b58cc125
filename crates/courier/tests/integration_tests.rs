//! Integration tests for the search orchestrator
//!
//! These run full searches against the in-memory backends and check the
//! streamed output and which backend calls were made.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use courier::backends::{LocalCall, RemoteCall};
use courier::{
    ActionHandler, CalendarEvent, Category, Email, EmailAddress, InMemoryLocalClient,
    InMemoryRemoteClient, ItemId, LocalMailClient, Operation, RemoteMailClient, ResultItem,
    ResultKind, SearchKind, SearchOrchestrator, SearchRequest, SearchSettings, SystemLauncher,
};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

/// Emails are at least two days old so their labels are stable
fn make_email(id: &str, subject: &str, days_ago: i64) -> Email {
    Email {
        local_id: Some(ItemId::new(id)),
        remote_id: Some(format!("remote-{}", id)),
        subject: subject.to_string(),
        from: EmailAddress::with_name("Jane Doe", "jane@example.com"),
        preview: format!("Preview for {}", subject),
        received_at: Utc::now() - Duration::days(days_ago),
        is_read: false,
        has_attachments: false,
        web_link: Some(format!("https://mail.example.com/{}", id)),
    }
}

/// Events start at least two days out so their labels are stable
fn make_event(id: &str, subject: &str, days_ahead: i64) -> CalendarEvent {
    let start = Utc::now() + Duration::days(days_ahead);
    CalendarEvent {
        local_id: Some(ItemId::new(id)),
        remote_id: None,
        subject: subject.to_string(),
        start,
        end: start + Duration::hours(1),
        is_all_day: false,
        location: None,
        organizer: None,
        web_link: None,
        join_url: None,
    }
}

fn budget_emails() -> Vec<Email> {
    vec![
        make_email("e1", "Budget draft", 2),
        make_email("e2", "Re: budget draft", 3),
        make_email("e3", "Budget approved", 5),
        make_email("e4", "Lunch on Friday", 2),
    ]
}

fn budget_events() -> Vec<CalendarEvent> {
    vec![
        make_event("ev1", "Budget sync", 2),
        make_event("ev2", "Budget planning", 4),
        make_event("ev3", "Team standup", 3),
    ]
}

fn orchestrator(
    local: Option<&Arc<InMemoryLocalClient>>,
    remote: Option<&Arc<InMemoryRemoteClient>>,
) -> SearchOrchestrator {
    SearchOrchestrator::new(
        local.map(|l| l.clone() as Arc<dyn LocalMailClient>),
        remote.map(|r| r.clone() as Arc<dyn RemoteMailClient>),
    )
}

async fn search(
    orchestrator: &SearchOrchestrator,
    request: SearchRequest,
    settings: &SearchSettings,
) -> Vec<ResultItem> {
    let cancel = CancellationToken::new();
    orchestrator.search(request, settings, &cancel).collect().await
}

fn assert_strictly_decreasing(items: &[ResultItem], category: Category) {
    let scores: Vec<f64> = items
        .iter()
        .filter(|i| i.category == category)
        .map(|i| i.score)
        .collect();
    assert!(
        scores.windows(2).all(|w| w[0] > w[1]),
        "{:?} scores not strictly decreasing: {:?}",
        category,
        scores
    );
}

#[tokio::test]
async fn test_unrecognized_tag_yields_nothing() {
    let local = Arc::new(InMemoryLocalClient::new().with_emails(budget_emails()));
    let remote = Arc::new(InMemoryRemoteClient::new().authenticated());
    let orchestrator = orchestrator(Some(&local), Some(&remote));

    let items = search(
        &orchestrator,
        SearchRequest::new("budget", "files"),
        &SearchSettings::default(),
    )
    .await;

    assert!(items.is_empty());
    assert_eq!(local.connect_attempts(), 0);
    assert!(remote.calls().is_empty());
}

#[tokio::test]
async fn test_process_search_yields_nothing() {
    let local = Arc::new(InMemoryLocalClient::new().with_emails(budget_emails()));
    let orchestrator = orchestrator(Some(&local), None);

    let request = SearchRequest::new("budget", "outlook").with_kind(SearchKind::ProcessSearch);
    let items = search(&orchestrator, request, &SearchSettings::default()).await;

    assert!(items.is_empty());
    assert!(local.calls().is_empty());
}

#[tokio::test]
async fn test_cancelled_token_makes_no_backend_calls() {
    let local = Arc::new(InMemoryLocalClient::new().with_emails(budget_emails()));
    let remote = Arc::new(InMemoryRemoteClient::new().silent_succeeds());
    let orchestrator = orchestrator(Some(&local), Some(&remote));

    let cancel = CancellationToken::new();
    cancel.cancel();
    let items: Vec<ResultItem> = orchestrator
        .search(
            SearchRequest::new("budget", "outlook"),
            &SearchSettings::default(),
            &cancel,
        )
        .collect()
        .await;

    assert!(items.is_empty());
    assert!(local.calls().is_empty());
    assert!(remote.calls().is_empty());
}

#[tokio::test]
async fn test_quick_actions_come_first() {
    let local = Arc::new(
        InMemoryLocalClient::new()
            .with_emails(vec![make_email("e1", "New hire onboarding", 2)])
            .with_events(vec![make_event("ev1", "New starter lunch", 2)]),
    );
    let orchestrator = orchestrator(Some(&local), None);

    let items = search(
        &orchestrator,
        SearchRequest::new("new", "outlook"),
        &SearchSettings::default(),
    )
    .await;

    let kinds: Vec<Category> = items.iter().map(|i| i.category).collect();
    assert_eq!(
        kinds,
        [Category::Action, Category::Action, Category::Email, Category::Event]
    );
    assert_eq!(items[0].display_name, "New email");
    assert_eq!(items[1].display_name, "New event");
}

#[tokio::test]
async fn test_empty_primary_query_lists_upcoming_events_only() {
    let local = Arc::new(
        InMemoryLocalClient::new()
            .with_emails(budget_emails())
            .with_events(budget_events()),
    );
    let orchestrator = orchestrator(Some(&local), None);
    let settings = SearchSettings {
        show_quick_actions: false,
        ..SearchSettings::default()
    };

    let items = search(&orchestrator, SearchRequest::new("", "outlook"), &settings).await;

    assert_eq!(items.len(), 3);
    assert!(items.iter().all(ResultItem::is_event));
    assert_eq!(items[0].score, 500.0);
    assert_strictly_decreasing(&items, Category::Event);
    assert_eq!(
        local.calls(),
        vec![
            LocalCall::Connect,
            LocalCall::SearchEvents {
                text: String::new(),
                max: 10,
                days_back: 0,
                days_forward: 7,
            },
        ]
    );
}

#[tokio::test]
async fn test_empty_query_without_upcoming_makes_no_search() {
    let local = Arc::new(InMemoryLocalClient::new().with_events(budget_events()));
    let orchestrator = orchestrator(Some(&local), None);
    let settings = SearchSettings {
        show_upcoming_on_empty: false,
        ..SearchSettings::default()
    };

    let items = search(&orchestrator, SearchRequest::new("   ", "outlook"), &settings).await;

    assert!(items.iter().all(|i| i.category == Category::Action));
    assert_eq!(local.search_count(), 0);
}

#[tokio::test]
async fn test_no_backend_offers_sign_in_once() {
    let local = Arc::new(InMemoryLocalClient::new().unreachable());
    let remote = Arc::new(InMemoryRemoteClient::new());
    let orchestrator = orchestrator(Some(&local), Some(&remote));

    let items = search(
        &orchestrator,
        SearchRequest::new("budget", "email"),
        &SearchSettings::default(),
    )
    .await;

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].kind, ResultKind::SignIn);
    assert_eq!(items[0].operations, vec![Operation::SignIn]);
    // Silent refresh is attempted before giving up; the prompt is not
    assert_eq!(remote.calls(), vec![RemoteCall::TrySilentAuth]);
}

#[tokio::test]
async fn test_no_backend_on_primary_tag_still_prompts_once() {
    let remote = Arc::new(InMemoryRemoteClient::new());
    let orchestrator = orchestrator(None, Some(&remote));

    let items = search(
        &orchestrator,
        SearchRequest::new("budget", "outlook"),
        &SearchSettings::default(),
    )
    .await;

    let sign_ins = items.iter().filter(|i| i.kind == ResultKind::SignIn).count();
    assert_eq!(sign_ins, 1);
    assert_eq!(items.last().map(|i| &i.kind), Some(&ResultKind::SignIn));
}

#[tokio::test]
async fn test_sticky_failure_suppresses_sign_in() {
    let remote = Arc::new(InMemoryRemoteClient::new().rejecting_sign_in());
    assert!(!remote.try_auth(&CancellationToken::new()).await);
    let orchestrator = orchestrator(None, Some(&remote));

    let items = search(
        &orchestrator,
        SearchRequest::new("budget", "email"),
        &SearchSettings::default(),
    )
    .await;

    assert!(items.is_empty());
    // No silent refresh either once the flag is set
    assert_eq!(remote.calls(), vec![RemoteCall::TryAuth]);
}

#[tokio::test]
async fn test_declined_prompt_still_offers_sign_in() {
    let remote = Arc::new(InMemoryRemoteClient::new().declining_sign_in());
    let orchestrator = orchestrator(None, Some(&remote));
    let settings = SearchSettings::default();
    let cancel = CancellationToken::new();

    let items = search(&orchestrator, SearchRequest::new("budget", "email"), &settings).await;
    assert_eq!(items[0].kind, ResultKind::SignIn);

    let result = ActionHandler::new(orchestrator.clone(), Arc::new(SystemLauncher))
        .invoke(&items[0].operations[0], &cancel)
        .await;
    assert!(result.is_err());
    assert!(!remote.auth_failed());

    let items = search(&orchestrator, SearchRequest::new("budget", "email"), &settings).await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].kind, ResultKind::SignIn);
}

#[tokio::test]
async fn test_broken_prompt_still_offers_sign_in() {
    let remote = Arc::new(InMemoryRemoteClient::new().failing_sign_in());
    let orchestrator = orchestrator(None, Some(&remote));
    let settings = SearchSettings::default();

    ActionHandler::new(orchestrator.clone(), Arc::new(SystemLauncher))
        .invoke(&Operation::SignIn, &CancellationToken::new())
        .await
        .unwrap_err();

    let items = search(&orchestrator, SearchRequest::new("budget", "email"), &settings).await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].kind, ResultKind::SignIn);
}

#[tokio::test]
async fn test_rejected_prompt_empties_next_search() {
    let remote = Arc::new(InMemoryRemoteClient::new().rejecting_sign_in());
    let orchestrator = orchestrator(None, Some(&remote));
    let settings = SearchSettings::default();

    let items = search(&orchestrator, SearchRequest::new("budget", "email"), &settings).await;
    assert_eq!(items[0].kind, ResultKind::SignIn);

    ActionHandler::new(orchestrator.clone(), Arc::new(SystemLauncher))
        .invoke(&items[0].operations[0], &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(remote.auth_failed());

    let items = search(&orchestrator, SearchRequest::new("budget", "email"), &settings).await;
    assert!(items.is_empty());
}

#[tokio::test]
async fn test_accepted_prompt_searches_remote() {
    let remote = Arc::new(
        InMemoryRemoteClient::new()
            .interactive_succeeds()
            .with_emails(budget_emails()),
    );
    let orchestrator = orchestrator(None, Some(&remote));
    let settings = SearchSettings::default();

    ActionHandler::new(orchestrator.clone(), Arc::new(SystemLauncher))
        .invoke(&Operation::SignIn, &CancellationToken::new())
        .await
        .unwrap();

    let items = search(&orchestrator, SearchRequest::new("budget", "email"), &settings).await;
    assert_eq!(items.len(), 3);
    assert!(items.iter().all(ResultItem::is_email));
}

#[tokio::test]
async fn test_empty_query_without_backend_never_prompts() {
    let remote = Arc::new(InMemoryRemoteClient::new());
    let orchestrator = orchestrator(None, Some(&remote));

    let items = search(
        &orchestrator,
        SearchRequest::new("", "calendar"),
        &SearchSettings::default(),
    )
    .await;

    assert!(items.is_empty());
}

#[tokio::test]
async fn test_upcoming_events_require_a_usable_backend() {
    let local = Arc::new(
        InMemoryLocalClient::new()
            .unreachable()
            .with_events(budget_events()),
    );
    let remote = Arc::new(InMemoryRemoteClient::new().with_events(budget_events()));
    let orchestrator = orchestrator(Some(&local), Some(&remote));

    let items = search(
        &orchestrator,
        SearchRequest::new("", "outlook"),
        &SearchSettings::default(),
    )
    .await;

    // Quick actions only: no events, no sign-in on an empty query
    assert_eq!(items.len(), 4);
    assert!(items.iter().all(|i| matches!(i.kind, ResultKind::Action { .. })));
    assert_eq!(local.search_count(), 0);
    assert_eq!(remote.search_count(), 0);
}

#[tokio::test]
async fn test_silent_refresh_enables_remote() {
    let remote = Arc::new(
        InMemoryRemoteClient::new()
            .silent_succeeds()
            .with_emails(budget_emails()),
    );
    let orchestrator = orchestrator(None, Some(&remote));

    let items = search(
        &orchestrator,
        SearchRequest::new("budget", "email"),
        &SearchSettings::default(),
    )
    .await;

    assert_eq!(items.len(), 3);
    assert!(items.iter().all(ResultItem::is_email));
    assert_eq!(
        remote.calls(),
        vec![
            RemoteCall::TrySilentAuth,
            RemoteCall::SearchEmails {
                text: "budget".to_string(),
                max: 10,
                days_back: 30,
            },
        ]
    );
}

#[tokio::test]
async fn test_local_preferred_and_scores_decrease() {
    let local = Arc::new(
        InMemoryLocalClient::new()
            .with_emails(budget_emails())
            .with_events(budget_events()),
    );
    let remote = Arc::new(
        InMemoryRemoteClient::new()
            .authenticated()
            .with_emails(budget_emails()),
    );
    let orchestrator = orchestrator(Some(&local), Some(&remote));

    let items = search(
        &orchestrator,
        SearchRequest::new("budget", "outlook"),
        &SearchSettings::default(),
    )
    .await;

    let emails: Vec<&ResultItem> = items.iter().filter(|i| i.is_email()).collect();
    let events: Vec<&ResultItem> = items.iter().filter(|i| i.is_event()).collect();
    assert_eq!(emails.len(), 3);
    assert_eq!(events.len(), 2);
    assert_eq!(emails[0].score, 300.0);
    assert_eq!(events[0].score, 400.0);
    assert_strictly_decreasing(&items, Category::Email);
    assert_strictly_decreasing(&items, Category::Event);

    // Emails before events
    let first_event = items.iter().position(ResultItem::is_event);
    let last_email = items.iter().rposition(ResultItem::is_email);
    assert!(last_email < first_event);

    // Local answered; remote was never searched
    assert_eq!(local.search_count(), 2);
    assert_eq!(remote.search_count(), 0);

    // Local item operations are offered
    let names: Vec<&str> = emails[0].operations.iter().map(Operation::name).collect();
    assert_eq!(names, ["open", "reply", "reply-all", "forward", "open-link"]);
}

#[tokio::test]
async fn test_remote_results_keep_link_only_operations() {
    let remote = Arc::new(
        InMemoryRemoteClient::new()
            .authenticated()
            .with_emails(budget_emails()),
    );
    let orchestrator = orchestrator(None, Some(&remote));

    let items = search(
        &orchestrator,
        SearchRequest::new("budget", "email"),
        &SearchSettings::default(),
    )
    .await;

    assert!(!items.is_empty());
    for item in &items {
        let names: Vec<&str> = item.operations.iter().map(Operation::name).collect();
        assert_eq!(names, ["open-link"]);
    }
}

#[tokio::test]
async fn test_repeated_searches_are_identical() {
    let local = Arc::new(
        InMemoryLocalClient::new()
            .with_emails(budget_emails())
            .with_events(budget_events()),
    );
    let orchestrator = orchestrator(Some(&local), None);
    let settings = SearchSettings::default();

    let first = search(&orchestrator, SearchRequest::new("budget", "outlook"), &settings).await;
    let second = search(&orchestrator, SearchRequest::new("budget", "outlook"), &settings).await;

    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_signed_in_empty_query_lists_actions_sign_out_and_upcoming() {
    let remote = Arc::new(InMemoryRemoteClient::new().authenticated().with_events(vec![
        make_event("ev1", "Design review", 2),
        make_event("ev2", "Quarterly planning", 3),
    ]));
    let orchestrator = orchestrator(None, Some(&remote));
    let settings = SearchSettings::default();

    let items = search(&orchestrator, SearchRequest::new("", "outlook"), &settings).await;

    let actions = settings.quick_actions.len();
    assert_eq!(items.len(), actions + 3);
    assert!(items[..actions]
        .iter()
        .all(|i| matches!(i.kind, ResultKind::Action { .. })));
    assert_eq!(items[actions].kind, ResultKind::SignOut);
    assert_eq!(items[actions].subtitle, "Signed in as demo@example.com");
    assert!(items[actions + 1..].iter().all(ResultItem::is_event));
    assert!(items[actions + 1].score > items[actions + 2].score);
    assert!(!items.iter().any(ResultItem::is_email));
    assert_strictly_decreasing(&items[..actions], Category::Action);
}

#[tokio::test]
async fn test_email_tag_with_no_backend_yields_single_sign_in() {
    let orchestrator = orchestrator(None, Some(&Arc::new(InMemoryRemoteClient::new())));

    let items = search(
        &orchestrator,
        SearchRequest::new("budget", "email"),
        &SearchSettings::default(),
    )
    .await;

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].kind, ResultKind::SignIn);
}

#[tokio::test]
async fn test_backend_failure_yields_zero_results() {
    let local = Arc::new(InMemoryLocalClient::new().failing());
    let orchestrator = orchestrator(Some(&local), None);

    let items = search(
        &orchestrator,
        SearchRequest::new("budget", "outlook"),
        &SearchSettings::default(),
    )
    .await;

    // Both searches were attempted, neither surfaced an error
    assert!(items.iter().all(|i| i.category == Category::Action));
    assert_eq!(local.search_count(), 2);
}

#[tokio::test]
async fn test_stopping_early_cancels_remaining_work() {
    let local = Arc::new(
        InMemoryLocalClient::new()
            .with_emails(budget_emails())
            .with_events(budget_events()),
    );
    let orchestrator = orchestrator(Some(&local), None);

    let cancel = CancellationToken::new();
    let mut stream = orchestrator.search(
        SearchRequest::new("", "outlook"),
        &SearchSettings::default(),
        &cancel,
    );
    assert!(stream.next().await.is_some());
    drop(stream);

    tokio::time::sleep(StdDuration::from_millis(50)).await;
    assert_eq!(local.connect_attempts(), 0);
    assert_eq!(local.search_count(), 0);
    assert!(!cancel.is_cancelled());
}

#[tokio::test]
async fn test_cancelling_mid_stream_ends_output() {
    let local = Arc::new(InMemoryLocalClient::new().with_emails(budget_emails()));
    let orchestrator = orchestrator(Some(&local), None);

    let cancel = CancellationToken::new();
    let mut stream = orchestrator.search(
        SearchRequest::new("", "outlook"),
        &SearchSettings::default(),
        &cancel,
    );
    assert!(stream.next().await.is_some());
    cancel.cancel();
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_sign_out_then_search_offers_sign_in() {
    let remote = Arc::new(InMemoryRemoteClient::new().authenticated());
    let orchestrator = orchestrator(None, Some(&remote));
    let settings = SearchSettings::default();
    let cancel = CancellationToken::new();

    let items = search(&orchestrator, SearchRequest::new("sign", "outlook"), &settings).await;
    let sign_out = items
        .iter()
        .find(|i| i.kind == ResultKind::SignOut)
        .expect("sign-out offered while signed in");

    ActionHandler::new(orchestrator.clone(), Arc::new(SystemLauncher))
        .invoke(&sign_out.operations[0], &cancel)
        .await
        .unwrap();

    let items = search(&orchestrator, SearchRequest::new("budget", "email"), &settings).await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].kind, ResultKind::SignIn);
}
