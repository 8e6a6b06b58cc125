//! In-memory backends
//!
//! Scriptable implementations of both backend traits. They record every
//! call so tests can assert which backend was asked for what, and they back
//! the CLI's demo mode.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio_util::sync::CancellationToken;

use super::{LocalMailClient, RemoteMailClient};
use crate::auth::{
    AccessToken, AuthState, AuthStateMachine, CredentialProvider, InteractiveOutcome,
    SilentOutcome,
};
use crate::models::{CalendarEvent, Email, ItemId};

/// A call made against [`InMemoryLocalClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalCall {
    Connect,
    SearchEmails { text: String, max: usize, days_back: u32 },
    SearchEvents { text: String, max: usize, days_back: u32, days_forward: u32 },
    Open(ItemId),
    Reply(ItemId),
    ReplyAll(ItemId),
    Forward(ItemId),
}

/// A call made against [`InMemoryRemoteClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Initialize(String),
    TrySilentAuth,
    TryAuth,
    SignOut,
    SearchEmails { text: String, max: usize, days_back: u32 },
    SearchEvents { text: String, max: usize, days_back: u32, days_forward: u32 },
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn filter_emails(emails: &[Email], text: &str, max: usize, days_back: u32) -> Vec<Email> {
    let needle = text.trim().to_lowercase();
    let cutoff = Utc::now() - Duration::days(days_back as i64);
    let mut matched: Vec<Email> = emails
        .iter()
        .filter(|e| e.received_at >= cutoff)
        .filter(|e| {
            needle.is_empty()
                || e.subject.to_lowercase().contains(&needle)
                || e.preview.to_lowercase().contains(&needle)
                || e.from.email.to_lowercase().contains(&needle)
                || e
                    .from
                    .name
                    .as_deref()
                    .is_some_and(|n| n.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect();
    matched.sort_by(|a, b| b.received_at.cmp(&a.received_at));
    matched.truncate(max);
    matched
}

fn filter_events(
    events: &[CalendarEvent],
    text: &str,
    max: usize,
    days_back: u32,
    days_forward: u32,
) -> Vec<CalendarEvent> {
    let needle = text.trim().to_lowercase();
    let now = Utc::now();
    let window_start = now - Duration::days(days_back as i64);
    let window_end = now + Duration::days(days_forward as i64);
    let mut matched: Vec<CalendarEvent> = events
        .iter()
        .filter(|e| e.end > window_start && e.start < window_end)
        .filter(|e| e.matches(&needle))
        .cloned()
        .collect();
    matched.sort_by(|a, b| a.start.cmp(&b.start));
    matched.truncate(max);
    matched
}

/// Scriptable local backend
pub struct InMemoryLocalClient {
    reachable: AtomicBool,
    connected: AtomicBool,
    failing: AtomicBool,
    mutations_succeed: AtomicBool,
    connect_attempts: AtomicUsize,
    emails: Mutex<Vec<Email>>,
    events: Mutex<Vec<CalendarEvent>>,
    calls: Mutex<Vec<LocalCall>>,
}

impl Default for InMemoryLocalClient {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLocalClient {
    /// A reachable client with no data
    pub fn new() -> Self {
        Self {
            reachable: AtomicBool::new(true),
            connected: AtomicBool::new(false),
            failing: AtomicBool::new(false),
            mutations_succeed: AtomicBool::new(true),
            connect_attempts: AtomicUsize::new(0),
            emails: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Connection attempts will fail
    pub fn unreachable(self) -> Self {
        self.reachable.store(false, Ordering::SeqCst);
        self
    }

    /// Searches return an error
    pub fn failing(self) -> Self {
        self.failing.store(true, Ordering::SeqCst);
        self
    }

    /// Reply/forward report that the host refused
    pub fn refusing_mutations(self) -> Self {
        self.mutations_succeed.store(false, Ordering::SeqCst);
        self
    }

    pub fn with_emails(self, emails: Vec<Email>) -> Self {
        *lock(&self.emails) = emails;
        self
    }

    pub fn with_events(self, events: Vec<CalendarEvent>) -> Self {
        *lock(&self.events) = events;
        self
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<LocalCall> {
        lock(&self.calls).clone()
    }

    /// Number of search calls (emails or events)
    pub fn search_count(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| matches!(c, LocalCall::SearchEmails { .. } | LocalCall::SearchEvents { .. }))
            .count()
    }

    fn record(&self, call: LocalCall) {
        lock(&self.calls).push(call);
    }

    fn mutation(&self, call: LocalCall) -> Result<bool> {
        self.record(call);
        if !self.is_connected() {
            bail!("local client is not connected");
        }
        Ok(self.mutations_succeed.load(Ordering::SeqCst))
    }
}

impl LocalMailClient for InMemoryLocalClient {
    fn try_connect(&self) -> bool {
        self.connect_attempts.fetch_add(1, Ordering::SeqCst);
        self.record(LocalCall::Connect);
        let reachable = self.reachable.load(Ordering::SeqCst);
        self.connected.store(reachable, Ordering::SeqCst);
        reachable
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn search_emails(&self, text: &str, max: usize, days_back: u32) -> Result<Vec<Email>> {
        self.record(LocalCall::SearchEmails {
            text: text.to_string(),
            max,
            days_back,
        });
        if self.failing.load(Ordering::SeqCst) {
            bail!("automation call failed");
        }
        Ok(filter_emails(&lock(&self.emails), text, max, days_back))
    }

    fn search_events(
        &self,
        text: &str,
        max: usize,
        days_back: u32,
        days_forward: u32,
    ) -> Result<Vec<CalendarEvent>> {
        self.record(LocalCall::SearchEvents {
            text: text.to_string(),
            max,
            days_back,
            days_forward,
        });
        if self.failing.load(Ordering::SeqCst) {
            bail!("automation call failed");
        }
        Ok(filter_events(&lock(&self.events), text, max, days_back, days_forward))
    }

    fn open_item(&self, id: &ItemId) -> Result<()> {
        self.mutation(LocalCall::Open(id.clone())).map(|_| ())
    }

    fn reply(&self, id: &ItemId) -> Result<bool> {
        self.mutation(LocalCall::Reply(id.clone()))
    }

    fn reply_all(&self, id: &ItemId) -> Result<bool> {
        self.mutation(LocalCall::ReplyAll(id.clone()))
    }

    fn forward(&self, id: &ItemId) -> Result<bool> {
        self.mutation(LocalCall::Forward(id.clone()))
    }
}

/// How the scripted sign-in prompt ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptScript {
    Accept,
    Decline,
    Reject,
    Fail,
}

/// Credential provider behind [`InMemoryRemoteClient`].
///
/// A successful prompt caches the account, so later silent refreshes
/// succeed until [`clear`](CredentialProvider::clear) forgets it.
struct ScriptedCredentials {
    silent_succeeds: AtomicBool,
    remembered: AtomicBool,
    prompt: Mutex<PromptScript>,
}

impl ScriptedCredentials {
    const ACCOUNT: &'static str = "demo@example.com";

    fn new() -> Self {
        Self {
            silent_succeeds: AtomicBool::new(false),
            remembered: AtomicBool::new(false),
            prompt: Mutex::new(PromptScript::Decline),
        }
    }

    fn token() -> AccessToken {
        AccessToken {
            secret: "demo-token".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
            account: Some(Self::ACCOUNT.to_string()),
        }
    }

    fn script_prompt(&self, script: PromptScript) {
        *lock(&self.prompt) = script;
    }
}

#[async_trait]
impl CredentialProvider for ScriptedCredentials {
    async fn acquire_silent(&self) -> SilentOutcome {
        if self.silent_succeeds.load(Ordering::SeqCst) || self.remembered.load(Ordering::SeqCst) {
            SilentOutcome::Acquired(Self::token())
        } else {
            SilentOutcome::InteractionRequired
        }
    }

    async fn acquire_interactive(&self, cancel: &CancellationToken) -> InteractiveOutcome {
        if cancel.is_cancelled() {
            return InteractiveOutcome::Cancelled;
        }
        let script = *lock(&self.prompt);
        match script {
            PromptScript::Accept => {
                self.remembered.store(true, Ordering::SeqCst);
                InteractiveOutcome::Acquired(Self::token())
            }
            PromptScript::Decline => InteractiveOutcome::Cancelled,
            PromptScript::Reject => {
                InteractiveOutcome::Rejected(anyhow!("AADSTS700016: application not found"))
            }
            PromptScript::Fail => InteractiveOutcome::Failed(anyhow!("connection reset")),
        }
    }

    async fn clear(&self) -> Result<()> {
        self.remembered.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Scriptable remote backend.
///
/// Auth runs through a real [`AuthStateMachine`] over scripted credentials.
/// The prompt is declined unless a builder says otherwise.
pub struct InMemoryRemoteClient {
    auth: AuthStateMachine,
    credentials: Arc<ScriptedCredentials>,
    failing: AtomicBool,
    emails: Mutex<Vec<Email>>,
    events: Mutex<Vec<CalendarEvent>>,
    calls: Mutex<Vec<RemoteCall>>,
}

impl Default for InMemoryRemoteClient {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRemoteClient {
    /// Initialized, signed out, no data
    pub fn new() -> Self {
        let credentials = Arc::new(ScriptedCredentials::new());
        Self {
            auth: AuthStateMachine::with_provider(credentials.clone()),
            credentials,
            failing: AtomicBool::new(false),
            emails: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// No credential provider until [`initialize`](RemoteMailClient::initialize)
    pub fn uninitialized(self) -> Self {
        Self {
            auth: AuthStateMachine::new(),
            ..self
        }
    }

    /// Signed in with a cached account
    pub fn authenticated(self) -> Self {
        self.credentials.remembered.store(true, Ordering::SeqCst);
        self.auth.adopt(ScriptedCredentials::token());
        self
    }

    pub fn silent_succeeds(self) -> Self {
        self.credentials.silent_succeeds.store(true, Ordering::SeqCst);
        self
    }

    pub fn interactive_succeeds(self) -> Self {
        self.credentials.script_prompt(PromptScript::Accept);
        self
    }

    /// The user dismisses the prompt
    pub fn declining_sign_in(self) -> Self {
        self.credentials.script_prompt(PromptScript::Decline);
        self
    }

    /// The service refuses the prompt, which sets the sticky failure flag
    pub fn rejecting_sign_in(self) -> Self {
        self.credentials.script_prompt(PromptScript::Reject);
        self
    }

    /// The prompt breaks before the service answers
    pub fn failing_sign_in(self) -> Self {
        self.credentials.script_prompt(PromptScript::Fail);
        self
    }

    /// Every search call errors
    pub fn failing(self) -> Self {
        self.failing.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_emails(self, emails: Vec<Email>) -> Self {
        *lock(&self.emails) = emails;
        self
    }

    pub fn with_events(self, events: Vec<CalendarEvent>) -> Self {
        *lock(&self.events) = events;
        self
    }

    pub fn auth_state(&self) -> AuthState {
        self.auth.state()
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        lock(&self.calls).clone()
    }

    pub fn search_count(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| matches!(c, RemoteCall::SearchEmails { .. } | RemoteCall::SearchEvents { .. }))
            .count()
    }

    fn record(&self, call: RemoteCall) {
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl RemoteMailClient for InMemoryRemoteClient {
    async fn initialize(&self, client_id: &str) -> Result<()> {
        self.record(RemoteCall::Initialize(client_id.to_string()));
        self.auth.initialize(self.credentials.clone());
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
        self.record(RemoteCall::TrySilentAuth);
        self.auth.try_silent_auth(cancel).await
    }

    async fn try_auth(&self, cancel: &CancellationToken) -> bool {
        self.record(RemoteCall::TryAuth);
        self.auth.try_auth(cancel).await
    }

    async fn sign_out(&self) -> Result<()> {
        self.record(RemoteCall::SignOut);
        self.auth.sign_out().await
    }

    async fn search_emails(
        &self,
        text: &str,
        max: usize,
        days_back: u32,
        _cancel: &CancellationToken,
    ) -> Result<Vec<Email>> {
        self.record(RemoteCall::SearchEmails {
            text: text.to_string(),
            max,
            days_back,
        });
        if self.failing.load(Ordering::SeqCst) {
            bail!("remote request failed");
        }
        if !self.is_authenticated() {
            bail!("not signed in");
        }
        Ok(filter_emails(&lock(&self.emails), text, max, days_back))
    }

    async fn search_events(
        &self,
        text: &str,
        max: usize,
        days_back: u32,
        days_forward: u32,
        _cancel: &CancellationToken,
    ) -> Result<Vec<CalendarEvent>> {
        self.record(RemoteCall::SearchEvents {
            text: text.to_string(),
            max,
            days_back,
            days_forward,
        });
        if self.failing.load(Ordering::SeqCst) {
            bail!("remote request failed");
        }
        if !self.is_authenticated() {
            bail!("not signed in");
        }
        Ok(filter_events(&lock(&self.events), text, max, days_back, days_forward))
    }
}
