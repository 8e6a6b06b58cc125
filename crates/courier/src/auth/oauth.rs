//! Microsoft identity platform OAuth2 for the remote mailbox
//!
//! Authorization code flow for a public client with a loopback redirect.
//! HTTP is synchronous (ureq); the [`CredentialProvider`] impl moves each
//! flow onto a blocking thread.

use std::fs;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::state::{AccessToken, CredentialProvider, InteractiveOutcome, SilentOutcome};
use crate::config::GraphCredentials;

/// Token cache filename in the Courier config directory
const TOKEN_FILE: &str = "graph-tokens.json";

/// Failure modes of the OAuth flows
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("interactive sign-in required")]
    InteractionRequired,
    #[error("sign-in cancelled")]
    Cancelled,
    #[error("sign-in rejected: {0}")]
    Rejected(String),
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

/// OAuth2 configuration and token cache for the Graph API
#[derive(Debug, Clone)]
pub struct GraphAuth {
    client_id: String,
    tenant: String,
    token_path: PathBuf,
}

/// Token cache contents
#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    #[serde(default)]
    account: Option<String>,
}

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    id_token: Option<String>,
}

/// The claims we read from the id_token
#[derive(Debug, Deserialize)]
struct IdClaims {
    preferred_username: Option<String>,
    email: Option<String>,
}

impl GraphAuth {
    const AUTHORITY: &'static str = "https://login.microsoftonline.com";

    const SCOPES: &'static str = "offline_access openid profile User.Read Mail.Read Calendars.Read";

    /// Loopback ports tried for the redirect listener
    const PORT_RANGE_START: u16 = 8400;
    const PORT_RANGE_END: u16 = 8410;

    /// Tokens closer than this to expiry are refreshed
    const EXPIRY_BUFFER_SECS: i64 = 300;

    /// Lifetime assumed when the token endpoint omits `expires_in`
    const DEFAULT_LIFETIME_SECS: i64 = 3600;

    /// How long the interactive flow waits for the browser redirect
    const INTERACTIVE_TIMEOUT: Duration = Duration::from_secs(300);

    /// Interval between accept attempts and cancellation checks
    const ACCEPT_POLL: Duration = Duration::from_millis(100);

    /// Connections that send nothing within this window are skipped
    const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(5);

    /// Create an auth instance caching tokens in the Courier config directory
    pub fn new(credentials: &GraphCredentials) -> anyhow::Result<Self> {
        let token_path =
            config::config_path(TOKEN_FILE).context("Could not determine config directory")?;
        Ok(Self::with_token_path(credentials, token_path))
    }

    pub fn with_token_path(credentials: &GraphCredentials, token_path: impl Into<PathBuf>) -> Self {
        Self {
            client_id: credentials.client_id.clone(),
            tenant: credentials.tenant.clone(),
            token_path: token_path.into(),
        }
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    fn authorize_url(&self) -> String {
        format!("{}/{}/oauth2/v2.0/authorize", Self::AUTHORITY, self.tenant)
    }

    fn token_url(&self) -> String {
        format!("{}/{}/oauth2/v2.0/token", Self::AUTHORITY, self.tenant)
    }

    /// Return a cached token or refresh it, never prompting
    pub fn silent_blocking(&self) -> Result<AccessToken, OAuthError> {
        let stored = match self.load_token() {
            Ok(stored) => stored,
            Err(e) => {
                debug!("No usable token cache: {:#}", e);
                return Err(OAuthError::InteractionRequired);
            }
        };

        if let Some(expires_at) = stored.expires_at
            && expires_at > Utc::now().timestamp() + Self::EXPIRY_BUFFER_SECS
        {
            return Ok(to_access_token(&stored, expires_at));
        }

        let refresh_token = stored
            .refresh_token
            .as_deref()
            .ok_or(OAuthError::InteractionRequired)?;

        let response = self.refresh_access_token(refresh_token)?;
        self.save_token_response(&response)
    }

    /// Run the browser flow and wait for the redirect. Firing `cancel`
    /// releases the loopback listener within one poll interval.
    pub fn interactive_blocking(
        &self,
        cancel: &CancellationToken,
    ) -> Result<AccessToken, OAuthError> {
        if cancel.is_cancelled() {
            return Err(OAuthError::Cancelled);
        }
        let (listener, port) = self.start_local_server()?;
        let redirect_uri = format!("http://localhost:{}", port);

        let auth_url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&response_mode=query&scope={}&prompt=select_account",
            self.authorize_url(),
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&redirect_uri),
            urlencoding::encode(Self::SCOPES),
        );

        println!("\n=== Sign-in Required ===");
        println!("Opening browser for authentication...");
        println!("If the browser doesn't open, visit: {}", auth_url);

        if let Err(e) = open::that(&auth_url) {
            warn!("Failed to open browser: {}", e);
        }

        let code = self.wait_for_callback(listener, cancel)?;

        info!("Exchanging authorization code for tokens");
        let response = ureq::post(&self.token_url()).send_form([
            ("client_id", self.client_id.as_str()),
            ("code", code.as_str()),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri.as_str()),
            ("scope", Self::SCOPES),
        ]);

        let token: TokenResponse = match response {
            Ok(mut resp) => resp
                .body_mut()
                .read_json()
                .context("Failed to parse token response")?,
            Err(ureq::Error::StatusCode(status)) => {
                return Err(OAuthError::Rejected(format!(
                    "token endpoint returned {}",
                    status
                )));
            }
            Err(e) => return Err(anyhow!(e).context("Failed to exchange authorization code").into()),
        };

        self.save_token_response(&token)
    }

    /// Remove the token cache
    pub fn clear_blocking(&self) -> anyhow::Result<()> {
        if self.token_path.exists() {
            fs::remove_file(&self.token_path).with_context(|| {
                format!("Failed to remove token cache: {}", self.token_path.display())
            })?;
        }
        Ok(())
    }

    fn start_local_server(&self) -> Result<(TcpListener, u16), OAuthError> {
        for port in Self::PORT_RANGE_START..=Self::PORT_RANGE_END {
            if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)) {
                return Ok((listener, port));
            }
        }
        Err(anyhow!(
            "Could not bind to any port in range {}-{}",
            Self::PORT_RANGE_START,
            Self::PORT_RANGE_END
        )
        .into())
    }

    /// Accept the redirect and pull the authorization code out of it.
    ///
    /// Requests carrying neither `code` nor `error` (browser preconnects,
    /// favicon fetches) are answered and skipped. Gives up as a
    /// cancellation after [`Self::INTERACTIVE_TIMEOUT`] or once `cancel`
    /// fires.
    fn wait_for_callback(
        &self,
        listener: TcpListener,
        cancel: &CancellationToken,
    ) -> Result<String, OAuthError> {
        listener
            .set_nonblocking(true)
            .context("Failed to configure callback listener")?;
        let deadline = Instant::now() + Self::INTERACTIVE_TIMEOUT;

        loop {
            if cancel.is_cancelled() {
                info!("Sign-in cancelled while waiting for redirect");
                return Err(OAuthError::Cancelled);
            }

            let mut stream = match listener.accept() {
                Ok((stream, _)) => stream,
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        info!("Timed out waiting for sign-in redirect");
                        return Err(OAuthError::Cancelled);
                    }
                    std::thread::sleep(Self::ACCEPT_POLL);
                    continue;
                }
                Err(e) => return Err(anyhow!(e).context("Failed to accept connection").into()),
            };

            let callback = match read_callback(&stream) {
                Ok(callback) => callback,
                Err(e) => {
                    debug!("Skipping unreadable callback connection: {:#}", e);
                    continue;
                }
            };

            match (callback.code, callback.error) {
                (Some(code), _) => {
                    respond(&mut stream, "200 OK", "Signed in. You can close this window.");
                    return Ok(code);
                }
                (None, Some(error)) => {
                    respond(
                        &mut stream,
                        "400 Bad Request",
                        "Sign-in did not complete. You can close this window.",
                    );
                    if error == "access_denied" {
                        return Err(OAuthError::Cancelled);
                    }
                    return Err(OAuthError::Rejected(
                        callback.error_description.unwrap_or(error),
                    ));
                }
                (None, None) => {
                    debug!("Skipping callback request without code or error");
                    respond(&mut stream, "404 Not Found", "Waiting for sign-in.");
                }
            }
        }
    }

    fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenResponse, OAuthError> {
        let response = ureq::post(&self.token_url()).send_form([
            ("client_id", self.client_id.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
            ("scope", Self::SCOPES),
        ]);

        let mut token: TokenResponse = match response {
            Ok(resp) => resp
                .into_body()
                .read_json()
                .context("Failed to parse refresh token response")?,
            // invalid_grant and friends: the cached account is no longer usable
            Err(ureq::Error::StatusCode(400 | 401)) => return Err(OAuthError::InteractionRequired),
            Err(e) => return Err(anyhow!(e).context("Failed to refresh access token").into()),
        };

        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }
        Ok(token)
    }

    fn load_token(&self) -> anyhow::Result<StoredToken> {
        config::load_json_file(&self.token_path)
    }

    fn save_token_response(&self, token: &TokenResponse) -> Result<AccessToken, OAuthError> {
        let account = token
            .id_token
            .as_deref()
            .and_then(account_from_id_token)
            // Refresh responses may omit the id_token; keep the cached name
            .or_else(|| self.load_token().ok().and_then(|t| t.account));

        let expires_at = Utc::now().timestamp()
            + token
                .expires_in
                .map(|d| d as i64)
                .unwrap_or(Self::DEFAULT_LIFETIME_SECS);

        let stored = StoredToken {
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            expires_at: Some(expires_at),
            account,
        };
        config::save_json_file(&self.token_path, &stored)?;
        Ok(to_access_token(&stored, expires_at))
    }
}

#[async_trait]
impl CredentialProvider for GraphAuth {
    async fn acquire_silent(&self) -> SilentOutcome {
        let auth = self.clone();
        match tokio::task::spawn_blocking(move || auth.silent_blocking()).await {
            Ok(Ok(token)) => SilentOutcome::Acquired(token),
            Ok(Err(OAuthError::InteractionRequired)) => SilentOutcome::InteractionRequired,
            Ok(Err(e)) => SilentOutcome::Failed(e.into()),
            Err(e) => SilentOutcome::Failed(anyhow!(e)),
        }
    }

    async fn acquire_interactive(&self, cancel: &CancellationToken) -> InteractiveOutcome {
        let auth = self.clone();
        let flow_cancel = cancel.child_token();
        // Stops the blocking listener if this future is dropped mid-prompt
        let _guard = flow_cancel.clone().drop_guard();
        match tokio::task::spawn_blocking(move || auth.interactive_blocking(&flow_cancel)).await {
            Ok(result) => interactive_outcome(result),
            Err(e) => InteractiveOutcome::Failed(anyhow!(e)),
        }
    }

    async fn clear(&self) -> anyhow::Result<()> {
        let auth = self.clone();
        tokio::task::spawn_blocking(move || auth.clear_blocking()).await?
    }
}

fn to_access_token(stored: &StoredToken, expires_at: i64) -> AccessToken {
    AccessToken {
        secret: stored.access_token.clone(),
        expires_at: chrono::DateTime::from_timestamp(expires_at, 0).unwrap_or_else(Utc::now),
        account: stored.account.clone(),
    }
}

/// Only an answer from the service can reject a sign-in; everything else
/// that goes wrong is a plain failure
fn interactive_outcome(result: Result<AccessToken, OAuthError>) -> InteractiveOutcome {
    match result {
        Ok(token) => InteractiveOutcome::Acquired(token),
        Err(OAuthError::Cancelled) => InteractiveOutcome::Cancelled,
        Err(OAuthError::Rejected(reason)) => InteractiveOutcome::Rejected(anyhow!(reason)),
        Err(e @ (OAuthError::InteractionRequired | OAuthError::Transport(_))) => {
            InteractiveOutcome::Failed(e.into())
        }
    }
}

/// Query parameters of the OAuth redirect
#[derive(Debug, Default, PartialEq)]
struct Callback {
    code: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Parse `GET /?code=...&state=... HTTP/1.1`
fn parse_callback(request_line: &str) -> Callback {
    let Some(target) = request_line.split_whitespace().nth(1) else {
        return Callback::default();
    };
    let Ok(url) = url::Url::parse(&format!("http://localhost{}", target)) else {
        return Callback::default();
    };

    let mut callback = Callback::default();
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => callback.code = Some(value.into_owned()),
            "error" => callback.error = Some(value.into_owned()),
            "error_description" => callback.error_description = Some(value.into_owned()),
            _ => {}
        }
    }
    callback
}

/// Read the request line of one accepted connection
fn read_callback(stream: &TcpStream) -> anyhow::Result<Callback> {
    stream
        .set_nonblocking(false)
        .context("Failed to configure callback stream")?;
    stream
        .set_read_timeout(Some(GraphAuth::REQUEST_READ_TIMEOUT))
        .context("Failed to configure callback stream")?;

    let mut request_line = String::new();
    BufReader::new(stream)
        .read_line(&mut request_line)
        .context("Failed to read request")?;
    Ok(parse_callback(&request_line))
}

fn respond(stream: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n<html><body><h1>{}</h1></body></html>",
        status, body
    );
    stream.write_all(response.as_bytes()).ok();
}

/// Read the account name out of an unverified id_token payload
fn account_from_id_token(id_token: &str) -> Option<String> {
    let payload = id_token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: IdClaims = serde_json::from_slice(&bytes).ok()?;
    claims.preferred_username.or(claims.email)
}
