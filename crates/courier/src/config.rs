//! Remote client credentials
//!
//! The Graph application registration is a public client, so only a client
//! id (and optionally a tenant) is needed. Sources, in order of priority:
//! 1. Compile-time embedded values (for release builds)
//! 2. JSON file in the Courier config directory
//! 3. Runtime environment variables

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Credentials filename in the Courier config directory
const CREDENTIALS_FILE: &str = "graph-credentials.json";

/// Tenant used when none is configured (personal and work accounts)
pub const DEFAULT_TENANT: &str = "common";

/// Application registration used to talk to the remote mailbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphCredentials {
    pub client_id: String,
    pub tenant: String,
}

#[derive(Deserialize)]
struct CredentialFile {
    client_id: String,
    #[serde(default)]
    tenant: Option<String>,
}

impl GraphCredentials {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            tenant: DEFAULT_TENANT.to_string(),
        }
    }

    /// Load credentials from the first source that provides them
    pub fn load() -> Result<Self> {
        if let Some(creds) = Self::from_compile_time() {
            return Ok(creds);
        }

        if config::config_exists(CREDENTIALS_FILE) {
            let file: CredentialFile = config::load_json(CREDENTIALS_FILE)?;
            return Self::from_credential_file(file);
        }

        Self::from_env()
    }

    /// Build with: COURIER_CLIENT_ID=xxx cargo build --release
    pub fn from_compile_time() -> Option<Self> {
        let client_id = option_env!("COURIER_CLIENT_ID")?;
        if client_id.is_empty() {
            return None;
        }
        let tenant = option_env!("COURIER_TENANT")
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TENANT);

        Some(Self {
            client_id: client_id.to_string(),
            tenant: tenant.to_string(),
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let file: CredentialFile = config::load_json_file(path)?;
        Self::from_credential_file(file)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let file: CredentialFile =
            serde_json::from_str(json).context("Failed to parse credentials JSON")?;
        Self::from_credential_file(file)
    }

    fn from_credential_file(file: CredentialFile) -> Result<Self> {
        anyhow::ensure!(!file.client_id.trim().is_empty(), "Credentials file has an empty client_id");
        Ok(Self {
            client_id: file.client_id.trim().to_string(),
            tenant: file
                .tenant
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TENANT.to_string()),
        })
    }

    pub fn from_env() -> Result<Self> {
        let client_id = std::env::var("COURIER_CLIENT_ID")
            .context("COURIER_CLIENT_ID environment variable not set")?;
        let tenant = std::env::var("COURIER_TENANT").unwrap_or_else(|_| DEFAULT_TENANT.to_string());
        Ok(Self { client_id, tenant })
    }

    /// ~/.config/courier/graph-credentials.json
    pub fn default_credentials_path() -> Option<PathBuf> {
        config::config_path(CREDENTIALS_FILE)
    }

    pub fn is_available() -> bool {
        Self::from_compile_time().is_some()
            || config::config_exists(CREDENTIALS_FILE)
            || std::env::var("COURIER_CLIENT_ID").is_ok()
    }
}
