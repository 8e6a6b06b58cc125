//! Email record produced by either backend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identifier of an item inside the local mail client.
///
/// Only items carrying one of these can be opened, replied to or forwarded
/// through the local backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(pub String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// An email address with optional display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    /// Display name (e.g., "Jane Doe")
    pub name: Option<String>,
    /// Address (e.g., "jane@example.com")
    pub email: String,
}

impl EmailAddress {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            name: None,
            email: email.into(),
        }
    }

    pub fn with_name(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            email: email.into(),
        }
    }

    /// Parse "Jane Doe <jane@example.com>" or a bare address
    pub fn parse(s: &str) -> Self {
        let s = s.trim();

        if let Some(open) = s.rfind('<')
            && let Some(close) = s.rfind('>')
            && open < close
        {
            let name = s[..open].trim().trim_matches('"');
            return Self {
                name: (!name.is_empty()).then(|| name.to_string()),
                email: s[open + 1..close].trim().to_string(),
            };
        }

        Self::new(s)
    }

    /// Name when known, otherwise the bare address
    pub fn short_display(&self) -> &str {
        match &self.name {
            Some(name) if !name.is_empty() => name,
            _ => &self.email,
        }
    }
}

/// An email as returned by a backend search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Email {
    /// Identifier in the local client, when the item is reachable there
    #[serde(default)]
    pub local_id: Option<ItemId>,
    /// Identifier in the remote mailbox
    #[serde(default)]
    pub remote_id: Option<String>,
    pub subject: String,
    pub from: EmailAddress,
    #[serde(default)]
    pub preview: String,
    pub received_at: DateTime<Utc>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub has_attachments: bool,
    /// Browser link to the message (remote mailbox web UI)
    #[serde(default)]
    pub web_link: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_name() {
        let addr = EmailAddress::parse("Jane Doe <jane@example.com>");
        assert_eq!(addr.name.as_deref(), Some("Jane Doe"));
        assert_eq!(addr.email, "jane@example.com");
    }

    #[test]
    fn test_parse_quoted_name() {
        let addr = EmailAddress::parse("\"Doe, Jane\" <jane@example.com>");
        assert_eq!(addr.name.as_deref(), Some("Doe, Jane"));
    }

    #[test]
    fn test_parse_bare_address() {
        let addr = EmailAddress::parse("  jane@example.com ");
        assert_eq!(addr.name, None);
        assert_eq!(addr.email, "jane@example.com");
    }

    #[test]
    fn test_short_display_prefers_name() {
        assert_eq!(
            EmailAddress::with_name("Jane", "jane@example.com").short_display(),
            "Jane"
        );
        assert_eq!(EmailAddress::new("jane@example.com").short_display(), "jane@example.com");
    }
}
