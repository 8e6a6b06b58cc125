//! Microsoft Graph integration (the remote backend)
//!
//! This module provides:
//! - [`GraphClient`], the [`RemoteMailClient`](crate::backends::RemoteMailClient)
//!   implementation
//! - Graph response types
//! - Normalization of responses into domain models

mod client;
mod normalize;

pub use client::GraphClient;
pub use normalize::{normalize_event, normalize_message};

/// Graph API response types
pub mod api {
    use serde::Deserialize;

    /// Collection envelope
    #[derive(Debug, Deserialize)]
    pub struct ListResponse<T> {
        #[serde(default = "Vec::new")]
        pub value: Vec<T>,
        #[serde(rename = "@odata.nextLink")]
        pub next_link: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GraphMessage {
        pub id: String,
        pub subject: Option<String>,
        pub body_preview: Option<String>,
        pub received_date_time: Option<String>,
        pub from: Option<Recipient>,
        #[serde(default)]
        pub is_read: bool,
        #[serde(default)]
        pub has_attachments: bool,
        pub web_link: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Recipient {
        pub email_address: GraphEmailAddress,
    }

    #[derive(Debug, Deserialize)]
    pub struct GraphEmailAddress {
        pub name: Option<String>,
        pub address: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GraphEvent {
        pub id: String,
        pub subject: Option<String>,
        pub start: DateTimeTimeZone,
        pub end: DateTimeTimeZone,
        #[serde(default)]
        pub is_all_day: bool,
        #[serde(default)]
        pub is_cancelled: bool,
        pub location: Option<Location>,
        pub organizer: Option<Recipient>,
        pub web_link: Option<String>,
        pub online_meeting: Option<OnlineMeeting>,
    }

    /// Wall-clock time plus zone name, as Graph reports event times
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct DateTimeTimeZone {
        pub date_time: String,
        pub time_zone: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Location {
        pub display_name: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct OnlineMeeting {
        pub join_url: Option<String>,
    }
}
