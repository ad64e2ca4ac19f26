//! Typed views of the few responses the client itself interprets.
//!
//! The rest of the API is returned as `serde_json::Value`; callers decode
//! what they need with `JellyfinClient::execute_as`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct UserSummary {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Response of `Users/AuthenticateByName`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct AuthenticationResult {
    pub access_token: String,
    #[serde(default)]
    pub server_id: Option<String>,
    pub user: UserSummary,
}

/// Response of `System/Info/Public`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct PublicSystemInfo {
    #[serde(default)]
    pub server_name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

/// Response of `GetUTCTime`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct UtcTimeResponse {
    pub request_reception_time: DateTime<Utc>,
    pub response_transmission_time: DateTime<Utc>,
}

/// The four timestamps of one clock-synchronisation round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtcTimeSample {
    pub request_sent: DateTime<Utc>,
    pub request_received: DateTime<Utc>,
    pub response_sent: DateTime<Utc>,
    pub response_received: DateTime<Utc>,
}

impl UtcTimeSample {
    /// Estimated server clock offset: positive when the server is ahead.
    pub fn offset(&self) -> chrono::Duration {
        ((self.request_received - self.request_sent) + (self.response_sent - self.response_received)) / 2
    }

    /// Round-trip time minus the server's processing time.
    pub fn round_trip(&self) -> chrono::Duration {
        (self.response_received - self.request_sent) - (self.response_sent - self.request_received)
    }
}
