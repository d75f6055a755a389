//! Persisted OAuth token

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// OAuth token as kept in the credential store.
///
/// Field names and the millisecond `expiresAt` match the user documents
/// written at sign-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredToken {
    pub access_token: String,
    /// Absent for Google grants that did not hand out offline access
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl StoredToken {
    /// Build a token from an `expires_in` (seconds) response
    pub fn new(
        access_token: String,
        refresh_token: Option<String>,
        expires_in: i64,
        scope: Option<String>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: Utc::now() + Duration::seconds(expires_in),
            scope,
        }
    }

    /// True once `now` is within `buffer` of the expiry time
    pub fn is_expired(&self, buffer: Duration) -> bool {
        Utc::now() >= self.expires_at - buffer
    }
}
