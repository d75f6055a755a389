//! Persisted conversion record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::platform::Platform;
use crate::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionStatus {
    Processing,
    Completed,
    Failed,
}

impl ConversionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ConversionStatus::Processing)
    }
}

impl fmt::Display for ConversionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionStatus::Processing => write!(f, "processing"),
            ConversionStatus::Completed => write!(f, "completed"),
            ConversionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Per-track outcome tallies for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackCounts {
    /// Matched and appended to the destination playlist
    #[serde(rename = "transferredCount", default)]
    pub transferred: u32,
    /// No search result, or a duplicate that was suppressed
    #[serde(rename = "skippedCount", default)]
    pub skipped: u32,
    /// Search or append raised an error
    #[serde(rename = "failedCount", default)]
    pub failed: u32,
}

impl TrackCounts {
    pub fn processed(&self) -> u32 {
        self.transferred + self.skipped + self.failed
    }
}

/// One playlist conversion run and its audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversion {
    pub id: String,
    pub user_id: String,
    pub source_playlist_id: String,
    pub source_type: Platform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_playlist_id: Option<String>,
    pub target_type: Platform,
    pub status: ConversionStatus,
    /// 0 to 100
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub total_tracks: u32,
    #[serde(flatten)]
    pub counts: TrackCounts,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when a conversion starts
#[derive(Debug, Clone)]
pub struct NewConversion {
    pub user_id: String,
    pub source_playlist_id: String,
    pub source_type: Platform,
    pub target_type: Platform,
}

/// A partial update. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionUpdate {
    pub status: Option<ConversionStatus>,
    pub progress: Option<f64>,
    pub target_playlist_id: Option<String>,
    pub error: Option<String>,
    pub total_tracks: Option<u32>,
    pub counts: Option<TrackCounts>,
}

impl ConversionUpdate {
    pub fn target_playlist(id: impl Into<String>) -> Self {
        Self {
            target_playlist_id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn total_tracks(total: u32) -> Self {
        Self {
            total_tracks: Some(total),
            ..Default::default()
        }
    }

    pub fn progress(progress: f64, counts: TrackCounts) -> Self {
        Self {
            progress: Some(progress),
            counts: Some(counts),
            ..Default::default()
        }
    }

    pub fn completed(counts: TrackCounts) -> Self {
        Self {
            status: Some(ConversionStatus::Completed),
            progress: Some(100.0),
            counts: Some(counts),
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(ConversionStatus::Failed),
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

impl Conversion {
    pub fn new(id: String, new: NewConversion, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: new.user_id,
            source_playlist_id: new.source_playlist_id,
            source_type: new.source_type,
            target_playlist_id: None,
            target_type: new.target_type,
            status: ConversionStatus::Processing,
            progress: 0.0,
            error: None,
            total_tracks: 0,
            counts: TrackCounts::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply `update`, rejecting anything that breaks the record's invariants.
    /// On error the record is unchanged.
    pub fn apply(&mut self, update: ConversionUpdate, now: DateTime<Utc>) -> Result<(), StoreError> {
        let invalid = |reason: String| StoreError::InvalidUpdate {
            id: self.id.clone(),
            reason,
        };

        if self.status.is_terminal() {
            return Err(invalid(format!("conversion is already {}", self.status)));
        }

        if let Some(progress) = update.progress {
            if !(0.0..=100.0).contains(&progress) {
                return Err(invalid(format!("progress {} is outside 0..=100", progress)));
            }
            if progress < self.progress {
                return Err(invalid(format!(
                    "progress may not go backwards ({} -> {})",
                    self.progress, progress
                )));
            }
        }

        if update.target_playlist_id.is_some() && self.target_playlist_id.is_some() {
            return Err(invalid("target playlist is already set".to_string()));
        }

        match update.status {
            Some(ConversionStatus::Failed) => {
                if update.error.as_deref().is_none_or(str::is_empty) {
                    return Err(invalid("a failed conversion needs an error message".to_string()));
                }
            }
            _ => {
                if update.error.is_some() {
                    return Err(invalid("error is only set when failing".to_string()));
                }
            }
        }

        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(progress) = update.progress {
            self.progress = progress;
        }
        if let Some(target) = update.target_playlist_id {
            self.target_playlist_id = Some(target);
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }
        if let Some(total) = update.total_tracks {
            self.total_tracks = total;
        }
        if let Some(counts) = update.counts {
            self.counts = counts;
        }
        self.updated_at = now;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn conversion() -> Conversion {
        Conversion::new(
            "c1".to_string(),
            NewConversion {
                user_id: "u1".to_string(),
                source_playlist_id: "p1".to_string(),
                source_type: Platform::Spotify,
                target_type: Platform::Youtube,
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_new_conversion_is_processing() {
        let c = conversion();
        assert_eq!(c.status, ConversionStatus::Processing);
        assert_eq!(c.progress, 0.0);
        assert!(c.target_playlist_id.is_none());
        assert!(c.error.is_none());
    }

    #[test]
    fn test_apply_refreshes_updated_at() {
        let mut c = conversion();
        let later = c.updated_at + Duration::seconds(5);
        c.apply(ConversionUpdate::progress(50.0, TrackCounts::default()), later)
            .unwrap();
        assert_eq!(c.updated_at, later);
        assert_eq!(c.progress, 50.0);
    }

    #[test]
    fn test_progress_cannot_regress() {
        let mut c = conversion();
        c.apply(ConversionUpdate::progress(60.0, TrackCounts::default()), Utc::now())
            .unwrap();
        let err = c
            .apply(ConversionUpdate::progress(40.0, TrackCounts::default()), Utc::now())
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidUpdate { .. }));
        assert_eq!(c.progress, 60.0);
    }

    #[test]
    fn test_progress_out_of_range() {
        let mut c = conversion();
        assert!(c
            .apply(ConversionUpdate::progress(101.0, TrackCounts::default()), Utc::now())
            .is_err());
    }

    #[test]
    fn test_target_playlist_set_once() {
        let mut c = conversion();
        c.apply(ConversionUpdate::target_playlist("PL1"), Utc::now()).unwrap();
        assert!(c
            .apply(ConversionUpdate::target_playlist("PL2"), Utc::now())
            .is_err());
        assert_eq!(c.target_playlist_id.as_deref(), Some("PL1"));
    }

    #[test]
    fn test_terminal_status_is_final() {
        let mut c = conversion();
        c.apply(ConversionUpdate::completed(TrackCounts::default()), Utc::now())
            .unwrap();
        assert_eq!(c.progress, 100.0);
        assert!(c.apply(ConversionUpdate::failed("late"), Utc::now()).is_err());
        assert_eq!(c.status, ConversionStatus::Completed);
    }

    #[test]
    fn test_failed_requires_message() {
        let mut c = conversion();
        assert!(c.apply(ConversionUpdate::failed(""), Utc::now()).is_err());
        c.apply(ConversionUpdate::failed("Spotify playlist not found"), Utc::now())
            .unwrap();
        assert_eq!(c.status, ConversionStatus::Failed);
        assert_eq!(c.error.as_deref(), Some("Spotify playlist not found"));
    }

    #[test]
    fn test_error_only_with_failed_status() {
        let mut c = conversion();
        let update = ConversionUpdate {
            error: Some("oops".to_string()),
            ..Default::default()
        };
        assert!(c.apply(update, Utc::now()).is_err());
    }

    #[test]
    fn test_serialized_field_names() {
        let mut c = conversion();
        c.counts.transferred = 3;
        let value = serde_json::to_value(&c).unwrap();
        assert_eq!(value["userId"], "u1");
        assert_eq!(value["sourceType"], "spotify");
        assert_eq!(value["targetType"], "youtube");
        assert_eq!(value["status"], "processing");
        assert_eq!(value["transferredCount"], 3);
        assert!(value.get("targetPlaylistId").is_none());
        assert!(value.get("error").is_none());
        assert!(value["createdAt"].is_string());
    }

    #[test]
    fn test_deserialize_record_without_counts() {
        let json = r#"{
            "id": "abc",
            "userId": "u1",
            "sourcePlaylistId": "p1",
            "sourceType": "spotify",
            "targetType": "youtube",
            "targetPlaylistId": "PL9",
            "status": "completed",
            "progress": 100,
            "createdAt": "2024-05-01T10:00:00.000Z",
            "updatedAt": "2024-05-01T10:03:00.000Z"
        }"#;
        let c: Conversion = serde_json::from_str(json).unwrap();
        assert_eq!(c.status, ConversionStatus::Completed);
        assert_eq!(c.counts, TrackCounts::default());
        assert_eq!(c.target_playlist_id.as_deref(), Some("PL9"));
    }
}
