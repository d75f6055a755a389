//! Platform-neutral types and the seams the conversion engine drives

pub mod error;
pub mod retry;
#[cfg(test)]
pub(crate) mod stub;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

pub use error::ApiError;
pub use retry::with_token_retry;

/// A music platform a playlist can be converted from or to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[derive(clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Spotify,
    Youtube,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Spotify => write!(f, "Spotify"),
            Platform::Youtube => write!(f, "YouTube"),
        }
    }
}

/// Privacy of a playlist created on the destination platform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[derive(clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Unlisted,
    Public,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Unlisted => "unlisted",
            Visibility::Public => "public",
        }
    }
}

/// A track on the source platform, reduced to what matching needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    pub id: String,
    pub title: String,
    /// Artist names in credit order
    pub artists: Vec<String>,
    pub duration_ms: u64,
}

impl TrackDescriptor {
    pub fn primary_artist(&self) -> Option<&str> {
        self.artists.first().map(String::as_str)
    }
}

/// Source playlist metadata used to name the destination playlist
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePlaylist {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub track_count: Option<u32>,
}

/// Enumerates playlists and their tracks on the source platform
#[async_trait]
pub trait SourcePlatform: Send + Sync {
    fn platform(&self) -> Platform;

    /// Look up a playlist visible to the user. `Ok(None)` if it is not theirs.
    async fn playlist(
        &self,
        user_id: &str,
        playlist_id: &str,
    ) -> Result<Option<SourcePlaylist>, ApiError>;

    /// Every track of the playlist in source order, restricted to
    /// `selected_ids` when that is non-empty.
    async fn list_tracks(
        &self,
        user_id: &str,
        playlist_id: &str,
        selected_ids: &[String],
    ) -> Result<Vec<TrackDescriptor>, ApiError>;
}

/// Resolves a source track to an item on the destination platform
#[async_trait]
pub trait TargetMatcher: Send + Sync {
    /// `Ok(None)` means the search came back empty, which is not an error.
    async fn find_best_match(
        &self,
        user_id: &str,
        track: &TrackDescriptor,
    ) -> Result<Option<String>, ApiError>;
}

/// Creates and fills playlists on the destination platform
#[async_trait]
pub trait PlaylistWriter: Send + Sync {
    fn platform(&self) -> Platform;

    async fn create_playlist(
        &self,
        user_id: &str,
        title: &str,
        description: &str,
        visibility: Visibility,
    ) -> Result<String, ApiError>;

    async fn append_item(
        &self,
        user_id: &str,
        playlist_id: &str,
        item_id: &str,
        position: Option<u32>,
    ) -> Result<(), ApiError>;
}

/// Keep only tracks whose id is in `selected_ids`, in source order.
/// An empty selection keeps everything.
pub fn select_tracks(tracks: Vec<TrackDescriptor>, selected_ids: &[String]) -> Vec<TrackDescriptor> {
    if selected_ids.is_empty() {
        return tracks;
    }

    let wanted: HashSet<&str> = selected_ids.iter().map(String::as_str).collect();
    tracks
        .into_iter()
        .filter(|t| wanted.contains(t.id.as_str()))
        .collect()
}

#[cfg(test)]
pub(crate) fn track(id: &str, title: &str, artist: &str) -> TrackDescriptor {
    TrackDescriptor {
        id: id.to_string(),
        title: title.to_string(),
        artists: vec![artist.to_string()],
        duration_ms: 180_000,
    }
}
