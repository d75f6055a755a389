//! Spotify Web API response models

use serde::{Deserialize, Serialize};

use crate::platform::{SourcePlaylist, TrackDescriptor};

/// Paged list wrapper used by every Spotify collection endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct Paging<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    /// Absolute URL of the next page, `null` on the last one
    pub next: Option<String>,
    #[serde(default)]
    pub total: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistOwner {
    pub id: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracksRef {
    #[serde(default)]
    pub total: u32,
}

/// Playlist as returned by `/me/playlists` and `/playlists/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    /// Empty string when unset
    pub description: Option<String>,
    pub owner: Option<PlaylistOwner>,
    pub public: Option<bool>,
    pub tracks: Option<TracksRef>,
}

impl From<Playlist> for SourcePlaylist {
    fn from(playlist: Playlist) -> Self {
        SourcePlaylist {
            id: playlist.id,
            name: playlist.name,
            description: playlist.description.filter(|d| !d.trim().is_empty()),
            track_count: playlist.tracks.map(|t| t.total),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimplifiedArtist {
    pub name: String,
}

/// A track or episode inside a playlist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    /// `null` for local files
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<SimplifiedArtist>,
    #[serde(default)]
    pub duration_ms: u64,
    /// `track` or `episode`
    #[serde(rename = "type", default = "default_item_type")]
    pub kind: String,
}

fn default_item_type() -> String {
    "track".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistItem {
    /// `null` when the track was removed from Spotify
    pub track: Option<Track>,
    #[serde(default)]
    pub is_local: bool,
}

impl PlaylistItem {
    /// Only music tracks with a resolvable Spotify id can be selected or
    /// matched; local files, removed tracks and podcast episodes are dropped
    pub fn into_descriptor(self) -> Option<TrackDescriptor> {
        if self.is_local {
            return None;
        }
        let track = self.track?;
        if track.kind != "track" {
            return None;
        }
        Some(TrackDescriptor {
            id: track.id?,
            title: track.name,
            artists: track.artists.into_iter().map(|a| a.name).collect(),
            duration_ms: track.duration_ms,
        })
    }
}
