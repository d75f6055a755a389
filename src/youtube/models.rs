//! YouTube Data API v3 request and response models

use serde::{Deserialize, Serialize};

pub const VIDEO_KIND: &str = "youtube#video";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceId {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSnippet {
    pub title: String,
    #[serde(default)]
    pub channel_title: String,
}

/// One hit from `/search`
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResult {
    pub id: ResourceId,
    pub snippet: Option<SearchSnippet>,
}

impl SearchResult {
    pub fn video_id(&self) -> Option<&str> {
        if self.id.kind != VIDEO_KIND {
            return None;
        }
        self.id.video_id.as_deref()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistSnippet {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistStatus {
    pub privacy_status: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentDetails {
    #[serde(default)]
    pub item_count: u32,
}

/// Playlist resource as returned by `/playlists`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    pub snippet: PlaylistSnippet,
    pub status: Option<PlaylistStatus>,
    pub content_details: Option<ContentDetails>,
}

/// Body of `POST /playlists`
#[derive(Debug, Clone, Serialize)]
pub struct NewPlaylist {
    pub snippet: PlaylistSnippet,
    pub status: PlaylistStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPlaylistItemSnippet {
    pub playlist_id: String,
    pub resource_id: ResourceId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
}

/// Body of `POST /playlistItems`
#[derive(Debug, Clone, Serialize)]
pub struct NewPlaylistItem {
    pub snippet: NewPlaylistItemSnippet,
}

impl NewPlaylistItem {
    pub fn video(playlist_id: &str, video_id: &str, position: Option<u32>) -> Self {
        Self {
            snippet: NewPlaylistItemSnippet {
                playlist_id: playlist_id.to_string(),
                resource_id: ResourceId {
                    kind: VIDEO_KIND.to_string(),
                    video_id: Some(video_id.to_string()),
                },
                position,
            },
        }
    }
}

/// Any created resource; only the id is needed
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedResource {
    pub id: String,
}
