//! YouTube Data API HTTP client

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info};

use super::models::*;
use crate::auth::TokenCache;
use crate::platform::error::check_response;
use crate::platform::{
    with_token_retry, ApiError, Platform, PlaylistWriter, TargetMatcher, TrackDescriptor,
    Visibility,
};

/// YouTube's "Music" video category
const MUSIC_CATEGORY_ID: &str = "10";
const PLAYLISTS_PAGE_SIZE: u32 = 50;

/// HTTP client for the YouTube Data API, authorised per user through the
/// shared token cache
#[derive(Clone)]
pub struct YoutubeClient {
    base_url: String,
    http_client: Client,
    tokens: Arc<TokenCache>,
}

impl YoutubeClient {
    pub fn new(base_url: &str, tokens: Arc<TokenCache>) -> Result<Self, ApiError> {
        let http_client = Client::builder()
            .user_agent(concat!("tubeport/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
            tokens,
        })
    }

    /// Search music videos, most relevant first
    pub async fn search_videos(
        &self,
        user_id: &str,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<SearchResult>, ApiError> {
        let url = format!("{}/search", self.base_url);
        let max_results = max_results.to_string();
        debug!("Searching YouTube for '{}'", query);

        let response: ListResponse<SearchResult> = self
            .execute(user_id, "search", |token| {
                self.http_client
                    .get(&url)
                    .query(&[
                        ("part", "snippet"),
                        ("type", "video"),
                        ("videoCategoryId", MUSIC_CATEGORY_ID),
                        ("maxResults", max_results.as_str()),
                        ("q", query),
                    ])
                    .bearer_auth(token)
            })
            .await?;

        Ok(response.items)
    }

    /// Every playlist on the user's channel
    pub async fn get_playlists(&self, user_id: &str) -> Result<Vec<Playlist>, ApiError> {
        let url = format!("{}/playlists", self.base_url);
        let max_results = PLAYLISTS_PAGE_SIZE.to_string();
        let mut playlists = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page: ListResponse<Playlist> = self
                .execute(user_id, "playlists", |token| {
                    let mut request = self
                        .http_client
                        .get(&url)
                        .query(&[
                            ("part", "snippet,status,contentDetails"),
                            ("mine", "true"),
                            ("maxResults", max_results.as_str()),
                        ])
                        .bearer_auth(token);
                    if let Some(page_token) = &page_token {
                        request = request.query(&[("pageToken", page_token)]);
                    }
                    request
                })
                .await?;

            playlists.extend(page.items);
            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        debug!("Found {} YouTube playlists for {}", playlists.len(), user_id);
        Ok(playlists)
    }

    async fn execute<T, F>(&self, user_id: &str, what: &str, build: F) -> Result<T, ApiError>
    where
        T: DeserializeOwned + Send,
        F: Fn(String) -> RequestBuilder + Send + Sync,
    {
        with_token_retry(&self.tokens, user_id, Platform::Youtube, |token| {
            let request = build(token);
            async move {
                let response = check_response(request.send().await?, what).await?;
                Ok(response.json::<T>().await?)
            }
        })
        .await
    }
}

/// `"<title> <first artist> official"`, or `"<title> official"` without an artist
pub fn search_query(track: &TrackDescriptor) -> String {
    match track.primary_artist() {
        Some(artist) if !artist.trim().is_empty() => {
            format!("{} {} official", track.title.trim(), artist.trim())
        }
        _ => format!("{} official", track.title.trim()),
    }
}

#[async_trait]
impl TargetMatcher for YoutubeClient {
    async fn find_best_match(
        &self,
        user_id: &str,
        track: &TrackDescriptor,
    ) -> Result<Option<String>, ApiError> {
        let query = search_query(track);
        let results = self.search_videos(user_id, &query, 1).await?;
        let best = results
            .iter()
            .find_map(|r| r.video_id())
            .map(str::to_string);

        match &best {
            Some(video_id) => debug!("Matched '{}' to {}", query, video_id),
            None => debug!("No results for '{}'", query),
        }
        Ok(best)
    }
}

#[async_trait]
impl PlaylistWriter for YoutubeClient {
    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    async fn create_playlist(
        &self,
        user_id: &str,
        title: &str,
        description: &str,
        visibility: Visibility,
    ) -> Result<String, ApiError> {
        let url = format!("{}/playlists", self.base_url);
        let body = NewPlaylist {
            snippet: PlaylistSnippet {
                title: title.to_string(),
                description: description.to_string(),
            },
            status: PlaylistStatus {
                privacy_status: visibility.as_str().to_string(),
            },
        };

        let created: CreatedResource = self
            .execute(user_id, "playlists", |token| {
                self.http_client
                    .post(&url)
                    .query(&[("part", "snippet,status")])
                    .bearer_auth(token)
                    .json(&body)
            })
            .await?;

        info!("Created YouTube playlist {} ({})", created.id, visibility.as_str());
        Ok(created.id)
    }

    async fn append_item(
        &self,
        user_id: &str,
        playlist_id: &str,
        item_id: &str,
        position: Option<u32>,
    ) -> Result<(), ApiError> {
        let url = format!("{}/playlistItems", self.base_url);
        let body = NewPlaylistItem::video(playlist_id, item_id, position);

        let _: CreatedResource = self
            .execute(user_id, &format!("playlist {}", playlist_id), |token| {
                self.http_client
                    .post(&url)
                    .query(&[("part", "snippet")])
                    .bearer_auth(token)
                    .json(&body)
            })
            .await?;

        Ok(())
    }
}
