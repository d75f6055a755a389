//! Spotify Web API HTTP client

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

use super::models::*;
use crate::auth::TokenCache;
use crate::platform::error::check_response;
use crate::platform::{
    select_tracks, with_token_retry, ApiError, Platform, SourcePlatform, SourcePlaylist,
    TrackDescriptor,
};

/// Largest page sizes the API accepts
const PLAYLISTS_PAGE_SIZE: u32 = 50;
const TRACKS_PAGE_SIZE: u32 = 100;

/// HTTP client for the Spotify Web API, authorised per user through the
/// shared token cache
#[derive(Clone)]
pub struct SpotifyClient {
    base_url: String,
    http_client: Client,
    tokens: Arc<TokenCache>,
}

impl SpotifyClient {
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

    /// Profile of the linked Spotify account
    pub async fn current_user(&self, user_id: &str) -> Result<UserProfile, ApiError> {
        let url = format!("{}/me", self.base_url);
        self.get_json(user_id, &url, "current user").await
    }

    /// Every playlist the user owns or follows
    pub async fn get_playlists(&self, user_id: &str) -> Result<Vec<Playlist>, ApiError> {
        let url = playlists_url(&self.base_url);
        let playlists = self.get_all_pages(user_id, url, "playlists").await?;
        debug!("Found {} Spotify playlists for {}", playlists.len(), user_id);
        Ok(playlists)
    }

    /// Every item of a playlist in playlist order, following `next` links
    pub async fn get_playlist_items(
        &self,
        user_id: &str,
        playlist_id: &str,
    ) -> Result<Vec<PlaylistItem>, ApiError> {
        let url = playlist_tracks_url(&self.base_url, playlist_id);
        let items = self
            .get_all_pages(user_id, url, &format!("playlist {}", playlist_id))
            .await?;
        debug!("Fetched {} items from playlist {}", items.len(), playlist_id);
        Ok(items)
    }

    async fn get_all_pages<T>(&self, user_id: &str, first_url: String, what: &str) -> Result<Vec<T>, ApiError>
    where
        T: DeserializeOwned + Send,
    {
        let mut items = Vec::new();
        let mut next = Some(first_url);

        while let Some(url) = next {
            let page: Paging<T> = self.get_json(user_id, &url, what).await?;
            debug!("Fetched page of {} ({} of {})", what, items.len() + page.items.len(), page.total);
            items.extend(page.items);
            next = page.next;
        }

        Ok(items)
    }

    async fn get_json<T>(&self, user_id: &str, url: &str, what: &str) -> Result<T, ApiError>
    where
        T: DeserializeOwned + Send,
    {
        debug!("GET {}", url);
        with_token_retry(&self.tokens, user_id, Platform::Spotify, |token| {
            let request = self.http_client.get(url).bearer_auth(token);
            async move {
                let response = check_response(request.send().await?, what).await?;
                Ok(response.json::<T>().await?)
            }
        })
        .await
    }
}

#[async_trait]
impl SourcePlatform for SpotifyClient {
    fn platform(&self) -> Platform {
        Platform::Spotify
    }

    async fn playlist(
        &self,
        user_id: &str,
        playlist_id: &str,
    ) -> Result<Option<SourcePlaylist>, ApiError> {
        let playlists = self.get_playlists(user_id).await?;
        Ok(playlists
            .into_iter()
            .find(|p| p.id == playlist_id)
            .map(SourcePlaylist::from))
    }

    async fn list_tracks(
        &self,
        user_id: &str,
        playlist_id: &str,
        selected_ids: &[String],
    ) -> Result<Vec<TrackDescriptor>, ApiError> {
        let items = self.get_playlist_items(user_id, playlist_id).await?;
        let total = items.len();
        let tracks: Vec<TrackDescriptor> = items
            .into_iter()
            .filter_map(PlaylistItem::into_descriptor)
            .collect();

        if tracks.len() < total {
            debug!(
                "Dropped {} local, unavailable or episode items from playlist {}",
                total - tracks.len(),
                playlist_id
            );
        }

        Ok(select_tracks(tracks, selected_ids))
    }
}

fn playlists_url(base_url: &str) -> String {
    format!("{}/me/playlists?limit={}", base_url, PLAYLISTS_PAGE_SIZE)
}

fn playlist_tracks_url(base_url: &str, playlist_id: &str) -> String {
    format!(
        "{}/playlists/{}/tracks?limit={}",
        base_url,
        urlencoding::encode(playlist_id),
        TRACKS_PAGE_SIZE
    )
}
