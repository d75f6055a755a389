//! Document store for conversion records and linked platform tokens

pub mod json;
#[cfg(test)]
mod memory;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::auth::StoredToken;
use crate::convert::record::{Conversion, ConversionUpdate, NewConversion};
use crate::platform::Platform;

pub use json::JsonFileStore;
#[cfg(test)]
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conversion {0} not found")]
    NotFound(String),

    #[error("invalid update for conversion {id}: {reason}")]
    InvalidUpdate { id: String, reason: String },

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store data is corrupt: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Conversion records, scoped by owner
#[async_trait]
pub trait ConversionStore: Send + Sync {
    /// Insert a new record; the store assigns the id
    async fn create(&self, new: NewConversion) -> Result<Conversion, StoreError>;

    async fn update(&self, id: &str, update: ConversionUpdate) -> Result<Conversion, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Conversion>, StoreError>;

    /// All records owned by `user_id`, newest first
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Conversion>, StoreError>;

    /// Delete a record owned by `user_id`. Returns false if there was none.
    async fn delete(&self, user_id: &str, id: &str) -> Result<bool, StoreError>;
}

/// Linked platform tokens per user
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load_token(
        &self,
        user_id: &str,
        platform: Platform,
    ) -> Result<Option<StoredToken>, StoreError>;

    async fn save_token(
        &self,
        user_id: &str,
        platform: Platform,
        token: &StoredToken,
    ) -> Result<(), StoreError>;

    async fn remove_token(&self, user_id: &str, platform: Platform) -> Result<bool, StoreError>;
}

/// Tokens linked to one user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserTokens {
    #[serde(rename = "spotifyTokens", default, skip_serializing_if = "Option::is_none")]
    pub spotify: Option<StoredToken>,
    #[serde(rename = "googleTokens", default, skip_serializing_if = "Option::is_none")]
    pub youtube: Option<StoredToken>,
}

impl UserTokens {
    fn slot(&mut self, platform: Platform) -> &mut Option<StoredToken> {
        match platform {
            Platform::Spotify => &mut self.spotify,
            Platform::Youtube => &mut self.youtube,
        }
    }

    fn get(&self, platform: Platform) -> Option<&StoredToken> {
        match platform {
            Platform::Spotify => self.spotify.as_ref(),
            Platform::Youtube => self.youtube.as_ref(),
        }
    }
}

/// Everything the store holds. Both backends operate on this.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub conversions: BTreeMap<String, Conversion>,
    #[serde(default)]
    pub users: BTreeMap<String, UserTokens>,
}

impl StoreData {
    pub const VERSION: u32 = 1;

    pub fn new() -> Self {
        Self {
            version: Self::VERSION,
            ..Default::default()
        }
    }

    fn create(&mut self, new: NewConversion) -> Conversion {
        let mut id = generate_id();
        while self.conversions.contains_key(&id) {
            id = generate_id();
        }
        let conversion = Conversion::new(id.clone(), new, Utc::now());
        self.conversions.insert(id, conversion.clone());
        conversion
    }

    fn update(&mut self, id: &str, update: ConversionUpdate) -> Result<Conversion, StoreError> {
        let conversion = self
            .conversions
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        conversion.apply(update, Utc::now())?;
        Ok(conversion.clone())
    }

    fn list_for_user(&self, user_id: &str) -> Vec<Conversion> {
        let mut list: Vec<Conversion> = self
            .conversions
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list
    }

    fn delete(&mut self, user_id: &str, id: &str) -> bool {
        match self.conversions.get(id) {
            Some(c) if c.user_id == user_id => self.conversions.remove(id).is_some(),
            _ => false,
        }
    }

    fn load_token(&self, user_id: &str, platform: Platform) -> Option<StoredToken> {
        self.users
            .get(user_id)
            .and_then(|tokens| tokens.get(platform))
            .cloned()
    }

    fn save_token(&mut self, user_id: &str, platform: Platform, token: &StoredToken) {
        *self
            .users
            .entry(user_id.to_string())
            .or_default()
            .slot(platform) = Some(token.clone());
    }

    fn remove_token(&mut self, user_id: &str, platform: Platform) -> bool {
        self.users
            .get_mut(user_id)
            .and_then(|tokens| tokens.slot(platform).take())
            .is_some()
    }
}

/// Random 20 character alphanumeric document id
pub fn generate_id() -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(20)
        .map(char::from)
        .collect()
}
