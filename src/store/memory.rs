//! In-memory store for tests

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{ConversionStore, CredentialStore, StoreData, StoreError};
use crate::auth::StoredToken;
use crate::convert::record::{Conversion, ConversionUpdate, NewConversion};
use crate::platform::Platform;

#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<StoreData>,
    /// Record state after every accepted update
    history: Mutex<Vec<Conversion>>,
    /// Simulated latency of `load_token`
    load_delay: std::time::Duration,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(StoreData::new()),
            history: Mutex::new(Vec::new()),
            load_delay: std::time::Duration::ZERO,
        }
    }

    pub fn with_load_delay(mut self, delay: std::time::Duration) -> Self {
        self.load_delay = delay;
        self
    }

    /// States of one conversion after each accepted update, oldest first
    pub async fn history(&self, id: &str) -> Vec<Conversion> {
        self.history
            .lock()
            .await
            .iter()
            .filter(|c| c.id == id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ConversionStore for MemoryStore {
    async fn create(&self, new: NewConversion) -> Result<Conversion, StoreError> {
        Ok(self.data.lock().await.create(new))
    }

    async fn update(&self, id: &str, update: ConversionUpdate) -> Result<Conversion, StoreError> {
        let updated = self.data.lock().await.update(id, update)?;
        self.history.lock().await.push(updated.clone());
        Ok(updated)
    }

    async fn get(&self, id: &str) -> Result<Option<Conversion>, StoreError> {
        Ok(self.data.lock().await.conversions.get(id).cloned())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Conversion>, StoreError> {
        Ok(self.data.lock().await.list_for_user(user_id))
    }

    async fn delete(&self, user_id: &str, id: &str) -> Result<bool, StoreError> {
        Ok(self.data.lock().await.delete(user_id, id))
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn load_token(
        &self,
        user_id: &str,
        platform: Platform,
    ) -> Result<Option<StoredToken>, StoreError> {
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }
        Ok(self.data.lock().await.load_token(user_id, platform))
    }

    async fn save_token(
        &self,
        user_id: &str,
        platform: Platform,
        token: &StoredToken,
    ) -> Result<(), StoreError> {
        self.data.lock().await.save_token(user_id, platform, token);
        Ok(())
    }

    async fn remove_token(&self, user_id: &str, platform: Platform) -> Result<bool, StoreError> {
        Ok(self.data.lock().await.remove_token(user_id, platform))
    }
}
