//! JSON file backed store
//!
//! The whole store lives in one pretty-printed JSON document, by default at
//! `<data_local_dir>/tubeport/store.json`. Every mutation is written to a
//! temporary file and renamed over the old one, so a crash mid-write leaves
//! the previous state intact. Access is serialised across processes with an
//! advisory lock on `store.json.lock`.

use async_trait::async_trait;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::{ConversionStore, CredentialStore, StoreData, StoreError};
use crate::auth::StoredToken;
use crate::convert::record::{Conversion, ConversionUpdate, NewConversion};
use crate::platform::Platform;

const STORE_FILE: &str = "store.json";

/// Store backed by one JSON document shared by every tubeport process.
///
/// Nothing is cached in memory: reads load the file under a shared lock and
/// mutations reload, change and rewrite it under an exclusive lock.
pub struct JsonFileStore {
    path: PathBuf,
    lock_path: PathBuf,
}

/// Advisory lock on the `.lock` file next to the store, released on drop
struct StoreLock {
    file: File,
}

impl StoreLock {
    async fn acquire(path: &Path, exclusive: bool) -> Result<Self, StoreError> {
        let path = path.to_path_buf();
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<File> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)?;
            if exclusive {
                FileExt::lock_exclusive(&file)?;
            } else {
                FileExt::lock_shared(&file)?;
            }
            Ok(file)
        })
        .await
        .map_err(std::io::Error::other)??;

        Ok(Self { file })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl JsonFileStore {
    /// Open the store at `path`. A missing file is an empty store; a corrupt
    /// one is an error.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let lock_path = path.with_extension("json.lock");
        let store = Self { path, lock_path };

        let _lock = StoreLock::acquire(&store.lock_path, false).await?;
        let data = store.read().await?;
        debug!(
            "Opened store at {}: {} conversions, {} users",
            store.path.display(),
            data.conversions.len(),
            data.users.len()
        );

        Ok(store)
    }

    /// Open the store in the user's data directory
    pub async fn open_default() -> Result<Self, StoreError> {
        Self::open(Self::default_path()?).await
    }

    pub fn default_path() -> Result<PathBuf, StoreError> {
        let data_dir = dirs::data_local_dir().ok_or_else(|| {
            StoreError::Io(std::io::Error::other("could not determine data directory"))
        })?;
        Ok(data_dir.join("tubeport").join(STORE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current document. Callers hold the lock.
    async fn read(&self) -> Result<StoreData, StoreError> {
        if !fs::try_exists(&self.path).await? {
            return Ok(StoreData::new());
        }
        let contents = fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&contents)?)
    }

    async fn persist(&self, data: &StoreData) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let contents = serde_json::to_string_pretty(data)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, contents).await?;
        fs::rename(&tmp_path, &self.path).await?;

        debug!("Saved store to {}", self.path.display());
        Ok(())
    }

    async fn view<T>(&self, view: impl FnOnce(&StoreData) -> T) -> Result<T, StoreError> {
        let _lock = StoreLock::acquire(&self.lock_path, false).await?;
        let data = self.read().await?;
        Ok(view(&data))
    }

    /// Reload the document, apply `mutate` and write it back, all under the
    /// exclusive lock. Nothing is written if `mutate` fails.
    async fn mutate<T>(
        &self,
        mutate: impl FnOnce(&mut StoreData) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _lock = StoreLock::acquire(&self.lock_path, true).await?;
        let mut data = self.read().await?;
        let result = mutate(&mut data)?;
        self.persist(&data).await?;
        Ok(result)
    }
}

#[async_trait]
impl ConversionStore for JsonFileStore {
    async fn create(&self, new: NewConversion) -> Result<Conversion, StoreError> {
        self.mutate(|data| Ok(data.create(new))).await
    }

    async fn update(&self, id: &str, update: ConversionUpdate) -> Result<Conversion, StoreError> {
        self.mutate(|data| data.update(id, update)).await
    }

    async fn get(&self, id: &str) -> Result<Option<Conversion>, StoreError> {
        self.view(|data| data.conversions.get(id).cloned()).await
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Conversion>, StoreError> {
        self.view(|data| data.list_for_user(user_id)).await
    }

    async fn delete(&self, user_id: &str, id: &str) -> Result<bool, StoreError> {
        self.mutate(|data| Ok(data.delete(user_id, id))).await
    }
}

#[async_trait]
impl CredentialStore for JsonFileStore {
    async fn load_token(
        &self,
        user_id: &str,
        platform: Platform,
    ) -> Result<Option<StoredToken>, StoreError> {
        self.view(|data| data.load_token(user_id, platform)).await
    }

    async fn save_token(
        &self,
        user_id: &str,
        platform: Platform,
        token: &StoredToken,
    ) -> Result<(), StoreError> {
        self.mutate(|data| {
            data.save_token(user_id, platform, token);
            Ok(())
        })
        .await
    }

    async fn remove_token(&self, user_id: &str, platform: Platform) -> Result<bool, StoreError> {
        self.mutate(|data| Ok(data.remove_token(user_id, platform))).await
    }
}
