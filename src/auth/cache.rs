//! Process-wide access token cache with single-flight refresh
//!
//! Tokens are keyed by (user id, platform). A lookup that misses the cache
//! loads the stored token and refreshes it if it is about to expire. While
//! that resolution is running, every other lookup for the same key awaits
//! the same shared future, so one expired token costs exactly one refresh
//! request no matter how many callers need it.
//!
//! `invalidate` bumps a per-key generation. A resolution that started before
//! the bump never populates the cache, and a lookup arriving afterwards does
//! not join it but starts a forced refresh of its own.

use chrono::Duration as ChronoDuration;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::{AuthError, StoredToken, TokenRefresher};
use crate::platform::Platform;
use crate::store::CredentialStore;

type Key = (String, Platform);
type Resolution = Shared<BoxFuture<'static, Result<StoredToken, AuthError>>>;

struct CachedToken {
    token: StoredToken,
    cached_at: Instant,
}

struct InFlight {
    id: u64,
    forced: bool,
    resolution: Resolution,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<Key, CachedToken>,
    in_flight: HashMap<Key, InFlight>,
    /// Keys whose stored token was rejected and must be refreshed next time
    stale: HashSet<Key>,
    /// Bumped by every `invalidate`
    generations: HashMap<Key, u64>,
    next_id: u64,
}

impl CacheState {
    fn generation(&self, key: &Key) -> u64 {
        self.generations.get(key).copied().unwrap_or(0)
    }
}

pub struct TokenCache {
    state: Arc<Mutex<CacheState>>,
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn TokenRefresher>,
    ttl: Duration,
    expiry_buffer: ChronoDuration,
}

impl TokenCache {
    /// Provider tokens live for an hour; stop trusting the cache before that
    pub const DEFAULT_TTL: Duration = Duration::from_secs(55 * 60);
    pub const DEFAULT_EXPIRY_BUFFER_SECS: i64 = 5 * 60;

    pub fn new(store: Arc<dyn CredentialStore>, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState::default())),
            store,
            refresher,
            ttl: Self::DEFAULT_TTL,
            expiry_buffer: ChronoDuration::seconds(Self::DEFAULT_EXPIRY_BUFFER_SECS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_expiry_buffer(mut self, buffer: ChronoDuration) -> Self {
        self.expiry_buffer = buffer;
        self
    }

    /// Return a currently valid access token, refreshing it if needed
    pub async fn get_or_refresh(&self, user_id: &str, platform: Platform) -> Result<String, AuthError> {
        let key = (user_id.to_string(), platform);

        let resolution = {
            let mut state = lock(&self.state);

            if let Some(cached) = state.entries.get(&key) {
                if cached.cached_at.elapsed() < self.ttl
                    && !cached.token.is_expired(self.expiry_buffer)
                {
                    return Ok(cached.token.access_token.clone());
                }
                state.entries.remove(&key);
            }

            // A lookup after `invalidate` may only join a forced resolution
            let stale = state.stale.contains(&key);
            let joinable = state
                .in_flight
                .get(&key)
                .filter(|existing| existing.forced || !stale)
                .map(|existing| existing.resolution.clone());

            match joinable {
                Some(existing) => {
                    debug!("Joining in-flight {} token resolution for {}", platform, user_id);
                    existing
                }
                None => {
                    let force = state.stale.remove(&key);
                    let id = state.next_id;
                    state.next_id += 1;
                    let generation = state.generation(&key);
                    let resolution = self.resolve(key.clone(), force, id, generation).shared();
                    state.in_flight.insert(
                        key,
                        InFlight {
                            id,
                            forced: force,
                            resolution: resolution.clone(),
                        },
                    );
                    resolution
                }
            }
        };

        resolution.await.map(|token| token.access_token)
    }

    /// Drop the cached token and force the next lookup to refresh
    pub fn invalidate(&self, user_id: &str, platform: Platform) {
        let key = (user_id.to_string(), platform);
        let mut state = lock(&self.state);
        state.entries.remove(&key);
        *state.generations.entry(key.clone()).or_insert(0) += 1;
        state.stale.insert(key);
        debug!("Invalidated {} token for {}", platform, user_id);
    }

    fn resolve(
        &self,
        key: Key,
        force: bool,
        id: u64,
        generation: u64,
    ) -> BoxFuture<'static, Result<StoredToken, AuthError>> {
        let store = Arc::clone(&self.store);
        let refresher = Arc::clone(&self.refresher);
        let state = Arc::clone(&self.state);
        let buffer = self.expiry_buffer;

        async move {
            let result =
                load_or_refresh(store.as_ref(), refresher.as_ref(), &key, force, buffer).await;

            let mut state = lock(&state);
            if state.in_flight.get(&key).is_some_and(|f| f.id == id) {
                state.in_flight.remove(&key);
            }
            if state.generation(&key) != generation {
                debug!("Discarding {} token resolved before invalidation", key.1);
                return result;
            }
            match &result {
                Ok(token) => {
                    state.entries.insert(
                        key,
                        CachedToken {
                            token: token.clone(),
                            cached_at: Instant::now(),
                        },
                    );
                }
                Err(_) if force => {
                    // The stored token is still known bad
                    state.stale.insert(key);
                }
                Err(_) => {}
            }
            result
        }
        .boxed()
    }
}

async fn load_or_refresh(
    store: &dyn CredentialStore,
    refresher: &dyn TokenRefresher,
    key: &Key,
    force: bool,
    buffer: ChronoDuration,
) -> Result<StoredToken, AuthError> {
    let (user_id, platform) = (key.0.as_str(), key.1);

    let stored = store
        .load_token(user_id, platform)
        .await
        .map_err(|e| AuthError::Store(e.to_string()))?
        .ok_or_else(|| AuthError::not_connected(user_id, platform))?;

    if !force && !stored.is_expired(buffer) {
        debug!("Using stored {} token for {}", platform, user_id);
        return Ok(stored);
    }

    if force {
        info!("{} token for {} was rejected, refreshing", platform, user_id);
    } else {
        info!("{} token for {} expired, refreshing", platform, user_id);
    }

    let refreshed = refresher.refresh(platform, &stored).await?;

    store
        .save_token(user_id, platform, &refreshed)
        .await
        .map_err(|e| AuthError::Store(e.to_string()))?;

    Ok(refreshed)
}

fn lock(state: &Mutex<CacheState>) -> MutexGuard<'_, CacheState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
