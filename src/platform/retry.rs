//! Bearer-token calls with a single retry after a 401

use std::future::Future;
use tracing::warn;

use super::{ApiError, Platform};
use crate::auth::TokenCache;

/// Run `call` with a valid access token for (`user_id`, `platform`).
///
/// If the platform answers 401 the cached token is invalidated and the call
/// is repeated exactly once with a freshly refreshed token. A second 401 is
/// returned to the caller.
pub async fn with_token_retry<T, F, Fut>(
    tokens: &TokenCache,
    user_id: &str,
    platform: Platform,
    mut call: F,
) -> Result<T, ApiError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let token = tokens.get_or_refresh(user_id, platform).await?;

    match call(token).await {
        Err(ApiError::Unauthorized) => {
            warn!("{} rejected access token for {}, refreshing", platform, user_id);
            tokens.invalidate(user_id, platform);
            let token = tokens.get_or_refresh(user_id, platform).await?;
            call(token).await
        }
        other => other,
    }
}
