//! Token access layer: stored OAuth tokens, refresh, and the shared cache

pub mod cache;
pub mod refresh;
pub mod token;

use thiserror::Error;

use crate::platform::Platform;

pub use cache::TokenCache;
pub use refresh::{OAuthApp, OAuthRefresher, TokenRefresher};
pub use token::StoredToken;

/// Failures while obtaining an access token.
///
/// `Clone` so that every caller awaiting the same in-flight refresh gets
/// the same error.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("{platform} is not connected for user {user_id}; run 'tubeport connect {platform_arg}' first")]
    NotConnected {
        user_id: String,
        platform: Platform,
        platform_arg: &'static str,
    },

    #[error("failed to refresh {platform} token: {message}")]
    Refresh { platform: Platform, message: String },

    #[error("credential store error: {0}")]
    Store(String),

    #[error("failed to create HTTP client: {0}")]
    HttpClient(String),
}

impl AuthError {
    pub fn not_connected(user_id: &str, platform: Platform) -> Self {
        AuthError::NotConnected {
            user_id: user_id.to_string(),
            platform,
            platform_arg: match platform {
                Platform::Spotify => "spotify",
                Platform::Youtube => "youtube",
            },
        }
    }

    pub fn refresh(platform: Platform, message: impl Into<String>) -> Self {
        AuthError::Refresh {
            platform,
            message: message.into(),
        }
    }
}
