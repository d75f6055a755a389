//! OAuth refresh-token grant against the Spotify and Google token endpoints

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use super::{AuthError, StoredToken};
use crate::platform::Platform;

/// Exchanges a stored refresh credential for a new access token
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(
        &self,
        platform: Platform,
        current: &StoredToken,
    ) -> Result<StoredToken, AuthError>;
}

/// Registered OAuth application credentials
#[derive(Debug, Clone)]
pub struct OAuthApp {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
    #[serde(default)]
    scope: Option<String>,
}

fn default_expires_in() -> i64 {
    3600
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Refreshes tokens over HTTP
pub struct OAuthRefresher {
    http_client: Client,
    spotify_token_url: String,
    google_token_url: String,
    spotify: Option<OAuthApp>,
    google: Option<OAuthApp>,
}

impl OAuthRefresher {
    pub fn new(
        spotify_token_url: &str,
        google_token_url: &str,
        spotify: Option<OAuthApp>,
        google: Option<OAuthApp>,
    ) -> Result<Self, AuthError> {
        let http_client = build_http_client(concat!("tubeport/", env!("CARGO_PKG_VERSION")))?;

        Ok(Self {
            http_client,
            spotify_token_url: spotify_token_url.to_string(),
            google_token_url: google_token_url.to_string(),
            spotify,
            google,
        })
    }

    /// Check Spotify app credentials with a client-credentials grant
    pub async fn verify_spotify_app(&self) -> Result<(), AuthError> {
        let app = self.app(Platform::Spotify)?;
        debug!("Verifying Spotify client credentials against {}", self.spotify_token_url);

        let response = self
            .http_client
            .post(&self.spotify_token_url)
            .basic_auth(&app.client_id, Some(&app.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| AuthError::refresh(Platform::Spotify, e.to_string()))?;

        parse_token_response(Platform::Spotify, response).await?;
        info!("Spotify client credentials verified");
        Ok(())
    }

    fn app(&self, platform: Platform) -> Result<&OAuthApp, AuthError> {
        let app = match platform {
            Platform::Spotify => self.spotify.as_ref(),
            Platform::Youtube => self.google.as_ref(),
        };
        app.ok_or_else(|| {
            AuthError::refresh(
                platform,
                "OAuth client credentials are not configured; run 'tubeport auth'",
            )
        })
    }
}

fn build_http_client(user_agent: &str) -> Result<Client, AuthError> {
    Client::builder()
        .user_agent(user_agent)
        .build()
        .map_err(|e| AuthError::HttpClient(e.to_string()))
}

#[async_trait]
impl TokenRefresher for OAuthRefresher {
    async fn refresh(
        &self,
        platform: Platform,
        current: &StoredToken,
    ) -> Result<StoredToken, AuthError> {
        let refresh_token = current.refresh_token.as_deref().ok_or_else(|| {
            AuthError::refresh(
                platform,
                "no refresh token stored; reconnect the account to grant access again",
            )
        })?;
        let app = self.app(platform)?;

        info!("Refreshing {} access token", platform);

        let request = match platform {
            // Spotify wants the client in an Authorization: Basic header
            Platform::Spotify => self
                .http_client
                .post(&self.spotify_token_url)
                .basic_auth(&app.client_id, Some(&app.client_secret))
                .form(&[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token),
                ]),
            Platform::Youtube => self.http_client.post(&self.google_token_url).form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", app.client_id.as_str()),
                ("client_secret", app.client_secret.as_str()),
            ]),
        };

        let response = request
            .send()
            .await
            .map_err(|e| AuthError::refresh(platform, e.to_string()))?;

        let body = parse_token_response(platform, response).await?;

        // Providers may or may not rotate the refresh token
        Ok(StoredToken::new(
            body.access_token,
            body.refresh_token.or_else(|| current.refresh_token.clone()),
            body.expires_in,
            body.scope.or_else(|| current.scope.clone()),
        ))
    }
}

async fn parse_token_response(
    platform: Platform,
    response: reqwest::Response,
) -> Result<TokenResponse, AuthError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| AuthError::refresh(platform, e.to_string()))?;

    if !status.is_success() {
        return Err(AuthError::refresh(platform, describe_token_error(status.as_u16(), &text)));
    }

    serde_json::from_str(&text)
        .map_err(|e| AuthError::refresh(platform, format!("invalid token response: {}", e)))
}

fn describe_token_error(status: u16, body: &str) -> String {
    match serde_json::from_str::<TokenErrorResponse>(body) {
        Ok(err) => match err.error_description {
            Some(desc) => format!("{} ({})", err.error, desc),
            None => err.error,
        },
        Err(_) => format!("token endpoint returned status {}", status),
    }
}
