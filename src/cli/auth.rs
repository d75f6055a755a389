//! Keyring-based storage for OAuth application credentials

use anyhow::{Context, Result};
use dialoguer::{Input, Password};
use keyring::Entry;
use tracing::{debug, info};

use crate::auth::{OAuthApp, OAuthRefresher};
use crate::config::AppConfig;

const KEYRING_SERVICE: &str = "tubeport";

/// OAuth apps used to refresh linked accounts
#[derive(Debug, Clone, Default)]
pub struct AppCredentials {
    pub spotify: Option<OAuthApp>,
    pub google: Option<OAuthApp>,
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct AppCredentialArgs {
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
}

/// Manages OAuth app credential storage
pub struct AuthManager;

impl AuthManager {
    /// Configure both OAuth apps
    ///
    /// Keeps stored credentials unless `force` is set, prompts for anything
    /// missing, and verifies the Spotify app before storing.
    pub async fn configure(
        config: &AppConfig,
        args: AppCredentialArgs,
        force: bool,
    ) -> Result<AppCredentials> {
        let stored = if force {
            debug!("Force flag set, ignoring stored credentials");
            AppCredentials::default()
        } else {
            Self::load()
        };

        let spotify = match (stored.spotify, args.spotify_client_id, args.spotify_client_secret) {
            (_, Some(id), Some(secret)) => OAuthApp {
                client_id: id,
                client_secret: secret,
            },
            (Some(app), None, None) => {
                info!("Found existing Spotify app credentials in keyring");
                app
            }
            (_, id, secret) => Self::prompt_app("Spotify", id, secret)?,
        };

        let google = match (stored.google, args.google_client_id, args.google_client_secret) {
            (_, Some(id), Some(secret)) => OAuthApp {
                client_id: id,
                client_secret: secret,
            },
            (Some(app), None, None) => {
                info!("Found existing Google app credentials in keyring");
                app
            }
            (_, id, secret) => Self::prompt_app("Google", id, secret)?,
        };

        let refresher = OAuthRefresher::new(
            &config.spotify_token_url,
            &config.google_token_url,
            Some(spotify.clone()),
            Some(google.clone()),
        )?;
        refresher
            .verify_spotify_app()
            .await
            .context("Failed to verify Spotify app credentials")?;

        let creds = AppCredentials {
            spotify: Some(spotify),
            google: Some(google),
        };
        Self::store(&creds)?;
        info!("App credentials stored in keyring");

        Ok(creds)
    }

    /// Load whatever credentials the keyring holds
    pub fn load() -> AppCredentials {
        AppCredentials {
            spotify: Self::load_app("spotify"),
            google: Self::load_app("google"),
        }
    }

    pub fn store(creds: &AppCredentials) -> Result<()> {
        if let Some(app) = &creds.spotify {
            Self::store_app("spotify", app)?;
        }
        if let Some(app) = &creds.google {
            Self::store_app("google", app)?;
        }
        Ok(())
    }

    fn prompt_app(
        name: &str,
        client_id: Option<String>,
        client_secret: Option<String>,
    ) -> Result<OAuthApp> {
        let client_id = match client_id {
            Some(id) => id,
            None => Input::new()
                .with_prompt(format!("{} client id", name))
                .interact_text()
                .with_context(|| format!("Failed to read {} client id", name))?,
        };

        let client_secret = match client_secret {
            Some(secret) => secret,
            None => Password::new()
                .with_prompt(format!("{} client secret", name))
                .interact()
                .with_context(|| format!("Failed to read {} client secret", name))?,
        };

        Ok(OAuthApp {
            client_id: client_id.trim().to_string(),
            client_secret: client_secret.trim().to_string(),
        })
    }

    fn load_app(provider: &str) -> Option<OAuthApp> {
        let read = |key: &str| -> Result<String> {
            Self::get_entry(provider, key)?
                .get_password()
                .with_context(|| format!("No {} {} in keyring", provider, key))
        };

        match (read("client_id"), read("client_secret")) {
            (Ok(client_id), Ok(client_secret)) => Some(OAuthApp {
                client_id,
                client_secret,
            }),
            (Err(e), _) | (_, Err(e)) => {
                debug!("{:#}", e);
                None
            }
        }
    }

    fn store_app(provider: &str, app: &OAuthApp) -> Result<()> {
        Self::get_entry(provider, "client_id")?
            .set_password(&app.client_id)
            .with_context(|| format!("Failed to store {} client id in keyring", provider))?;

        Self::get_entry(provider, "client_secret")?
            .set_password(&app.client_secret)
            .with_context(|| format!("Failed to store {} client secret in keyring", provider))?;

        debug!("{} app credentials stored in keyring", provider);
        Ok(())
    }

    /// Get a keyring entry, e.g. `spotify:client_id`
    fn get_entry(provider: &str, key: &str) -> Result<Entry> {
        let entry_key = format!("{}:{}", provider, key);
        Entry::new(KEYRING_SERVICE, &entry_key).context("Failed to access keyring")
    }
}
