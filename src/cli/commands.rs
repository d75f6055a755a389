//! CLI command handlers

use anyhow::{Context, Result};
use clap_complete::generate;
use colored::Colorize;
use dialoguer::Password;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::auth::AppCredentialArgs;
use super::AuthManager;
use crate::auth::{OAuthRefresher, StoredToken, TokenCache};
use crate::config::AppConfig;
use crate::convert::{
    ConversionEngine, ConversionProgress, ConversionRequest, ConversionStatus, TrackOutcome,
};
use crate::platform::{Platform, Visibility};
use crate::spotify::SpotifyClient;
use crate::store::{ConversionStore, CredentialStore, JsonFileStore};
use crate::youtube::YoutubeClient;

/// Everything a command needs to talk to the platforms
struct Services {
    store: Arc<JsonFileStore>,
    spotify: Arc<SpotifyClient>,
    youtube: Arc<YoutubeClient>,
}

impl Services {
    async fn open(config: &AppConfig) -> Result<Self> {
        let store = Arc::new(open_store().await?);
        let apps = AuthManager::load();

        let refresher = OAuthRefresher::new(
            &config.spotify_token_url,
            &config.google_token_url,
            apps.spotify,
            apps.google,
        )?;
        let tokens = Arc::new(
            TokenCache::new(store.clone(), Arc::new(refresher))
                .with_ttl(config.token_cache_ttl())
                .with_expiry_buffer(config.expiry_buffer()),
        );

        let spotify = Arc::new(
            SpotifyClient::new(&config.spotify_api_url, tokens.clone())
                .context("Failed to create Spotify client")?,
        );
        let youtube = Arc::new(
            YoutubeClient::new(&config.youtube_api_url, tokens)
                .context("Failed to create YouTube client")?,
        );

        Ok(Self {
            store,
            spotify,
            youtube,
        })
    }

    fn engine(&self) -> ConversionEngine {
        ConversionEngine::new(
            self.spotify.clone(),
            self.youtube.clone(),
            self.youtube.clone(),
            self.store.clone(),
        )
    }
}

async fn open_store() -> Result<JsonFileStore> {
    JsonFileStore::open_default()
        .await
        .context("Failed to open tubeport store")
}

/// Handle the `auth` command
pub async fn auth(config: &AppConfig, args: AppCredentialArgs, force: bool) -> Result<()> {
    println!("{}", "Configuring OAuth app credentials...".cyan());

    let creds = AuthManager::configure(config, args, force).await?;

    println!();
    println!("{}", "App credentials verified!".green().bold());
    if let Some(app) = &creds.spotify {
        println!("  Spotify client: {}", app.client_id);
    }
    if let Some(app) = &creds.google {
        println!("  Google client:  {}", app.client_id);
    }
    println!();
    println!("Credentials stored securely in system keyring.");

    Ok(())
}

/// Handle the `connect` command
pub async fn connect(
    config: &AppConfig,
    user: &str,
    platform: Platform,
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: i64,
    scope: Option<String>,
) -> Result<()> {
    let access_token = match access_token {
        Some(token) => token,
        None => Password::new()
            .with_prompt(format!("{} access token", platform))
            .interact()
            .context("Failed to read access token")?,
    };

    if refresh_token.is_none() {
        println!(
            "{}",
            format!(
                "No refresh token given; reconnect when the {} token expires.",
                platform
            )
            .yellow()
        );
    }

    let token = StoredToken::new(access_token.trim().to_string(), refresh_token, expires_in, scope);
    let services = Services::open(config).await?;
    services
        .store
        .save_token(user, platform, &token)
        .await
        .context("Failed to save token")?;

    println!("Checking {} account...", platform);
    let check = match platform {
        Platform::Spotify => services
            .spotify
            .current_user(user)
            .await
            .map(|profile| profile.display_name.unwrap_or(profile.id)),
        Platform::Youtube => services
            .youtube
            .get_playlists(user)
            .await
            .map(|playlists| format!("{} playlists", playlists.len())),
    };

    match check {
        Ok(account) => {
            println!(
                "{} {} connected for {} ({})",
                "✓".green(),
                platform,
                user.bold(),
                account
            );
        }
        Err(e) => {
            println!("{} Token saved but could not be verified: {}", "!".yellow(), e);
        }
    }

    Ok(())
}

/// Handle the `disconnect` command
pub async fn disconnect(user: &str, platform: Platform) -> Result<()> {
    let store = open_store().await?;

    if store.remove_token(user, platform).await? {
        println!("{} disconnected for {}", platform, user.bold());
    } else {
        println!("{}", format!("{} was not connected for {}", platform, user).yellow());
    }

    Ok(())
}

/// Handle the `playlists` command
pub async fn playlists(config: &AppConfig, user: &str) -> Result<()> {
    let services = Services::open(config).await?;
    let playlists = services
        .spotify
        .get_playlists(user)
        .await
        .context("Failed to fetch Spotify playlists")?;

    if playlists.is_empty() {
        println!("{}", "No Spotify playlists found.".yellow());
        return Ok(());
    }

    println!("{}", "Spotify playlists:".green().bold());
    for playlist in &playlists {
        let count = playlist.tracks.as_ref().map(|t| t.total).unwrap_or(0);
        println!(
            "  {} - {} ({} tracks)",
            playlist.id.cyan(),
            playlist.name,
            count
        );
    }
    println!();
    println!("Convert one with {}", "tubeport convert <ID>".cyan());

    Ok(())
}

/// Handle the `tracks` command
pub async fn tracks(config: &AppConfig, user: &str, playlist_id: &str) -> Result<()> {
    use crate::platform::SourcePlatform;

    let services = Services::open(config).await?;
    let tracks = services
        .spotify
        .list_tracks(user, playlist_id, &[])
        .await
        .with_context(|| format!("Failed to fetch tracks of playlist {}", playlist_id))?;

    if tracks.is_empty() {
        println!("{}", "Playlist has no convertible tracks.".yellow());
        return Ok(());
    }

    for (idx, track) in tracks.iter().enumerate() {
        let secs = track.duration_ms / 1000;
        println!(
            "{:>4}. {} - {} ({}:{:02})  {}",
            idx + 1,
            track.title,
            track.artists.join(", "),
            secs / 60,
            secs % 60,
            track.id.dimmed()
        );
    }
    println!();
    println!(
        "Pick tracks with {}",
        format!("tubeport convert {} --tracks <ID>,<ID>", playlist_id).cyan()
    );

    Ok(())
}

/// Handle the `youtube-playlists` command
pub async fn youtube_playlists(config: &AppConfig, user: &str) -> Result<()> {
    let services = Services::open(config).await?;
    let playlists = services
        .youtube
        .get_playlists(user)
        .await
        .context("Failed to fetch YouTube playlists")?;

    if playlists.is_empty() {
        println!("{}", "No YouTube playlists found.".yellow());
        return Ok(());
    }

    println!("{}", "YouTube playlists:".green().bold());
    for playlist in &playlists {
        let count = playlist
            .content_details
            .as_ref()
            .map(|c| c.item_count)
            .unwrap_or(0);
        let privacy = playlist
            .status
            .as_ref()
            .map(|s| s.privacy_status.as_str())
            .unwrap_or("unknown");
        println!(
            "  {} - {} ({} videos, {})",
            playlist.id.cyan(),
            playlist.snippet.title,
            count,
            privacy
        );
    }

    Ok(())
}

/// Handle the `convert` command
pub async fn convert(
    config: &AppConfig,
    user: &str,
    playlist_id: String,
    tracks: Vec<String>,
    visibility: Option<Visibility>,
    skip_duplicates: bool,
) -> Result<()> {
    let services = Services::open(config).await?;
    let engine = services.engine();

    let request = ConversionRequest {
        user_id: user.to_string(),
        source_playlist_id: playlist_id,
        selected_ids: tracks,
        visibility: visibility.unwrap_or(config.default_visibility),
        skip_duplicates,
    };

    println!(
        "Converting Spotify playlist {} to YouTube ({})...",
        request.source_playlist_id.cyan(),
        request.visibility.as_str()
    );

    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("#>-"),
    );

    let (tx, mut rx) = mpsc::channel(32);
    let show_progress = async {
        while let Some(event) = rx.recv().await {
            match event {
                ConversionProgress::Started {
                    target_playlist_id,
                    total,
                    ..
                } => {
                    progress.set_length(total as u64);
                    progress.println(format!("Created YouTube playlist {}", target_playlist_id.cyan()));
                }
                ConversionProgress::Track {
                    processed,
                    current_track,
                    outcome,
                    ..
                } => {
                    match outcome {
                        TrackOutcome::NoMatch => progress.println(format!(
                            "  {} {}",
                            "no match:".yellow(),
                            current_track
                        )),
                        TrackOutcome::Duplicate { .. } => progress.println(format!(
                            "  {} {}",
                            "duplicate:".yellow(),
                            current_track
                        )),
                        TrackOutcome::Failed { error } => progress.println(format!(
                            "  {} {} ({})",
                            "failed:".red(),
                            current_track,
                            error
                        )),
                        TrackOutcome::Transferred { .. } => {}
                    }
                    progress.set_position(processed as u64);
                    progress.set_message(current_track);
                }
                ConversionProgress::Completed { .. } => {
                    progress.finish_with_message("done");
                }
            }
        }
    };

    let (result, ()) = tokio::join!(engine.convert_with_progress(&request, Some(tx)), show_progress);

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            progress.abandon();
            return Err(e).context("Conversion failed");
        }
    };

    println!();
    println!("{}", "Conversion complete!".green().bold());
    println!("  Conversion: {}", outcome.conversion_id);
    println!(
        "  Playlist:   https://www.youtube.com/playlist?list={}",
        outcome.target_playlist_id
    );
    println!("  Added:      {}", outcome.counts.transferred.to_string().green());
    if outcome.counts.skipped > 0 {
        println!("  Skipped:    {}", outcome.counts.skipped.to_string().yellow());
    }
    if outcome.counts.failed > 0 {
        println!("  Failed:     {}", outcome.counts.failed.to_string().red());
    }
    println!("  Total:      {}", outcome.total);

    Ok(())
}

/// Handle the `history` command
pub async fn history(user: &str, detailed: bool) -> Result<()> {
    let store = open_store().await?;
    let conversions = store.list_for_user(user).await?;

    if conversions.is_empty() {
        println!("{}", format!("No conversions for {}.", user).yellow());
        return Ok(());
    }

    for c in &conversions {
        let status = match c.status {
            ConversionStatus::Completed => c.status.to_string().green(),
            ConversionStatus::Failed => c.status.to_string().red(),
            ConversionStatus::Processing => c.status.to_string().yellow(),
        };
        println!(
            "{}  {}  {} {} -> {} {}  {:>3.0}%",
            c.id.bold(),
            c.created_at.format("%Y-%m-%d %H:%M"),
            status,
            c.source_playlist_id,
            c.target_type,
            c.target_playlist_id.as_deref().unwrap_or("-"),
            c.progress
        );

        if detailed {
            println!(
                "    {} tracks: {} added, {} skipped, {} failed",
                c.total_tracks, c.counts.transferred, c.counts.skipped, c.counts.failed
            );
            if let Some(error) = &c.error {
                println!("    Error: {}", error.red());
            }
            println!("    Updated: {}", c.updated_at.format("%Y-%m-%d %H:%M:%S"));
        }
    }

    Ok(())
}

/// Handle the `delete` command
pub async fn delete(user: &str, id: &str) -> Result<()> {
    let store = open_store().await?;

    if store.delete(user, id).await? {
        println!("Deleted conversion {}", id);
        Ok(())
    } else {
        anyhow::bail!(
            "Conversion '{}' not found for {}. Run 'tubeport history' to list conversions.",
            id,
            user
        )
    }
}

/// Handle the `config` command
pub fn config(config: &AppConfig, init: bool) -> Result<()> {
    if init {
        let path = config.save()?;
        println!("Wrote config to {}", path.display());
    } else {
        println!("Config file: {}", AppConfig::config_path()?.display());
    }

    let contents = serde_json::to_string_pretty(config).context("Failed to serialize config")?;
    println!("{}", contents);
    Ok(())
}

/// Handle the `completion` command
pub fn completion(shell: clap_complete::Shell) {
    let mut cmd = <super::Cli as clap::CommandFactory>::command();
    generate(shell, &mut cmd, "tubeport", &mut io::stdout());
}
