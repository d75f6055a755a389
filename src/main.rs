//! tubeport - Convert Spotify playlists into YouTube playlists

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod auth;
mod cli;
mod config;
mod convert;
mod platform;
mod spotify;
mod store;
mod youtube;

use cli::auth::AppCredentialArgs;
use cli::{Cli, Commands};
use config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "tubeport=debug,reqwest=debug"
    } else {
        "tubeport=info"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = AppConfig::load()?;
    let user = cli.user.as_str();

    match cli.command {
        Commands::Auth {
            spotify_client_id,
            spotify_client_secret,
            google_client_id,
            google_client_secret,
            force,
        } => {
            let args = AppCredentialArgs {
                spotify_client_id,
                spotify_client_secret,
                google_client_id,
                google_client_secret,
            };
            cli::commands::auth(&config, args, force).await?;
        }
        Commands::Connect {
            platform,
            access_token,
            refresh_token,
            expires_in,
            scope,
        } => {
            cli::commands::connect(
                &config,
                user,
                platform,
                access_token,
                refresh_token,
                expires_in,
                scope,
            )
            .await?;
        }
        Commands::Disconnect { platform } => {
            cli::commands::disconnect(user, platform).await?;
        }
        Commands::Playlists => {
            cli::commands::playlists(&config, user).await?;
        }
        Commands::Tracks { playlist } => {
            cli::commands::tracks(&config, user, &playlist).await?;
        }
        Commands::YoutubePlaylists => {
            cli::commands::youtube_playlists(&config, user).await?;
        }
        Commands::Convert {
            playlist,
            tracks,
            visibility,
            skip_duplicates,
        } => {
            cli::commands::convert(&config, user, playlist, tracks, visibility, skip_duplicates)
                .await?;
        }
        Commands::History { detailed } => {
            cli::commands::history(user, detailed).await?;
        }
        Commands::Delete { id } => {
            cli::commands::delete(user, &id).await?;
        }
        Commands::Config { init } => {
            cli::commands::config(&config, init)?;
        }
        Commands::Completion { shell } => {
            cli::commands::completion(shell);
        }
    }

    Ok(())
}
