//! CLI module for tubeport

use clap::{Parser, Subcommand};

use crate::platform::{Platform, Visibility};

pub mod auth;
pub mod commands;

pub use auth::AuthManager;

#[derive(Parser, Debug)]
#[command(name = "tubeport", about = "Convert Spotify playlists into YouTube playlists")]
#[command(version, author)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Local user whose linked accounts and history are used
    #[arg(short, long, global = true, env = "TUBEPORT_USER", default_value = "default")]
    pub user: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Configure OAuth application credentials for Spotify and Google
    Auth {
        /// Spotify app client id
        #[arg(long, env = "SPOTIFY_CLIENT_ID")]
        spotify_client_id: Option<String>,

        /// Spotify app client secret
        #[arg(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
        spotify_client_secret: Option<String>,

        /// Google OAuth client id
        #[arg(long, env = "GOOGLE_CLIENT_ID")]
        google_client_id: Option<String>,

        /// Google OAuth client secret
        #[arg(long, env = "GOOGLE_CLIENT_SECRET", hide_env_values = true)]
        google_client_secret: Option<String>,

        /// Force re-entry (ignore stored credentials)
        #[arg(long)]
        force: bool,
    },

    /// Link a platform account by storing its OAuth tokens
    Connect {
        #[arg(value_enum)]
        platform: Platform,

        /// Current access token
        #[arg(long, env = "TUBEPORT_ACCESS_TOKEN", hide_env_values = true)]
        access_token: Option<String>,

        /// Refresh token used to renew the access token
        #[arg(long, env = "TUBEPORT_REFRESH_TOKEN", hide_env_values = true)]
        refresh_token: Option<String>,

        /// Seconds until the access token expires
        #[arg(long, default_value = "3600")]
        expires_in: i64,

        /// Granted scopes, space separated
        #[arg(long)]
        scope: Option<String>,
    },

    /// Remove a linked platform account
    Disconnect {
        #[arg(value_enum)]
        platform: Platform,
    },

    /// List your Spotify playlists
    Playlists,

    /// List the tracks of a Spotify playlist
    Tracks {
        /// Spotify playlist id
        playlist: String,
    },

    /// List the playlists on your YouTube channel
    YoutubePlaylists,

    /// Convert a Spotify playlist into a new YouTube playlist
    Convert {
        /// Spotify playlist id
        playlist: String,

        /// Only convert these track ids (comma separated, see `tracks`)
        #[arg(long, value_delimiter = ',')]
        tracks: Vec<String>,

        /// Privacy of the new playlist (defaults to the configured visibility)
        #[arg(long, value_enum)]
        visibility: Option<Visibility>,

        /// Add each matched video at most once
        #[arg(long)]
        skip_duplicates: bool,
    },

    /// Show past conversions, newest first
    History {
        /// Show errors and per-track counts
        #[arg(short, long)]
        detailed: bool,
    },

    /// Delete a conversion record
    Delete {
        /// Conversion id (from `history`)
        id: String,
    },

    /// Show or initialise the configuration file
    Config {
        /// Write the current settings to the config file
        #[arg(long)]
        init: bool,
    },

    /// Generate shell completions
    Completion {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}
