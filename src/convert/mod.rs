//! Playlist conversion engine

pub mod engine;
pub mod record;

use thiserror::Error;

use crate::auth::AuthError;
use crate::platform::ApiError;
use crate::store::StoreError;

pub use engine::{ConversionEngine, ConversionOutcome, ConversionProgress, ConversionRequest, TrackOutcome};
pub use record::{Conversion, ConversionStatus, TrackCounts};

/// Setup failures that abort a conversion and mark its record failed
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{platform} playlist {playlist_id} not found")]
    SourceNotFound {
        platform: crate::platform::Platform,
        playlist_id: String,
    },

    #[error("{step}: {source}")]
    Api {
        step: &'static str,
        #[source]
        source: ApiError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ConvertError {
    /// Wrap a platform error raised during `step`, unwrapping token errors
    pub fn api(step: &'static str, err: ApiError) -> Self {
        match err {
            ApiError::Auth(auth) => ConvertError::Auth(auth),
            source => ConvertError::Api { step, source },
        }
    }
}
