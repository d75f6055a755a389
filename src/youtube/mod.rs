//! YouTube destination platform

pub mod client;
pub mod models;

pub use client::{search_query, YoutubeClient};
pub use models::*;
