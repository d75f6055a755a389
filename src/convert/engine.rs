//! Conversion orchestration
//!
//! A conversion runs as one sequential task:
//! 1. persist a new record (processing, 0%)
//! 2. look up the source playlist, create the destination playlist and
//!    record its id
//! 3. enumerate the source tracks
//! 4. for each track, search and append, persisting progress after every
//!    track whatever happened to it
//! 5. mark the record completed
//!
//! Anything that fails before the track loop fails the whole conversion.
//! Inside the loop failures are logged, counted and skipped.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::record::{ConversionUpdate, NewConversion, TrackCounts};
use super::ConvertError;
use crate::platform::{
    ApiError, Platform, PlaylistWriter, SourcePlatform, TargetMatcher, TrackDescriptor, Visibility,
};
use crate::store::ConversionStore;

/// YouTube rejects playlist titles longer than this
const MAX_TITLE_CHARS: usize = 150;
const UNTITLED: &str = "Untitled playlist";

/// What to convert and how
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub user_id: String,
    pub source_playlist_id: String,
    /// Track ids to convert; empty converts the whole playlist
    pub selected_ids: Vec<String>,
    pub visibility: Visibility,
    /// Do not append an item that this run already appended
    pub skip_duplicates: bool,
}

impl ConversionRequest {
    pub fn new(user_id: impl Into<String>, source_playlist_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            source_playlist_id: source_playlist_id.into(),
            selected_ids: Vec::new(),
            visibility: Visibility::default(),
            skip_duplicates: false,
        }
    }
}

/// What happened to one track
#[derive(Debug, Clone, PartialEq)]
pub enum TrackOutcome {
    Transferred { item_id: String },
    NoMatch,
    Duplicate { item_id: String },
    Failed { error: String },
}

/// Progress updates sent during a conversion
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionProgress {
    /// Destination playlist exists and the track list is known
    Started {
        conversion_id: String,
        target_playlist_id: String,
        total: usize,
    },
    /// A track was attempted. Sent after its progress is persisted.
    Track {
        processed: usize,
        total: usize,
        current_track: String,
        outcome: TrackOutcome,
    },
    /// The record is marked completed
    Completed { counts: TrackCounts },
}

/// Result of a successful conversion
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionOutcome {
    pub conversion_id: String,
    pub target_playlist_id: String,
    pub total: usize,
    pub counts: TrackCounts,
}

/// Drives a conversion from a source platform to a destination platform
pub struct ConversionEngine {
    source: Arc<dyn SourcePlatform>,
    matcher: Arc<dyn TargetMatcher>,
    writer: Arc<dyn PlaylistWriter>,
    store: Arc<dyn ConversionStore>,
}

impl ConversionEngine {
    pub fn new(
        source: Arc<dyn SourcePlatform>,
        matcher: Arc<dyn TargetMatcher>,
        writer: Arc<dyn PlaylistWriter>,
        store: Arc<dyn ConversionStore>,
    ) -> Self {
        Self {
            source,
            matcher,
            writer,
            store,
        }
    }

    /// Run a conversion without progress reporting
    pub async fn convert(&self, request: &ConversionRequest) -> Result<ConversionOutcome, ConvertError> {
        self.convert_with_progress(request, None).await
    }

    /// Run a conversion, sending progress updates to a channel.
    ///
    /// A closed channel is ignored; the conversion keeps going.
    pub async fn convert_with_progress(
        &self,
        request: &ConversionRequest,
        progress_tx: Option<mpsc::Sender<ConversionProgress>>,
    ) -> Result<ConversionOutcome, ConvertError> {
        let conversion = self
            .store
            .create(NewConversion {
                user_id: request.user_id.clone(),
                source_playlist_id: request.source_playlist_id.clone(),
                source_type: self.source.platform(),
                target_type: self.writer.platform(),
            })
            .await?;

        info!(
            "Conversion {}: {} playlist {} -> {}",
            conversion.id,
            self.source.platform(),
            request.source_playlist_id,
            self.writer.platform()
        );

        match self.run(&conversion.id, request, progress_tx.as_ref()).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                error!("Conversion {} failed: {}", conversion.id, err);
                if let Err(store_err) = self
                    .store
                    .update(&conversion.id, ConversionUpdate::failed(err.to_string()))
                    .await
                {
                    warn!("Failed to mark conversion {} failed: {}", conversion.id, store_err);
                }
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        conversion_id: &str,
        request: &ConversionRequest,
        progress_tx: Option<&mpsc::Sender<ConversionProgress>>,
    ) -> Result<ConversionOutcome, ConvertError> {
        let user_id = request.user_id.as_str();
        let source_platform = self.source.platform();

        let playlist = self
            .source
            .playlist(user_id, &request.source_playlist_id)
            .await
            .map_err(|e| self.source_error(request, e))?
            .ok_or_else(|| ConvertError::SourceNotFound {
                platform: source_platform,
                playlist_id: request.source_playlist_id.clone(),
            })?;

        let title = destination_title(&playlist.name, source_platform);
        let description = destination_description(playlist.description.as_deref(), source_platform);

        let target_playlist_id = self
            .writer
            .create_playlist(user_id, &title, &description, request.visibility)
            .await
            .map_err(|e| ConvertError::api("creating destination playlist", e))?;

        info!(
            "Created {} playlist '{}' ({})",
            self.writer.platform(),
            title,
            target_playlist_id
        );

        self.store
            .update(
                conversion_id,
                ConversionUpdate::target_playlist(target_playlist_id.clone()),
            )
            .await?;

        let tracks = self
            .source
            .list_tracks(user_id, &request.source_playlist_id, &request.selected_ids)
            .await
            .map_err(|e| self.source_error(request, e))?;
        let total = tracks.len();

        self.store
            .update(conversion_id, ConversionUpdate::total_tracks(total as u32))
            .await?;

        publish(
            progress_tx,
            ConversionProgress::Started {
                conversion_id: conversion_id.to_string(),
                target_playlist_id: target_playlist_id.clone(),
                total,
            },
        )
        .await;

        let mut counts = TrackCounts::default();
        let mut appended: HashSet<String> = HashSet::new();

        for (idx, track) in tracks.iter().enumerate() {
            let outcome = self
                .convert_track(
                    user_id,
                    &target_playlist_id,
                    track,
                    request.skip_duplicates,
                    &mut appended,
                )
                .await;
            tally(&mut counts, &outcome);

            let processed = idx + 1;
            if let Err(e) = self
                .store
                .update(
                    conversion_id,
                    ConversionUpdate::progress(progress_percent(processed, total), counts),
                )
                .await
            {
                warn!("Failed to record progress for conversion {}: {}", conversion_id, e);
            }

            publish(
                progress_tx,
                ConversionProgress::Track {
                    processed,
                    total,
                    current_track: track.title.clone(),
                    outcome,
                },
            )
            .await;
        }

        self.store
            .update(conversion_id, ConversionUpdate::completed(counts))
            .await?;

        info!(
            "Conversion {} completed: {} transferred, {} skipped, {} failed of {}",
            conversion_id, counts.transferred, counts.skipped, counts.failed, total
        );

        publish(progress_tx, ConversionProgress::Completed { counts }).await;

        Ok(ConversionOutcome {
            conversion_id: conversion_id.to_string(),
            target_playlist_id,
            total,
            counts,
        })
    }

    /// Match and append one track. Never fails; errors become the outcome.
    async fn convert_track(
        &self,
        user_id: &str,
        playlist_id: &str,
        track: &TrackDescriptor,
        skip_duplicates: bool,
        appended: &mut HashSet<String>,
    ) -> TrackOutcome {
        let item_id = match self.matcher.find_best_match(user_id, track).await {
            Ok(Some(item_id)) => item_id,
            Ok(None) => {
                info!("No match found for '{}'", track.title);
                return TrackOutcome::NoMatch;
            }
            Err(e) => {
                warn!("Search failed for '{}': {}", track.title, e);
                return TrackOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        if skip_duplicates && appended.contains(&item_id) {
            debug!("Skipping duplicate {} for '{}'", item_id, track.title);
            return TrackOutcome::Duplicate { item_id };
        }

        match self
            .writer
            .append_item(user_id, playlist_id, &item_id, None)
            .await
        {
            Ok(()) => {
                debug!("Added '{}' as {}", track.title, item_id);
                appended.insert(item_id.clone());
                TrackOutcome::Transferred { item_id }
            }
            Err(e) => {
                warn!("Failed to add '{}' to playlist: {}", track.title, e);
                TrackOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    fn source_error(&self, request: &ConversionRequest, err: ApiError) -> ConvertError {
        match err {
            ApiError::NotFound(_) => ConvertError::SourceNotFound {
                platform: self.source.platform(),
                playlist_id: request.source_playlist_id.clone(),
            },
            other => ConvertError::api("reading source playlist", other),
        }
    }
}

async fn publish(progress_tx: Option<&mpsc::Sender<ConversionProgress>>, event: ConversionProgress) {
    if let Some(tx) = progress_tx {
        let _ = tx.send(event).await;
    }
}

fn tally(counts: &mut TrackCounts, outcome: &TrackOutcome) {
    match outcome {
        TrackOutcome::Transferred { .. } => counts.transferred += 1,
        TrackOutcome::NoMatch | TrackOutcome::Duplicate { .. } => counts.skipped += 1,
        TrackOutcome::Failed { .. } => counts.failed += 1,
    }
}

/// Whole-number percentage of tracks processed
pub fn progress_percent(processed: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (processed as f64 / total as f64 * 100.0).round()
}

pub fn destination_title(source_name: &str, source_platform: Platform) -> String {
    let source_name = match source_name.trim() {
        "" => UNTITLED,
        name => name,
    };
    let title = format!("{} (from {})", source_name, source_platform);
    if title.chars().count() <= MAX_TITLE_CHARS {
        return title;
    }
    let suffix = format!(" (from {})", source_platform);
    let keep = MAX_TITLE_CHARS - suffix.chars().count();
    let name: String = source_name.chars().take(keep).collect();
    format!("{}{}", name.trim_end(), suffix)
}

pub fn destination_description(source_description: Option<&str>, source_platform: Platform) -> String {
    match source_description.map(str::trim) {
        Some(desc) if !desc.is_empty() => desc.to_string(),
        _ => format!("Converted from {}", source_platform),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthError;
    use crate::convert::record::ConversionStatus;
    use crate::platform::{select_tracks, track, SourcePlaylist};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeSource {
        playlists: HashMap<String, (SourcePlaylist, Vec<TrackDescriptor>)>,
        not_connected: bool,
        /// Playlist metadata resolves but listing its tracks answers 404
        tracks_gone: bool,
    }

    impl FakeSource {
        fn with_playlist(id: &str, tracks: Vec<TrackDescriptor>) -> Self {
            let mut source = Self::default();
            source.playlists.insert(
                id.to_string(),
                (
                    SourcePlaylist {
                        id: id.to_string(),
                        name: "Road Trip".to_string(),
                        description: None,
                        track_count: Some(tracks.len() as u32),
                    },
                    tracks,
                ),
            );
            source
        }
    }

    #[async_trait]
    impl SourcePlatform for FakeSource {
        fn platform(&self) -> Platform {
            Platform::Spotify
        }

        async fn playlist(
            &self,
            user_id: &str,
            playlist_id: &str,
        ) -> Result<Option<SourcePlaylist>, ApiError> {
            if self.not_connected {
                return Err(AuthError::not_connected(user_id, Platform::Spotify).into());
            }
            Ok(self.playlists.get(playlist_id).map(|(p, _)| p.clone()))
        }

        async fn list_tracks(
            &self,
            _user_id: &str,
            playlist_id: &str,
            selected_ids: &[String],
        ) -> Result<Vec<TrackDescriptor>, ApiError> {
            if self.tracks_gone {
                return Err(ApiError::NotFound(format!("playlist {}", playlist_id)));
            }
            let (_, tracks) = self
                .playlists
                .get(playlist_id)
                .ok_or_else(|| ApiError::NotFound(playlist_id.to_string()))?;
            Ok(select_tracks(tracks.clone(), selected_ids))
        }
    }

    /// Destination that matches every track to `vid-<track id>`
    #[derive(Default)]
    struct FakeTarget {
        no_match: HashSet<String>,
        search_errors: HashSet<String>,
        append_errors: HashSet<String>,
        aliases: HashMap<String, String>,
        fail_create: bool,
        created: Mutex<Vec<(String, String, Visibility)>>,
        appended: Mutex<Vec<(String, String)>>,
        searched: Mutex<Vec<String>>,
    }

    impl FakeTarget {
        fn created(&self) -> Vec<(String, String, Visibility)> {
            self.created.lock().unwrap().clone()
        }

        fn appended(&self) -> Vec<(String, String)> {
            self.appended.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TargetMatcher for FakeTarget {
        async fn find_best_match(
            &self,
            _user_id: &str,
            track: &TrackDescriptor,
        ) -> Result<Option<String>, ApiError> {
            self.searched.lock().unwrap().push(track.id.clone());
            if self.search_errors.contains(&track.id) {
                return Err(ApiError::Network("connection reset".to_string()));
            }
            if self.no_match.contains(&track.id) {
                return Ok(None);
            }
            Ok(Some(
                self.aliases
                    .get(&track.id)
                    .cloned()
                    .unwrap_or_else(|| format!("vid-{}", track.id)),
            ))
        }
    }

    #[async_trait]
    impl PlaylistWriter for FakeTarget {
        fn platform(&self) -> Platform {
            Platform::Youtube
        }

        async fn create_playlist(
            &self,
            _user_id: &str,
            title: &str,
            description: &str,
            visibility: Visibility,
        ) -> Result<String, ApiError> {
            if self.fail_create {
                return Err(ApiError::Status {
                    status: 403,
                    message: "quotaExceeded".to_string(),
                });
            }
            let mut created = self.created.lock().unwrap();
            created.push((title.to_string(), description.to_string(), visibility));
            Ok(format!("PL{}", created.len()))
        }

        async fn append_item(
            &self,
            _user_id: &str,
            playlist_id: &str,
            item_id: &str,
            _position: Option<u32>,
        ) -> Result<(), ApiError> {
            if self.append_errors.contains(item_id) {
                return Err(ApiError::Network("timed out".to_string()));
            }
            self.appended
                .lock()
                .unwrap()
                .push((playlist_id.to_string(), item_id.to_string()));
            Ok(())
        }
    }

    fn abc() -> Vec<TrackDescriptor> {
        vec![
            track("a", "Alpha", "Artist A"),
            track("b", "Beta", "Artist B"),
            track("c", "Gamma", "Artist C"),
        ]
    }

    fn engine(
        source: FakeSource,
        target: FakeTarget,
    ) -> (ConversionEngine, Arc<FakeTarget>, Arc<MemoryStore>) {
        let target = Arc::new(target);
        let store = Arc::new(MemoryStore::new());
        let engine = ConversionEngine::new(
            Arc::new(source),
            target.clone(),
            target.clone(),
            store.clone(),
        );
        (engine, target, store)
    }

    #[tokio::test]
    async fn test_converts_all_tracks_in_order() {
        let (engine, target, store) =
            engine(FakeSource::with_playlist("p1", abc()), FakeTarget::default());

        let outcome = engine.convert(&ConversionRequest::new("u1", "p1")).await.unwrap();

        assert_eq!(outcome.target_playlist_id, "PL1");
        assert_eq!(outcome.total, 3);
        assert_eq!(outcome.counts.transferred, 3);
        assert_eq!(
            target.appended(),
            vec![
                ("PL1".to_string(), "vid-a".to_string()),
                ("PL1".to_string(), "vid-b".to_string()),
                ("PL1".to_string(), "vid-c".to_string()),
            ]
        );

        let record = store.get(&outcome.conversion_id).await.unwrap().unwrap();
        assert_eq!(record.status, ConversionStatus::Completed);
        assert_eq!(record.progress, 100.0);
        assert_eq!(record.target_playlist_id.as_deref(), Some("PL1"));
        assert_eq!(record.total_tracks, 3);
        assert!(record.error.is_none());
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_rounded() {
        let (engine, _target, store) =
            engine(FakeSource::with_playlist("p1", abc()), FakeTarget::default());

        let outcome = engine.convert(&ConversionRequest::new("u1", "p1")).await.unwrap();

        let progress: Vec<f64> = store
            .history(&outcome.conversion_id)
            .await
            .iter()
            .map(|c| c.progress)
            .collect();
        // target id, total, three tracks, completion
        assert_eq!(progress, vec![0.0, 0.0, 33.0, 67.0, 100.0, 100.0]);
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_playlist_created_once_for_empty_playlist() {
        let (engine, target, store) =
            engine(FakeSource::with_playlist("p1", vec![]), FakeTarget::default());

        let outcome = engine.convert(&ConversionRequest::new("u1", "p1")).await.unwrap();

        assert_eq!(target.created().len(), 1);
        assert!(target.appended().is_empty());
        let record = store.get(&outcome.conversion_id).await.unwrap().unwrap();
        assert_eq!(record.status, ConversionStatus::Completed);
        assert_eq!(record.progress, 100.0);
    }

    #[tokio::test]
    async fn test_playlist_created_once_for_many_tracks() {
        let tracks: Vec<_> = (0..25)
            .map(|i| track(&format!("t{}", i), &format!("Song {}", i), "Band"))
            .collect();
        let (engine, target, _store) =
            engine(FakeSource::with_playlist("p1", tracks), FakeTarget::default());

        engine.convert(&ConversionRequest::new("u1", "p1")).await.unwrap();

        assert_eq!(target.created().len(), 1);
        assert_eq!(target.appended().len(), 25);
    }

    #[tokio::test]
    async fn test_selected_tracks_only() {
        let (engine, target, _store) =
            engine(FakeSource::with_playlist("p1", abc()), FakeTarget::default());
        let mut request = ConversionRequest::new("u1", "p1");
        request.selected_ids = vec!["b".to_string()];

        let outcome = engine.convert(&request).await.unwrap();

        assert_eq!(outcome.total, 1);
        assert_eq!(*target.searched.lock().unwrap(), vec!["b".to_string()]);
        assert_eq!(target.appended(), vec![("PL1".to_string(), "vid-b".to_string())]);
    }

    #[tokio::test]
    async fn test_no_match_is_skipped_not_failed() {
        let target = FakeTarget {
            no_match: HashSet::from(["b".to_string()]),
            ..Default::default()
        };
        let (engine, target, store) = engine(FakeSource::with_playlist("p1", abc()), target);

        let outcome = engine.convert(&ConversionRequest::new("u1", "p1")).await.unwrap();

        let appended: Vec<_> = target.appended().into_iter().map(|(_, v)| v).collect();
        assert_eq!(appended, vec!["vid-a", "vid-c"]);

        let record = store.get(&outcome.conversion_id).await.unwrap().unwrap();
        assert_eq!(record.status, ConversionStatus::Completed);
        assert_eq!(record.progress, 100.0);
        assert_eq!(record.counts.transferred, 2);
        assert_eq!(record.counts.skipped, 1);
        assert_eq!(record.counts.failed, 0);
    }

    #[tokio::test]
    async fn test_per_track_errors_do_not_abort() {
        let target = FakeTarget {
            search_errors: HashSet::from(["a".to_string()]),
            append_errors: HashSet::from(["vid-b".to_string()]),
            ..Default::default()
        };
        let (engine, target, store) = engine(FakeSource::with_playlist("p1", abc()), target);

        let outcome = engine.convert(&ConversionRequest::new("u1", "p1")).await.unwrap();

        assert_eq!(target.appended(), vec![("PL1".to_string(), "vid-c".to_string())]);
        assert_eq!(outcome.counts.failed, 2);
        assert_eq!(outcome.counts.transferred, 1);

        let record = store.get(&outcome.conversion_id).await.unwrap().unwrap();
        assert_eq!(record.status, ConversionStatus::Completed);
        assert!(record.error.is_none());
    }

    #[tokio::test]
    async fn test_missing_source_playlist_fails_conversion() {
        let (engine, target, store) =
            engine(FakeSource::with_playlist("p1", abc()), FakeTarget::default());

        let err = engine
            .convert(&ConversionRequest::new("u1", "nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::SourceNotFound { .. }));

        let records = store.list_for_user("u1").await.unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.status, ConversionStatus::Failed);
        assert!(record.error.as_deref().is_some_and(|e| !e.is_empty()));
        assert!(record.target_playlist_id.is_none());
        assert!(store
            .history(&record.id)
            .await
            .iter()
            .all(|c| c.target_playlist_id.is_none()));
        assert!(target.created().is_empty());
    }

    #[tokio::test]
    async fn test_tracks_not_found_fails_conversion() {
        let source = FakeSource {
            tracks_gone: true,
            ..FakeSource::with_playlist("p1", abc())
        };
        let (engine, target, store) = engine(source, FakeTarget::default());

        let err = engine
            .convert(&ConversionRequest::new("u1", "p1"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ConvertError::SourceNotFound { platform: Platform::Spotify, ref playlist_id } if playlist_id == "p1"
        ));

        let records = store.list_for_user("u1").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, ConversionStatus::Failed);
        assert_eq!(
            records[0].error.as_deref(),
            Some("Spotify playlist p1 not found")
        );
        assert!(target.searched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_failure_fails_conversion() {
        let target = FakeTarget {
            fail_create: true,
            ..Default::default()
        };
        let (engine, target, store) = engine(FakeSource::with_playlist("p1", abc()), target);

        let err = engine
            .convert(&ConversionRequest::new("u1", "p1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::Api { .. }));
        assert!(err.to_string().contains("quotaExceeded"));

        let record = &store.list_for_user("u1").await.unwrap()[0];
        assert_eq!(record.status, ConversionStatus::Failed);
        assert!(target.searched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_token_error_during_setup_fails_conversion() {
        let source = FakeSource {
            not_connected: true,
            ..FakeSource::with_playlist("p1", abc())
        };
        let (engine, _target, store) = engine(source, FakeTarget::default());

        let err = engine
            .convert(&ConversionRequest::new("u1", "p1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::Auth(AuthError::NotConnected { .. })));

        let record = &store.list_for_user("u1").await.unwrap()[0];
        assert_eq!(record.status, ConversionStatus::Failed);
        assert!(record.error.as_deref().unwrap().contains("not connected"));
    }

    #[tokio::test]
    async fn test_rerun_creates_independent_records() {
        let (engine, target, store) =
            engine(FakeSource::with_playlist("p1", abc()), FakeTarget::default());
        let request = ConversionRequest::new("u1", "p1");

        let first = engine.convert(&request).await.unwrap();
        let second = engine.convert(&request).await.unwrap();

        assert_ne!(first.conversion_id, second.conversion_id);
        assert_ne!(first.target_playlist_id, second.target_playlist_id);
        assert_eq!(target.created().len(), 2);
        assert_eq!(store.list_for_user("u1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_progress_events() {
        let (engine, _target, _store) =
            engine(FakeSource::with_playlist("p1", abc()), FakeTarget::default());
        let (tx, mut rx) = mpsc::channel(16);

        let outcome = engine
            .convert_with_progress(&ConversionRequest::new("u1", "p1"), Some(tx))
            .await
            .unwrap();

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        assert_eq!(events.len(), 5);
        assert_eq!(
            events[0],
            ConversionProgress::Started {
                conversion_id: outcome.conversion_id.clone(),
                target_playlist_id: "PL1".to_string(),
                total: 3,
            }
        );
        let tracks: Vec<_> = events[1..4]
            .iter()
            .map(|e| match e {
                ConversionProgress::Track {
                    processed,
                    total,
                    current_track,
                    ..
                } => (*processed, *total, current_track.clone()),
                other => panic!("unexpected event {:?}", other),
            })
            .collect();
        assert_eq!(
            tracks,
            vec![
                (1, 3, "Alpha".to_string()),
                (2, 3, "Beta".to_string()),
                (3, 3, "Gamma".to_string()),
            ]
        );
        assert!(matches!(events[4], ConversionProgress::Completed { .. }));
    }

    #[tokio::test]
    async fn test_dropped_receiver_does_not_stop_conversion() {
        let (engine, target, _store) =
            engine(FakeSource::with_playlist("p1", abc()), FakeTarget::default());
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let outcome = engine
            .convert_with_progress(&ConversionRequest::new("u1", "p1"), Some(tx))
            .await
            .unwrap();
        assert_eq!(outcome.counts.transferred, 3);
        assert_eq!(target.appended().len(), 3);
    }

    #[tokio::test]
    async fn test_duplicates_appended_by_default() {
        let target = FakeTarget {
            aliases: HashMap::from([("b".to_string(), "vid-a".to_string())]),
            ..Default::default()
        };
        let (engine, target, _store) = engine(FakeSource::with_playlist("p1", abc()), target);

        engine.convert(&ConversionRequest::new("u1", "p1")).await.unwrap();
        assert_eq!(target.appended().len(), 3);
    }

    #[tokio::test]
    async fn test_skip_duplicates() {
        let target = FakeTarget {
            aliases: HashMap::from([("b".to_string(), "vid-a".to_string())]),
            ..Default::default()
        };
        let (engine, target, _store) = engine(FakeSource::with_playlist("p1", abc()), target);
        let mut request = ConversionRequest::new("u1", "p1");
        request.skip_duplicates = true;

        let outcome = engine.convert(&request).await.unwrap();

        let appended: Vec<_> = target.appended().into_iter().map(|(_, v)| v).collect();
        assert_eq!(appended, vec!["vid-a", "vid-c"]);
        assert_eq!(outcome.counts.skipped, 1);
        assert_eq!(outcome.counts.transferred, 2);
    }

    #[tokio::test]
    async fn test_destination_naming_and_visibility() {
        let (engine, target, _store) =
            engine(FakeSource::with_playlist("p1", abc()), FakeTarget::default());
        let mut request = ConversionRequest::new("u1", "p1");
        request.visibility = Visibility::Unlisted;

        engine.convert(&request).await.unwrap();

        let created = target.created();
        assert_eq!(created[0].0, "Road Trip (from Spotify)");
        assert_eq!(created[0].1, "Converted from Spotify");
        assert_eq!(created[0].2, Visibility::Unlisted);
    }

    #[test]
    fn test_progress_percent() {
        assert_eq!(progress_percent(0, 0), 100.0);
        assert_eq!(progress_percent(1, 3), 33.0);
        assert_eq!(progress_percent(2, 3), 67.0);
        assert_eq!(progress_percent(3, 3), 100.0);
        assert_eq!(progress_percent(1, 8), 13.0);
    }

    #[test]
    fn test_destination_title_truncates_long_names() {
        let name = "x".repeat(200);
        let title = destination_title(&name, Platform::Spotify);
        assert_eq!(title.chars().count(), MAX_TITLE_CHARS);
        assert!(title.ends_with(" (from Spotify)"));
    }

    #[test]
    fn test_destination_title_blank_name() {
        assert_eq!(
            destination_title("   ", Platform::Spotify),
            "Untitled playlist (from Spotify)"
        );
        assert_eq!(
            destination_title("Road Trip", Platform::Spotify),
            "Road Trip (from Spotify)"
        );
    }

    #[test]
    fn test_destination_description() {
        assert_eq!(
            destination_description(Some("  chill vibes "), Platform::Spotify),
            "chill vibes"
        );
        assert_eq!(
            destination_description(Some("   "), Platform::Spotify),
            "Converted from Spotify"
        );
        assert_eq!(
            destination_description(None, Platform::Spotify),
            "Converted from Spotify"
        );
    }
}
