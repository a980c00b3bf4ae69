use crate::fallback::first_success;
use crate::pipeline::cache::{ContentCache, ContentCacheError};
use crate::pipeline::sources::{AudioSource, SearchSource};
use crate::{FetchError, FetchedAudio, TrackDescriptor, TrackProvider, TrackProviderError};
use async_lock::Semaphore;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Seconds. Candidates outside `min_duration..=max_duration` are dropped,
    /// except those of unknown duration.
    pub min_duration: u32,
    pub max_duration: u32,
    pub max_concurrent_fetches: usize,
    pub search_timeout: Duration,
    pub fetch_timeout: Duration,
    /// Downloads smaller than this are treated as failures.
    pub min_audio_bytes: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            min_duration: 30,
            max_duration: 15 * 60,
            max_concurrent_fetches: 3,
            search_timeout: Duration::from_secs(30),
            fetch_timeout: Duration::from_secs(180),
            min_audio_bytes: 10 * 1024,
        }
    }
}

impl From<ContentCacheError> for FetchError {
    fn from(error: ContentCacheError) -> Self {
        match error {
            ContentCacheError::Io(error) => FetchError::Io(error),
        }
    }
}

/// Download target. On drop, removes whatever is still named after its stem
/// (the target itself and any intermediate files the source left behind).
struct StagedFile {
    path: PathBuf,
}

impl StagedFile {
    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        let (Some(directory), Some(stem)) = (
            self.path.parent(),
            self.path.file_stem().and_then(|stem| stem.to_str()),
        ) else {
            return;
        };
        let prefix = format!("{}.", stem);

        if let Ok(entries) = std::fs::read_dir(directory) {
            for entry in entries.flatten() {
                let leftover = entry
                    .file_name()
                    .to_str()
                    .map_or(false, |name| name.starts_with(&prefix));

                if leftover {
                    let _ = std::fs::remove_file(entry.path());
                }
            }
        }
    }
}

/// `TrackProvider` backed by ordered search and audio sources.
pub struct AcquisitionPipeline {
    search_sources: Vec<Arc<dyn SearchSource>>,
    audio_sources: Vec<Arc<dyn AudioSource>>,
    cache: Arc<ContentCache>,
    fetch_permits: Semaphore,
    settings: PipelineSettings,
}

impl AcquisitionPipeline {
    pub fn new(
        search_sources: Vec<Arc<dyn SearchSource>>,
        audio_sources: Vec<Arc<dyn AudioSource>>,
        cache: Arc<ContentCache>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            search_sources,
            audio_sources,
            cache,
            fetch_permits: Semaphore::new(settings.max_concurrent_fetches.max(1)),
            settings,
        }
    }

    fn accepts_duration(&self, duration: u32) -> bool {
        duration == 0 || (self.settings.min_duration..=self.settings.max_duration).contains(&duration)
    }

    async fn download(
        &self,
        source: &dyn AudioSource,
        track: &TrackDescriptor,
    ) -> Result<StagedFile, String> {
        let staged = StagedFile {
            path: self.cache.staging_path(&track.id),
        };

        match timeout(
            self.settings.fetch_timeout,
            source.download(track, staged.path()),
        )
        .await
        {
            Ok(Ok(())) => (),
            Ok(Err(error)) => return Err(format!("{}: {}", source.name(), error)),
            Err(_) => {
                return Err(format!(
                    "{}: timed out after {:?}",
                    source.name(),
                    self.settings.fetch_timeout
                ))
            }
        }

        let size = match tokio::fs::metadata(staged.path()).await {
            Ok(metadata) => metadata.len(),
            Err(error) => return Err(format!("{}: no audio produced ({})", source.name(), error)),
        };

        if size < self.settings.min_audio_bytes {
            return Err(format!(
                "{}: audio is too small ({} bytes)",
                source.name(),
                size
            ));
        }

        Ok(staged)
    }
}

#[async_trait]
impl TrackProvider for AcquisitionPipeline {
    #[instrument(skip(self))]
    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<TrackDescriptor>, TrackProviderError> {
        let search_timeout = self.settings.search_timeout;

        let result = first_success(&self.search_sources, |source| async move {
            match timeout(search_timeout, source.search(query, limit)).await {
                Ok(Ok(tracks)) => Ok(tracks),
                Ok(Err(error)) => Err(format!("{}: {}", source.name(), error)),
                Err(_) => Err(format!(
                    "{}: timed out after {:?}",
                    source.name(),
                    search_timeout
                )),
            }
        })
        .await;

        match result {
            Ok(tracks) => {
                let found = tracks.len();
                let tracks = tracks
                    .into_iter()
                    .filter(|track| self.accepts_duration(track.duration))
                    .collect::<Vec<_>>();

                debug!(found, kept = tracks.len(), "Search finished");

                Ok(tracks)
            }
            Err(errors) => {
                warn!(?errors, "Every search source failed");
                Err(TrackProviderError::Unavailable(errors))
            }
        }
    }

    #[instrument(skip_all, fields(track_id = %track.id))]
    async fn fetch(&self, track: &TrackDescriptor) -> Result<FetchedAudio, FetchError> {
        if let Some(path) = self.cache.checkout(&track.id).await? {
            debug!("Serving audio from cache");
            return Ok(FetchedAudio::new(track.clone(), path));
        }

        let _permit = self.fetch_permits.acquire().await;

        // Someone else may have downloaded it while we waited for the permit.
        if let Some(path) = self.cache.checkout(&track.id).await? {
            debug!("Serving audio from cache");
            return Ok(FetchedAudio::new(track.clone(), path));
        }

        let staged = first_success(&self.audio_sources, |source| {
            self.download(source.as_ref(), track)
        })
        .await
        .map_err(|errors| {
            warn!(?errors, "Every audio source failed");
            FetchError::Unavailable(errors)
        })?;

        let path = self.cache.store(&track.id, staged.path()).await?;

        info!(title = %track.title, "Audio downloaded");

        Ok(FetchedAudio::new(track.clone(), path))
    }
}
