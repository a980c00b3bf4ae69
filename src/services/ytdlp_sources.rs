use async_trait::async_trait;
use broadcast_engine::{AudioSource, SearchSource, SourceError, TrackDescriptor};
use std::path::Path;
use std::sync::Arc;
use track_sources::{soundcloud_lookup, youtube_watch_url, SearchEntry, YtDlpClient};

fn track_descriptor(entry: SearchEntry) -> TrackDescriptor {
    TrackDescriptor {
        id: entry.id.into(),
        title: entry.title,
        uploader: entry.uploader,
        duration: entry.duration,
        artwork_url: entry.thumbnail_url,
    }
}

pub(crate) struct YouTubeSearch {
    client: Arc<YtDlpClient>,
}

impl YouTubeSearch {
    pub(crate) fn new(client: Arc<YtDlpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SearchSource for YouTubeSearch {
    fn name(&self) -> &str {
        "youtube"
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<TrackDescriptor>, SourceError> {
        let entries = self
            .client
            .search(query, limit)
            .await
            .map_err(SourceError::new)?;

        Ok(entries.into_iter().map(track_descriptor).collect())
    }
}

/// Looks the track up on SoundCloud by uploader and title.
pub(crate) struct SoundCloudAudio {
    client: Arc<YtDlpClient>,
}

impl SoundCloudAudio {
    pub(crate) fn new(client: Arc<YtDlpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AudioSource for SoundCloudAudio {
    fn name(&self) -> &str {
        "soundcloud"
    }

    async fn download(&self, track: &TrackDescriptor, target: &Path) -> Result<(), SourceError> {
        if track.title.is_empty() {
            return Err(SourceError::new("Track has no title to look up"));
        }

        self.client
            .download(&soundcloud_lookup(&track.uploader, &track.title), target)
            .await
            .map_err(SourceError::new)
    }
}

pub(crate) struct YouTubeAudio {
    client: Arc<YtDlpClient>,
}

impl YouTubeAudio {
    pub(crate) fn new(client: Arc<YtDlpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AudioSource for YouTubeAudio {
    fn name(&self) -> &str {
        "youtube"
    }

    async fn download(&self, track: &TrackDescriptor, target: &Path) -> Result<(), SourceError> {
        self.client
            .download(&youtube_watch_url(&track.id), target)
            .await
            .map_err(SourceError::new)
    }
}
