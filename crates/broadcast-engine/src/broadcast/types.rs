use crate::{DestinationId, TrackId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    pub id: TrackId,
    pub title: String,
    pub uploader: String,
    /// Seconds, `0` when unknown.
    pub duration: u32,
    pub artwork_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Topic {
    pub query: String,
    pub display_name: String,
    pub era: Option<String>,
}

impl Topic {
    pub fn new(query: &str, display_name: &str) -> Self {
        Self {
            query: query.into(),
            display_name: display_name.into(),
            era: None,
        }
    }
}

/// Audio content handed to a session for exactly one delivery attempt.
///
/// The file behind `path` belongs to the holder. `release` deletes it; if the
/// value is dropped without being released (e.g. the owning task was cancelled)
/// the file is removed synchronously on drop.
#[derive(Debug)]
pub struct FetchedAudio {
    track: TrackDescriptor,
    path: PathBuf,
    released: bool,
}

impl FetchedAudio {
    pub fn new(track: TrackDescriptor, path: PathBuf) -> Self {
        Self {
            track,
            path,
            released: false,
        }
    }

    pub fn track(&self) -> &TrackDescriptor {
        &self.track
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn release(mut self) {
        if let Err(error) = tokio::fs::remove_file(&self.path).await {
            if error.kind() != std::io::ErrorKind::NotFound {
                warn!(?error, path = ?self.path, "Unable to remove fetched audio");
            }
        }

        self.released = true;
    }
}

impl Drop for FetchedAudio {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusHandle {
    pub destination: DestinationId,
    pub message_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub destination: DestinationId,
    pub state: SessionState,
    pub topic: Topic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RotationReason {
    Scheduled,
    Starved,
    Failing,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub rotation_period: Duration,
    pub low_water_mark: usize,
    pub played_history_cap: usize,
    pub failure_threshold: u32,
    pub search_limit: usize,
    pub starvation_backoff: Duration,
    pub failure_delay: Duration,
    pub max_track_wait: Duration,
    pub default_track_wait: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            rotation_period: Duration::from_secs(60 * 60),
            low_water_mark: 3,
            played_history_cap: 200,
            failure_threshold: 5,
            search_limit: 20,
            starvation_backoff: Duration::from_secs(5),
            failure_delay: Duration::from_secs(2),
            max_track_wait: Duration::from_secs(300),
            default_track_wait: Duration::from_secs(180),
        }
    }
}

impl SessionSettings {
    pub(crate) fn track_wait(&self, track: &TrackDescriptor) -> Duration {
        match track.duration {
            0 => self.default_track_wait,
            seconds => Duration::from_secs(seconds.into()).min(self.max_track_wait),
        }
    }
}
