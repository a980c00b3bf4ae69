use crate::broadcast::types::{FetchedAudio, StatusHandle, TrackDescriptor};
use crate::DestinationId;
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum TrackProviderError {
    #[error("No search source could answer: {}", .0.join("; "))]
    Unavailable(Vec<String>),
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Track is unavailable from every audio source: {}", .0.join("; "))]
    Unavailable(Vec<String>),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait TrackProvider: Send + Sync {
    /// Returns an empty list when nothing matches; errors are reserved for
    /// failures of the underlying sources.
    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<TrackDescriptor>, TrackProviderError>;

    async fn fetch(&self, track: &TrackDescriptor) -> Result<FetchedAudio, FetchError>;
}

#[derive(Debug, thiserror::Error)]
pub enum OutputChannelError {
    #[error("Destination is permanently unreachable: {0}")]
    Unreachable(String),
    #[error("Rate limited, retry after {0:?}")]
    RateLimited(Duration),
    #[error("Delivery failed: {0}")]
    Transient(String),
}

impl OutputChannelError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, OutputChannelError::Unreachable(_))
    }
}

#[async_trait]
pub trait OutputChannel: Send + Sync {
    async fn send_status(
        &self,
        destination: &DestinationId,
        text: &str,
    ) -> Result<StatusHandle, OutputChannelError>;

    async fn update_status(
        &self,
        handle: &StatusHandle,
        text: &str,
    ) -> Result<(), OutputChannelError>;

    async fn delete_status(&self, handle: &StatusHandle) -> Result<(), OutputChannelError>;

    /// `Ok` only once the destination has accepted the audio.
    async fn send_audio(
        &self,
        destination: &DestinationId,
        audio: &FetchedAudio,
        caption: &str,
    ) -> Result<(), OutputChannelError>;
}
