use crate::TrackDescriptor;
use async_trait::async_trait;
use std::error::Error;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct SourceError(Box<dyn Error + Send + Sync>);

impl SourceError {
    pub fn new(error: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self(error.into())
    }
}

#[async_trait]
pub trait SearchSource: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str, limit: usize)
        -> Result<Vec<TrackDescriptor>, SourceError>;
}

#[async_trait]
pub trait AudioSource: Send + Sync {
    fn name(&self) -> &str;

    /// Writes the audio of `track` to `target`. Intermediate files must be named
    /// after the stem of `target`; the caller removes them once the attempt is over.
    async fn download(&self, track: &TrackDescriptor, target: &Path) -> Result<(), SourceError>;
}
