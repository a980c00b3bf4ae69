use crate::TrackId;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const AUDIO_EXTENSION: &str = "mp3";
/// Created inside the configured directory; the only place the cache writes or sweeps.
pub const CACHE_SUBDIRECTORY: &str = "radio-cache";

#[derive(Debug, thiserror::Error)]
pub enum ContentCacheError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

enum Lookup {
    Fresh(PathBuf),
    Expired(PathBuf),
    Missing,
}

struct CacheEntry {
    path: PathBuf,
    stored_at: Instant,
}

/// Downloaded audio kept on disk for a limited time.
///
/// The cache owns a `radio-cache` subdirectory of the directory it is created
/// with. Files left there by a previous run are removed on creation; nothing
/// outside of it is touched. Readers never get the cached file itself but a
/// private copy that they are free to delete.
pub struct ContentCache {
    directory: PathBuf,
    ttl: Duration,
    entries: Mutex<HashMap<TrackId, CacheEntry>>,
}

impl ContentCache {
    pub async fn create(
        directory: impl Into<PathBuf>,
        ttl: Duration,
    ) -> Result<Self, ContentCacheError> {
        let directory = directory.into().join(CACHE_SUBDIRECTORY);

        tokio::fs::create_dir_all(&directory).await?;

        let mut dir_reader = tokio::fs::read_dir(&directory).await?;
        while let Some(entry) = dir_reader.next_entry().await? {
            if entry.file_type().await?.is_file() {
                remove_quietly(&entry.path()).await;
            }
        }

        Ok(Self {
            directory,
            ttl,
            entries: Mutex::new(HashMap::new()),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<TrackId, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn file_stem(track_id: &TrackId) -> String {
        URL_SAFE_NO_PAD.encode(track_id.as_bytes())
    }

    fn unique_path(&self, track_id: &TrackId) -> PathBuf {
        self.directory.join(format!(
            "{}-{}.{}",
            Self::file_stem(track_id),
            uuid::Uuid::new_v4().simple(),
            AUDIO_EXTENSION
        ))
    }

    /// A fresh path inside the cache directory to download `track_id` into.
    pub fn staging_path(&self, track_id: &TrackId) -> PathBuf {
        self.unique_path(track_id)
    }

    /// Returns a private copy of the cached audio, or `None` on a miss.
    pub async fn checkout(&self, track_id: &TrackId) -> Result<Option<PathBuf>, ContentCacheError> {
        let lookup = {
            let mut entries = self.entries();

            match entries.get(track_id) {
                Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                    Lookup::Fresh(entry.path.clone())
                }
                Some(_) => match entries.remove(track_id) {
                    Some(expired) => Lookup::Expired(expired.path),
                    None => Lookup::Missing,
                },
                None => Lookup::Missing,
            }
        };

        let cached = match lookup {
            Lookup::Fresh(cached) => cached,
            Lookup::Expired(path) => {
                debug!(%track_id, "Cached audio expired");
                remove_quietly(&path).await;
                return Ok(None);
            }
            Lookup::Missing => return Ok(None),
        };

        let copy = self.unique_path(track_id);
        match duplicate(&cached, &copy).await {
            Ok(()) => Ok(Some(copy)),
            Err(error) if error.kind() == ErrorKind::NotFound => {
                warn!(%track_id, "Cached audio disappeared from disk");
                self.entries().remove(track_id);
                Ok(None)
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Moves a downloaded file into the cache and returns a private copy of it.
    pub async fn store(
        &self,
        track_id: &TrackId,
        downloaded: &Path,
    ) -> Result<PathBuf, ContentCacheError> {
        let path = self
            .directory
            .join(format!("{}.{}", Self::file_stem(track_id), AUDIO_EXTENSION));

        tokio::fs::rename(downloaded, &path).await?;

        self.entries().insert(
            track_id.clone(),
            CacheEntry {
                path: path.clone(),
                stored_at: Instant::now(),
            },
        );

        let copy = self.unique_path(track_id);
        duplicate(&path, &copy).await?;

        Ok(copy)
    }

    /// Drops entries older than the TTL together with their files.
    pub async fn purge_expired(&self) -> usize {
        let expired = {
            let mut entries = self.entries();
            let expired_ids = entries
                .iter()
                .filter(|(_, entry)| entry.stored_at.elapsed() >= self.ttl)
                .map(|(id, _)| id.clone())
                .collect::<Vec<_>>();

            expired_ids
                .into_iter()
                .filter_map(|id| entries.remove(&id))
                .map(|entry| entry.path)
                .collect::<Vec<_>>()
        };

        for path in &expired {
            remove_quietly(path).await;
        }

        expired.len()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

async fn duplicate(from: &Path, to: &Path) -> std::io::Result<()> {
    match tokio::fs::hard_link(from, to).await {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == ErrorKind::NotFound => Err(error),
        Err(_) => tokio::fs::copy(from, to).await.map(|_| ()),
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(error) = tokio::fs::remove_file(path).await {
        if error.kind() != ErrorKind::NotFound {
            warn!(?error, ?path, "Unable to remove cached audio");
        }
    }
}
