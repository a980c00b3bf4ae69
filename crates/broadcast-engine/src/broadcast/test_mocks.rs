use crate::broadcast::traits::{
    FetchError, OutputChannel, OutputChannelError, TrackProvider, TrackProviderError,
};
use crate::broadcast::types::{FetchedAudio, SessionSettings, StatusHandle, TrackDescriptor};
use crate::catalog::{CatalogNode, CatalogTree};
use crate::{DestinationId, TrackId};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

pub(crate) fn track(id: &str, duration: u32) -> TrackDescriptor {
    TrackDescriptor {
        id: id.into(),
        title: format!("Title {}", id),
        uploader: format!("Uploader {}", id),
        duration,
        artwork_url: None,
    }
}

/// Tracks whose ids are `{prefix}-0 .. {prefix}-{count - 1}`.
pub(crate) fn numbered_tracks(prefix: &str, count: usize) -> Vec<TrackDescriptor> {
    (0..count)
        .map(|n| track(&format!("{}-{}", prefix, n), 120))
        .collect()
}

pub(crate) fn fast_settings() -> SessionSettings {
    SessionSettings {
        rotation_period: Duration::from_secs(3600),
        low_water_mark: 3,
        played_history_cap: 200,
        failure_threshold: 3,
        search_limit: 20,
        starvation_backoff: Duration::from_millis(10),
        failure_delay: Duration::from_millis(1),
        max_track_wait: Duration::from_millis(20),
        default_track_wait: Duration::from_millis(20),
    }
}

pub(crate) fn catalog(queries: &[&str]) -> CatalogTree {
    CatalogTree::new(
        queries
            .iter()
            .map(|query| CatalogNode::Leaf {
                name: query.to_uppercase(),
                query: query.to_string(),
                era: None,
            })
            .collect(),
    )
}

/// Answers searches by the longest registered query prefix and writes a real
/// file for every fetch.
pub(crate) struct ProviderMock {
    tracks: Mutex<HashMap<String, Vec<TrackDescriptor>>>,
    fail_fetch: AtomicBool,
    fail_search: AtomicBool,
    pub(crate) searches: Mutex<Vec<String>>,
    pub(crate) fetches: Mutex<Vec<TrackId>>,
    pub(crate) paths: Mutex<Vec<PathBuf>>,
}

impl ProviderMock {
    pub(crate) fn new() -> Self {
        Self {
            tracks: Mutex::new(HashMap::new()),
            fail_fetch: AtomicBool::new(false),
            fail_search: AtomicBool::new(false),
            searches: Mutex::new(vec![]),
            fetches: Mutex::new(vec![]),
            paths: Mutex::new(vec![]),
        }
    }

    pub(crate) fn with_tracks(self, query: &str, tracks: Vec<TrackDescriptor>) -> Self {
        self.tracks.lock().unwrap().insert(query.to_string(), tracks);
        self
    }

    pub(crate) fn fail_fetches(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_searches(&self, fail: bool) {
        self.fail_search.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fetched(&self) -> Vec<TrackId> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl TrackProvider for ProviderMock {
    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<TrackDescriptor>, TrackProviderError> {
        self.searches.lock().unwrap().push(query.to_string());

        if self.fail_search.load(Ordering::SeqCst) {
            return Err(TrackProviderError::Unavailable(vec!["mock: offline".into()]));
        }

        let tracks = self.tracks.lock().unwrap();
        let matched = tracks
            .iter()
            .filter(|(prefix, _)| query.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, tracks)| tracks.iter().take(limit).cloned().collect())
            .unwrap_or_default();

        Ok(matched)
    }

    async fn fetch(&self, track: &TrackDescriptor) -> Result<FetchedAudio, FetchError> {
        self.fetches.lock().unwrap().push(track.id.clone());

        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(FetchError::Unavailable(vec!["mock: no audio".into()]));
        }

        let path = std::env::temp_dir().join(format!(
            "broadcast-engine-test-{}.mp3",
            uuid::Uuid::new_v4()
        ));
        tokio::fs::write(&path, b"ID3 mock audio").await?;
        self.paths.lock().unwrap().push(path.clone());

        Ok(FetchedAudio::new(track.clone(), path))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum AudioOutcome {
    Accept,
    Transient,
    Unreachable,
}

#[derive(Debug, Clone)]
pub(crate) struct Delivered {
    pub(crate) destination: DestinationId,
    pub(crate) track_id: TrackId,
    pub(crate) caption: String,
    pub(crate) file_existed: bool,
}

pub(crate) struct ChannelMock {
    next_message_id: AtomicI64,
    audio_outcome: Mutex<AudioOutcome>,
    scripted_outcomes: Mutex<VecDeque<AudioOutcome>>,
    delivered_tx: mpsc::UnboundedSender<Delivered>,
    pub(crate) attempts: Mutex<Vec<TrackId>>,
    pub(crate) statuses: Mutex<Vec<(DestinationId, String)>>,
    pub(crate) updates: Mutex<Vec<String>>,
    pub(crate) deleted: Mutex<Vec<StatusHandle>>,
}

impl ChannelMock {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<Delivered>) {
        let (delivered_tx, delivered_rx) = mpsc::unbounded_channel();

        let channel = Self {
            next_message_id: AtomicI64::new(1),
            audio_outcome: Mutex::new(AudioOutcome::Accept),
            scripted_outcomes: Mutex::new(VecDeque::new()),
            delivered_tx,
            attempts: Mutex::new(vec![]),
            statuses: Mutex::new(vec![]),
            updates: Mutex::new(vec![]),
            deleted: Mutex::new(vec![]),
        };

        (channel, delivered_rx)
    }

    pub(crate) fn set_audio_outcome(&self, outcome: AudioOutcome) {
        *self.audio_outcome.lock().unwrap() = outcome;
    }

    /// Outcomes for the next audio deliveries, before falling back to the default one.
    pub(crate) fn script_audio_outcomes(&self, outcomes: Vec<AudioOutcome>) {
        self.scripted_outcomes.lock().unwrap().extend(outcomes);
    }

    pub(crate) fn status_texts(&self) -> Vec<String> {
        self.statuses
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl OutputChannel for ChannelMock {
    async fn send_status(
        &self,
        destination: &DestinationId,
        text: &str,
    ) -> Result<StatusHandle, OutputChannelError> {
        self.statuses
            .lock()
            .unwrap()
            .push((*destination, text.to_string()));

        Ok(StatusHandle {
            destination: *destination,
            message_id: self.next_message_id.fetch_add(1, Ordering::SeqCst),
        })
    }

    async fn update_status(
        &self,
        _handle: &StatusHandle,
        text: &str,
    ) -> Result<(), OutputChannelError> {
        self.updates.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn delete_status(&self, handle: &StatusHandle) -> Result<(), OutputChannelError> {
        self.deleted.lock().unwrap().push(handle.clone());
        Ok(())
    }

    async fn send_audio(
        &self,
        destination: &DestinationId,
        audio: &FetchedAudio,
        caption: &str,
    ) -> Result<(), OutputChannelError> {
        self.attempts.lock().unwrap().push(audio.track().id.clone());

        let scripted = self.scripted_outcomes.lock().unwrap().pop_front();
        let outcome = scripted.unwrap_or_else(|| *self.audio_outcome.lock().unwrap());
        match outcome {
            AudioOutcome::Accept => {
                let _ = self.delivered_tx.send(Delivered {
                    destination: *destination,
                    track_id: audio.track().id.clone(),
                    caption: caption.to_string(),
                    file_existed: audio.path().exists(),
                });
                Ok(())
            }
            AudioOutcome::Transient => Err(OutputChannelError::Transient("mock: timeout".into())),
            AudioOutcome::Unreachable => Err(OutputChannelError::Unreachable(
                "mock: bot was blocked by the user".into(),
            )),
        }
    }
}
