use crate::broadcast::messages::{
    loading_status, now_playing_caption, rotation_notice, SEARCHING_STATUS,
};
use crate::broadcast::playlist::{query_variants, PlayedSet};
use crate::broadcast::traits::{OutputChannel, OutputChannelError, TrackProvider};
use crate::broadcast::types::{
    RotationReason, SessionSettings, SessionState, SessionStatus, StatusHandle, Topic,
    TrackDescriptor,
};
use crate::catalog::{random_topic, Catalog};
use crate::fallback::first_success;
use crate::{DestinationId, TrackId};
use futures_lite::future::poll_once;
use rand::seq::SliceRandom;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to one destination's continuous broadcast.
///
/// The playback loop runs in its own task and exclusively owns the playlist,
/// the played history and the failure counter. The handle only observes the
/// current topic and drives the lifecycle: `Idle` → `Running` → `Stopped`.
pub struct BroadcastSession {
    destination: DestinationId,
    phase: Mutex<SessionState>,
    running: Arc<AtomicBool>,
    skip: Arc<Notify>,
    cancel: CancellationToken,
    status: Arc<async_lock::Mutex<Option<StatusHandle>>>,
    topic: watch::Receiver<Topic>,
    worker: Mutex<Option<SessionWorker>>,
    task: Mutex<Option<JoinHandle<()>>>,
    channel: Arc<dyn OutputChannel>,
}

impl BroadcastSession {
    pub fn new(
        destination: DestinationId,
        topic: Topic,
        provider: Arc<dyn TrackProvider>,
        channel: Arc<dyn OutputChannel>,
        catalog: Arc<dyn Catalog>,
        settings: SessionSettings,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(false));
        let skip = Arc::new(Notify::new());
        let status = Arc::new(async_lock::Mutex::new(None));
        let (topic_tx, topic_rx) = watch::channel(topic.clone());

        let worker = SessionWorker {
            destination,
            provider,
            channel: Arc::clone(&channel),
            catalog,
            played: PlayedSet::new(settings.played_history_cap),
            settings,
            topic,
            topic_tx,
            playlist: VecDeque::new(),
            consecutive_failures: 0,
            last_rotation: Instant::now(),
            searching: false,
            running: Arc::clone(&running),
            skip: Arc::clone(&skip),
            status: Arc::clone(&status),
        };

        Self {
            destination,
            phase: Mutex::new(SessionState::Idle),
            running,
            skip,
            cancel: CancellationToken::new(),
            status,
            topic: topic_rx,
            worker: Mutex::new(Some(worker)),
            task: Mutex::new(None),
            channel,
        }
    }

    pub fn destination(&self) -> DestinationId {
        self.destination
    }

    /// Spawns the playback loop. Does nothing unless the session is still idle.
    pub fn start(&self) {
        let mut phase = lock(&self.phase);

        if *phase != SessionState::Idle {
            return;
        }

        let mut worker = match lock(&self.worker).take() {
            Some(worker) => worker,
            None => return,
        };

        *phase = SessionState::Running;
        self.running.store(true, Ordering::SeqCst);

        let cancel = self.cancel.clone();
        let destination = self.destination;
        let handle = actix_rt::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(%destination, "Broadcast loop cancelled");
                }
                _ = worker.run() => {}
            }
        });

        lock(&self.task).replace(handle);
    }

    /// Stops the loop, waits for it to unwind and removes the transient status message.
    pub async fn stop(&self) {
        *lock(&self.phase) = SessionState::Stopped;

        let was_running = self.running.swap(false, Ordering::SeqCst);
        self.cancel.cancel();

        let task = lock(&self.task).take();
        if let Some(task) = task {
            if let Err(error) = task.await {
                error!(destination = %self.destination, ?error, "Broadcast loop panicked");
            }
        }

        let status = self.status.lock().await.take();
        if let Some(handle) = status {
            if let Err(error) = self.channel.delete_status(&handle).await {
                debug!(?error, "Unable to delete status message");
            }
        }

        if was_running {
            info!(destination = %self.destination, "Broadcast stopped");
        }
    }

    pub fn skip(&self) {
        self.skip.notify_one();
    }

    pub fn state(&self) -> SessionState {
        match *lock(&self.phase) {
            SessionState::Running if !self.running.load(Ordering::SeqCst) => {
                SessionState::Stopped
            }
            phase => phase,
        }
    }

    pub fn topic(&self) -> Topic {
        self.topic.borrow().clone()
    }

    pub fn subscribe_topic(&self) -> watch::Receiver<Topic> {
        self.topic.clone()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            destination: self.destination,
            state: self.state(),
            topic: self.topic(),
        }
    }
}

#[derive(Debug, PartialEq)]
enum Delivery {
    Delivered,
    Failed,
    Aborted,
}

#[derive(Debug)]
enum VariantMiss {
    Exhausted(String),
    SearchFailed(String, String),
}

struct SessionWorker {
    destination: DestinationId,
    provider: Arc<dyn TrackProvider>,
    channel: Arc<dyn OutputChannel>,
    catalog: Arc<dyn Catalog>,
    settings: SessionSettings,
    topic: Topic,
    topic_tx: watch::Sender<Topic>,
    playlist: VecDeque<TrackDescriptor>,
    played: PlayedSet,
    consecutive_failures: u32,
    last_rotation: Instant,
    searching: bool,
    running: Arc<AtomicBool>,
    skip: Arc<Notify>,
    status: Arc<async_lock::Mutex<Option<StatusHandle>>>,
}

impl SessionWorker {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn run(&mut self) {
        self.last_rotation = Instant::now();

        info!(
            destination = %self.destination,
            query = %self.topic.query,
            "Broadcast started"
        );

        while self.is_running() {
            // A skip only ends the wait it lands in or the one that follows it.
            self.discard_pending_skip().await;

            if self.last_rotation.elapsed() >= self.settings.rotation_period {
                self.rotate(RotationReason::Scheduled).await;
            }

            if self.playlist.len() < self.settings.low_water_mark {
                self.fill().await;
            }

            if self.playlist.is_empty() {
                self.update_status(SEARCHING_STATUS).await;
                sleep(self.settings.starvation_backoff).await;

                if !self.fill().await {
                    self.rotate(RotationReason::Starved).await;
                    continue;
                }
            }

            let track = match self.playlist.pop_front() {
                Some(track) => track,
                None => continue,
            };
            self.played.insert(track.id.clone());

            match self.deliver(&track).await {
                Delivery::Delivered => {
                    self.consecutive_failures = 0;
                    self.wait_for_track_end(&track).await;
                }
                Delivery::Failed => {
                    self.consecutive_failures += 1;

                    if self.consecutive_failures >= self.settings.failure_threshold {
                        self.rotate(RotationReason::Failing).await;
                    } else {
                        sleep(self.settings.failure_delay).await;
                    }
                }
                Delivery::Aborted => break,
            }
        }

        self.running.store(false, Ordering::SeqCst);

        info!(destination = %self.destination, "Broadcast loop finished");
    }

    /// Appends unplayed tracks found by the first productive query variant.
    /// Returns `false` when no variant produced anything new.
    #[instrument(skip_all, fields(destination = %self.destination, query = %self.topic.query))]
    async fn fill(&mut self) -> bool {
        if self.searching || !self.is_running() {
            return false;
        }
        self.searching = true;

        let result = {
            let provider = &self.provider;
            let played = &self.played;
            let queued = self
                .playlist
                .iter()
                .map(|track| &track.id)
                .collect::<HashSet<&TrackId>>();
            let limit = self.settings.search_limit;

            first_success(query_variants(&self.topic), |variant| {
                let queued = &queued;

                async move {
                    let tracks = match provider.search(&variant, limit).await {
                        Ok(tracks) => tracks,
                        Err(error) => {
                            return Err(VariantMiss::SearchFailed(variant, error.to_string()))
                        }
                    };

                    let mut seen = HashSet::new();
                    let fresh = tracks
                        .into_iter()
                        .filter(|track| !played.contains(&track.id))
                        .filter(|track| !queued.contains(&track.id))
                        .filter(|track| seen.insert(track.id.clone()))
                        .collect::<Vec<_>>();

                    if fresh.is_empty() {
                        Err(VariantMiss::Exhausted(variant))
                    } else {
                        Ok((variant, fresh))
                    }
                }
            })
            .await
        };

        self.searching = false;

        match result {
            Ok((variant, mut fresh)) => {
                fresh.shuffle(&mut rand::rng());
                info!(%variant, count = fresh.len(), "Playlist replenished");
                self.playlist.extend(fresh);
                true
            }
            Err(misses) => {
                for miss in misses {
                    match miss {
                        VariantMiss::Exhausted(variant) => {
                            debug!(%variant, "No unplayed tracks for query variant");
                        }
                        VariantMiss::SearchFailed(variant, error) => {
                            warn!(%variant, %error, "Search failed for query variant");
                        }
                    }
                }
                false
            }
        }
    }

    async fn rotate(&mut self, reason: RotationReason) {
        let topic = random_topic(self.catalog.as_ref(), Some(&self.topic.query));

        info!(
            destination = %self.destination,
            ?reason,
            from = %self.topic.query,
            to = %topic.query,
            "Rotating topic"
        );

        self.topic = topic.clone();
        self.topic_tx.send_replace(topic);
        self.playlist.clear();
        self.played.clear();
        self.consecutive_failures = 0;
        self.last_rotation = Instant::now();

        self.notify(&rotation_notice(&self.topic)).await;
        self.fill().await;
    }

    #[instrument(skip_all, fields(destination = %self.destination, track_id = %track.id))]
    async fn deliver(&mut self, track: &TrackDescriptor) -> Delivery {
        self.update_status(&loading_status(track)).await;

        if !self.is_running() {
            return Delivery::Aborted;
        }

        let audio = match self.provider.fetch(track).await {
            Ok(audio) => audio,
            Err(error) => {
                warn!(%error, "Unable to fetch track");
                return Delivery::Failed;
            }
        };

        let caption = now_playing_caption(track, &self.topic.display_name);
        let result = self
            .channel
            .send_audio(&self.destination, &audio, &caption)
            .await;

        audio.release().await;
        self.clear_status().await;

        match result {
            Ok(()) => {
                info!(title = %track.title, "Track delivered");
                Delivery::Delivered
            }
            Err(error) if error.is_permanent() => {
                self.destination_gone(&error);
                Delivery::Aborted
            }
            Err(error) => {
                warn!(%error, "Destination did not accept the track");
                Delivery::Failed
            }
        }
    }

    async fn wait_for_track_end(&self, track: &TrackDescriptor) {
        let wait = self.settings.track_wait(track);

        tokio::select! {
            _ = sleep(wait) => {}
            _ = self.skip.notified() => {
                debug!(destination = %self.destination, track_id = %track.id, "Track skipped");
            }
        }
    }

    async fn discard_pending_skip(&self) {
        if poll_once(self.skip.notified()).await.is_some() {
            debug!(destination = %self.destination, "Discarding skip that arrived between tracks");
        }
    }

    fn destination_gone(&self, error: &OutputChannelError) {
        error!(destination = %self.destination, %error, "Destination is gone, stopping broadcast");
        self.running.store(false, Ordering::SeqCst);
    }

    /// Edits the transient status message, or sends a new one if editing fails.
    async fn update_status(&self, text: &str) {
        if !self.is_running() {
            return;
        }

        let mut status = self.status.lock().await;

        if let Some(handle) = status.as_ref() {
            match self.channel.update_status(handle, text).await {
                Ok(()) => return,
                Err(error) if error.is_permanent() => {
                    self.destination_gone(&error);
                    return;
                }
                Err(error) => {
                    debug!(?error, "Unable to edit status message");
                    status.take();
                }
            }
        }

        match self.channel.send_status(&self.destination, text).await {
            Ok(handle) => {
                status.replace(handle);
            }
            Err(error) if error.is_permanent() => self.destination_gone(&error),
            Err(error) => debug!(?error, "Unable to send status message"),
        }
    }

    async fn clear_status(&self) {
        let status = self.status.lock().await.take();

        if let Some(handle) = status {
            if let Err(error) = self.channel.delete_status(&handle).await {
                debug!(?error, "Unable to delete status message");
            }
        }
    }

    async fn notify(&self, text: &str) {
        if !self.is_running() {
            return;
        }

        match self.channel.send_status(&self.destination, text).await {
            Ok(_) => (),
            Err(error) if error.is_permanent() => self.destination_gone(&error),
            Err(error) => debug!(?error, "Unable to send notice"),
        }
    }
}
