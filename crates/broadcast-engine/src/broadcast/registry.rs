use crate::broadcast::session::BroadcastSession;
use crate::broadcast::traits::{OutputChannel, TrackProvider};
use crate::broadcast::types::{SessionSettings, SessionStatus, Topic};
use crate::catalog::{random_topic, Catalog, RANDOM_TOPIC};
use crate::DestinationId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keeps at most one broadcast per destination.
///
/// `start` and `stop` for the same destination are serialized by a
/// per-destination async lock, so a replaced session is fully stopped before
/// its successor begins.
pub struct SessionRegistry {
    provider: Arc<dyn TrackProvider>,
    channel: Arc<dyn OutputChannel>,
    catalog: Arc<dyn Catalog>,
    settings: SessionSettings,
    sessions: Mutex<HashMap<DestinationId, Arc<BroadcastSession>>>,
    locks: Mutex<HashMap<DestinationId, Arc<async_lock::Mutex<()>>>>,
}

impl SessionRegistry {
    pub fn new(
        provider: Arc<dyn TrackProvider>,
        channel: Arc<dyn OutputChannel>,
        catalog: Arc<dyn Catalog>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            provider,
            channel,
            catalog,
            settings,
            sessions: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn destination_lock(&self, destination: &DestinationId) -> Arc<async_lock::Mutex<()>> {
        Arc::clone(lock(&self.locks).entry(*destination).or_default())
    }

    fn resolve_topic(&self, query: &str, display_name: Option<&str>) -> Topic {
        let query = query.trim();

        if query.is_empty() || query.eq_ignore_ascii_case(RANDOM_TOPIC) {
            return random_topic(self.catalog.as_ref(), None);
        }

        let display_name = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(query);

        Topic::new(query, display_name)
    }

    /// Starts a broadcast for `destination`, replacing any existing one.
    pub async fn start(
        &self,
        destination: DestinationId,
        query: &str,
        display_name: Option<&str>,
    ) -> SessionStatus {
        let destination_lock = self.destination_lock(&destination);
        let _guard = destination_lock.lock().await;

        let previous = lock(&self.sessions).remove(&destination);
        if let Some(previous) = previous {
            info!(%destination, "Replacing running broadcast");
            previous.stop().await;
        }

        let topic = self.resolve_topic(query, display_name);
        let session = Arc::new(BroadcastSession::new(
            destination,
            topic,
            Arc::clone(&self.provider),
            Arc::clone(&self.channel),
            Arc::clone(&self.catalog),
            self.settings.clone(),
        ));
        session.start();

        lock(&self.sessions).insert(destination, Arc::clone(&session));

        session.status()
    }

    /// Drops the lock of a destination that has no session and no other waiter.
    fn release_destination_lock(&self, destination: &DestinationId) {
        let mut locks = lock(&self.locks);

        let unused = locks
            .get(destination)
            .map_or(false, |destination_lock| Arc::strong_count(destination_lock) == 1);

        if unused && !lock(&self.sessions).contains_key(destination) {
            locks.remove(destination);
        }
    }

    /// Returns `true` if a session was registered for `destination`.
    pub async fn stop(&self, destination: DestinationId) -> bool {
        let stopped = {
            let destination_lock = self.destination_lock(&destination);
            let _guard = destination_lock.lock().await;

            let session = lock(&self.sessions).remove(&destination);
            match session {
                Some(session) => {
                    session.stop().await;
                    true
                }
                None => false,
            }
        };

        self.release_destination_lock(&destination);

        stopped
    }

    /// Returns `true` if a session was registered for `destination`.
    pub fn skip(&self, destination: DestinationId) -> bool {
        match self.session(destination) {
            Some(session) => {
                session.skip();
                true
            }
            None => false,
        }
    }

    pub fn session(&self, destination: DestinationId) -> Option<Arc<BroadcastSession>> {
        lock(&self.sessions).get(&destination).cloned()
    }

    pub fn status(&self, destination: DestinationId) -> Option<SessionStatus> {
        self.session(destination).map(|session| session.status())
    }

    #[cfg(test)]
    pub(crate) fn destination_locks(&self) -> usize {
        lock(&self.locks).len()
    }

    pub async fn stop_all(&self) {
        let destinations = lock(&self.sessions).keys().copied().collect::<Vec<_>>();

        info!(count = destinations.len(), "Stopping all broadcasts");

        for destination in destinations {
            self.stop(destination).await;
        }
    }
}
