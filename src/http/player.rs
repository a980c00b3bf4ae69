use crate::services::ExpiringMap;
use actix_web::web::{Bytes, Data, Path, Query};
use actix_web::{HttpResponse, Responder};
use broadcast_engine::{FetchError, FetchedAudio, TrackDescriptor, TrackId, TrackProvider};
use futures_lite::Stream;
use serde::Deserialize;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

const DEFAULT_SEARCH_LIMIT: usize = 20;
const MAX_SEARCH_LIMIT: usize = 50;

const SEARCHED_TRACK_TTL: Duration = Duration::from_secs(60 * 60);
const SEARCHED_TRACK_CAPACITY: usize = 1_000;

/// Metadata of recently searched tracks, so `/stream/{id}` can look them up by title.
pub(crate) struct TrackIndex(ExpiringMap<TrackId, TrackDescriptor>);

impl TrackIndex {
    pub(crate) fn new() -> Self {
        Self(ExpiringMap::new(SEARCHED_TRACK_TTL, SEARCHED_TRACK_CAPACITY))
    }

    fn remember(&self, track: &TrackDescriptor) {
        self.0.insert(track.id.clone(), track.clone());
    }

    /// Falls back to a descriptor carrying only the id.
    fn lookup(&self, id: TrackId) -> TrackDescriptor {
        self.0.get(&id).unwrap_or(TrackDescriptor {
            id,
            title: String::new(),
            uploader: String::new(),
            duration: 0,
            artwork_url: None,
        })
    }
}

#[derive(Deserialize)]
pub(crate) struct SearchQuery {
    #[serde(default)]
    query: String,
    #[serde(default = "default_search_limit")]
    limit: usize,
}

fn default_search_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

pub(crate) async fn search_tracks(
    provider: Data<Arc<dyn TrackProvider>>,
    index: Data<TrackIndex>,
    params: Query<SearchQuery>,
) -> impl Responder {
    let query = params.query.trim();

    if query.is_empty() {
        return HttpResponse::Ok().json(serde_json::json!({ "playlist": [] }));
    }

    let limit = params.limit.clamp(1, MAX_SEARCH_LIMIT);

    match provider.search(query, limit).await {
        Ok(tracks) => {
            tracks.iter().for_each(|track| index.remember(track));

            HttpResponse::Ok().json(serde_json::json!({ "playlist": tracks }))
        }
        Err(error) => {
            warn!(?error, %query, "Search failed");

            HttpResponse::BadGateway().json(serde_json::json!({ "error": error.to_string() }))
        }
    }
}

pub(crate) async fn stream_track(
    provider: Data<Arc<dyn TrackProvider>>,
    index: Data<TrackIndex>,
    id: Path<String>,
) -> impl Responder {
    let track = index.lookup(TrackId(id.into_inner()));

    info!(track_id = %track.id, "Track stream requested");

    let audio = match provider.fetch(&track).await {
        Ok(audio) => audio,
        Err(FetchError::Unavailable(errors)) => {
            warn!(?errors, track_id = %track.id, "Track is unavailable");

            return HttpResponse::NotFound()
                .json(serde_json::json!({ "error": "Download failed" }));
        }
        Err(error) => {
            warn!(?error, track_id = %track.id, "Unable to fetch track");

            return HttpResponse::InternalServerError()
                .json(serde_json::json!({ "error": error.to_string() }));
        }
    };

    match tokio::fs::File::open(audio.path()).await {
        Ok(file) => {
            let mime_type = mime_guess::from_path(audio.path()).first_or_octet_stream();

            HttpResponse::Ok()
                .content_type(mime_type.as_ref())
                .streaming(AudioStream {
                    chunks: ReaderStream::new(file),
                    _audio: audio,
                })
        }
        Err(error) => {
            warn!(?error, path = ?audio.path(), "Unable to open fetched audio");

            HttpResponse::InternalServerError()
                .json(serde_json::json!({ "error": error.to_string() }))
        }
    }
}

/// Response body that owns the fetched file until the client has read it.
struct AudioStream {
    chunks: ReaderStream<tokio::fs::File>,
    _audio: FetchedAudio,
}

impl Stream for AudioStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().chunks).poll_next(cx)
    }
}
