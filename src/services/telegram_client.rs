use crate::services::ExpiringMap;
use async_trait::async_trait;
use broadcast_engine::{
    DestinationId, FetchedAudio, OutputChannel, OutputChannelError, StatusHandle, TrackId,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

const PARSE_MODE: &str = "Markdown";
const CHAT_NOT_FOUND: &str = "chat not found";
const DEFAULT_RETRY_AFTER: u64 = 1;
const FILE_ID_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const FILE_ID_CAPACITY: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub(crate) enum TelegramClientError {
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Telegram API error {status}: {description}")]
    Api {
        status: StatusCode,
        description: String,
        retry_after: Option<u64>,
    },
}

impl From<TelegramClientError> for OutputChannelError {
    fn from(error: TelegramClientError) -> Self {
        match error {
            TelegramClientError::Api {
                status: StatusCode::TOO_MANY_REQUESTS,
                retry_after,
                ..
            } => OutputChannelError::RateLimited(Duration::from_secs(
                retry_after.unwrap_or(DEFAULT_RETRY_AFTER),
            )),
            TelegramClientError::Api {
                status,
                description,
                ..
            } if status == StatusCode::FORBIDDEN
                || description.to_lowercase().contains(CHAT_NOT_FOUND) =>
            {
                OutputChannelError::Unreachable(description)
            }
            error => OutputChannelError::Transient(error.to_string()),
        }
    }
}

#[derive(Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Deserialize)]
struct Audio {
    file_id: String,
}

#[derive(Deserialize)]
struct Message {
    message_id: i64,
    audio: Option<Audio>,
}

fn into_result<T>(status: StatusCode, response: ApiResponse<T>) -> Result<T, TelegramClientError> {
    match response {
        ApiResponse {
            ok: true,
            result: Some(result),
            ..
        } => Ok(result),
        response => Err(TelegramClientError::Api {
            status,
            description: response
                .description
                .unwrap_or_else(|| status.to_string()),
            retry_after: response.parameters.and_then(|p| p.retry_after),
        }),
    }
}

/// Bot API output channel.
///
/// Audio that was uploaded once is re-sent by its remote `file_id` for a day.
pub(crate) struct TelegramClient {
    client: Client,
    endpoint: String,
    file_ids: ExpiringMap<TrackId, String>,
}

impl TelegramClient {
    pub(crate) fn create(api_url: &str, bot_token: &str) -> Self {
        let client = Client::builder()
            .build()
            .expect("Failed to create HTTP Client");

        Self {
            client,
            endpoint: format!("{}/bot{}", api_url.trim_end_matches('/'), bot_token),
            file_ids: ExpiringMap::new(FILE_ID_TTL, FILE_ID_CAPACITY),
        }
    }

    fn method(&self, name: &str) -> RequestBuilder {
        self.client.post(format!("{}/{}", self.endpoint, name))
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, TelegramClientError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.json::<ApiResponse<T>>().await?;

        into_result(status, body)
    }

    fn cached_file_id(&self, track_id: &TrackId) -> Option<String> {
        self.file_ids.get(track_id)
    }

    fn remember_file_id(&self, track_id: &TrackId, file_id: Option<String>) {
        match file_id {
            Some(file_id) => self.file_ids.insert(track_id.clone(), file_id),
            None => self.file_ids.remove(track_id),
        }
    }

    async fn send_audio_by_reference(
        &self,
        destination: &DestinationId,
        audio: &FetchedAudio,
        file_id: &str,
        caption: &str,
    ) -> Result<(), TelegramClientError> {
        self.execute::<Message>(self.method("sendAudio").json(&serde_json::json!({
            "chat_id": destination.0,
            "audio": file_id,
            "caption": caption,
            "parse_mode": PARSE_MODE,
        })))
        .await?;

        debug!(%destination, track_id = %audio.track().id, "Audio re-sent by reference");

        Ok(())
    }

    async fn upload_audio(
        &self,
        destination: &DestinationId,
        audio: &FetchedAudio,
        caption: &str,
    ) -> Result<Option<String>, TelegramClientError> {
        let track = audio.track();
        let file = tokio::fs::File::open(audio.path()).await?;
        let length = file.metadata().await?.len();
        let file_name = audio
            .path()
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("{}.mp3", track.id));
        let mime_type = mime_guess::from_path(audio.path()).first_or_octet_stream();

        let part = Part::stream_with_length(Body::wrap_stream(ReaderStream::new(file)), length)
            .file_name(file_name)
            .mime_str(mime_type.as_ref())?;

        let mut form = Form::new()
            .text("chat_id", destination.0.to_string())
            .text("caption", caption.to_string())
            .text("parse_mode", PARSE_MODE)
            .text("title", track.title.clone())
            .text("performer", track.uploader.clone())
            .part("audio", part);

        if track.duration > 0 {
            form = form.text("duration", track.duration.to_string());
        }

        let message = self
            .execute::<Message>(self.method("sendAudio").multipart(form))
            .await?;

        Ok(message.audio.map(|audio| audio.file_id))
    }
}

#[async_trait]
impl OutputChannel for TelegramClient {
    async fn send_status(
        &self,
        destination: &DestinationId,
        text: &str,
    ) -> Result<StatusHandle, OutputChannelError> {
        let message = self
            .execute::<Message>(self.method("sendMessage").json(&serde_json::json!({
                "chat_id": destination.0,
                "text": text,
                "parse_mode": PARSE_MODE,
            })))
            .await?;

        Ok(StatusHandle {
            destination: *destination,
            message_id: message.message_id,
        })
    }

    async fn update_status(
        &self,
        handle: &StatusHandle,
        text: &str,
    ) -> Result<(), OutputChannelError> {
        self.execute::<serde_json::Value>(self.method("editMessageText").json(
            &serde_json::json!({
                "chat_id": handle.destination.0,
                "message_id": handle.message_id,
                "text": text,
                "parse_mode": PARSE_MODE,
            }),
        ))
        .await?;

        Ok(())
    }

    async fn delete_status(&self, handle: &StatusHandle) -> Result<(), OutputChannelError> {
        self.execute::<bool>(self.method("deleteMessage").json(&serde_json::json!({
            "chat_id": handle.destination.0,
            "message_id": handle.message_id,
        })))
        .await?;

        Ok(())
    }

    async fn send_audio(
        &self,
        destination: &DestinationId,
        audio: &FetchedAudio,
        caption: &str,
    ) -> Result<(), OutputChannelError> {
        let track_id = &audio.track().id;

        if let Some(file_id) = self.cached_file_id(track_id) {
            match self
                .send_audio_by_reference(destination, audio, &file_id, caption)
                .await
                .map_err(OutputChannelError::from)
            {
                Ok(()) => return Ok(()),
                // The reference may still be fine; an upload would hit the same limit.
                Err(error @ OutputChannelError::RateLimited(_)) => return Err(error),
                Err(error) if error.is_permanent() => return Err(error),
                Err(error) => {
                    warn!(?error, %track_id, "Cached file reference rejected, uploading again");
                    self.remember_file_id(track_id, None);
                }
            }
        }

        let file_id = self.upload_audio(destination, audio, caption).await?;
        self.remember_file_id(track_id, file_id);

        Ok(())
    }
}
