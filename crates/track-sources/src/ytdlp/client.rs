use crate::ytdlp::parser::parse_search_entry;
use crate::SearchEntries;
use futures_lite::StreamExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::{debug, warn};

const MAX_LINE_LENGTH: usize = 4 * 1024 * 1024;
const AUDIO_FORMAT: &str = "mp3";

#[derive(Debug, thiserror::Error)]
pub enum YtDlpError {
    #[error("Unable to run yt-dlp: {0}")]
    Spawn(#[source] std::io::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Lines(#[from] LinesCodecError),
    #[error("yt-dlp exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },
    #[error("yt-dlp finished without producing {0}")]
    NoOutput(PathBuf),
}

/// Input for `ytsearch`: the first `limit` YouTube results for `query`.
pub fn youtube_search(query: &str, limit: usize) -> String {
    format!("ytsearch{}:{}", limit, query)
}

/// Input for `scsearch`: the best SoundCloud match for an uploader and title.
pub fn soundcloud_lookup(uploader: &str, title: &str) -> String {
    format!("scsearch1:{} - {}", uploader, title)
}

pub fn youtube_watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// Drives a local `yt-dlp` executable.
pub struct YtDlpClient {
    binary: PathBuf,
}

impl YtDlpClient {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    /// Lists search results without resolving the individual videos.
    pub async fn search(&self, query: &str, limit: usize) -> Result<SearchEntries, YtDlpError> {
        let mut child = self
            .command()
            .args(["--dump-json", "--flat-playlist", "--no-warnings", "--ignore-errors"])
            .arg(youtube_search(query, limit))
            .spawn()
            .map_err(YtDlpError::Spawn)?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (entries, stderr) = tokio::join!(read_entries(stdout), read_to_string(stderr));
        let entries = entries?;
        let status = child.wait().await?;

        if !status.success() && entries.is_empty() {
            return Err(YtDlpError::Failed {
                status,
                stderr: stderr?,
            });
        }

        debug!(query, found = entries.len(), "yt-dlp search finished");

        Ok(entries)
    }

    /// Extracts the audio of `input` (a URL or a search expression) as mp3 into `target`.
    ///
    /// Intermediate files are named after the stem of `target`.
    pub async fn download(&self, input: &str, target: &Path) -> Result<(), YtDlpError> {
        let template = target.with_extension("%(ext)s");

        let output = self
            .command()
            .args(["--format", "bestaudio/best"])
            .args(["--extract-audio", "--audio-format", AUDIO_FORMAT])
            .args(["--no-playlist", "--no-progress", "--quiet", "--no-warnings"])
            .arg("--output")
            .arg(&template)
            .arg(input)
            .output()
            .await
            .map_err(YtDlpError::Spawn)?;

        if !output.status.success() {
            return Err(YtDlpError::Failed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        if !tokio::fs::try_exists(target).await? {
            return Err(YtDlpError::NoOutput(target.to_path_buf()));
        }

        debug!(input, ?target, "yt-dlp download finished");

        Ok(())
    }
}

async fn read_entries(
    stdout: Option<impl AsyncRead + Unpin>,
) -> Result<SearchEntries, YtDlpError> {
    let stdout = match stdout {
        Some(stdout) => stdout,
        None => return Ok(vec![]),
    };

    let mut lines = FramedRead::new(stdout, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
    let mut entries = vec![];

    while let Some(line) = lines.next().await {
        let line = line?;

        if line.trim().is_empty() {
            continue;
        }

        match parse_search_entry(&line) {
            Ok(Some(entry)) => entries.push(entry),
            Ok(None) => (),
            Err(error) => warn!(?error, "Skipping malformed yt-dlp output line"),
        }
    }

    Ok(entries)
}

async fn read_to_string(stream: Option<impl AsyncRead + Unpin>) -> Result<String, YtDlpError> {
    let mut buffer = String::new();

    if let Some(mut stream) = stream {
        stream.read_to_string(&mut buffer).await?;
    }

    Ok(buffer.trim().to_string())
}
