use crate::SearchEntry;
use serde::Deserialize;

const UNKNOWN_UPLOADER: &str = "Unknown";
/// Extractors that describe channels or playlists rather than single videos.
const NON_TRACK_EXTRACTORS: [&str; 2] = ["YoutubeTab", "YoutubePlaylist"];

#[derive(Debug, thiserror::Error)]
pub(crate) enum ParseError {
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct Thumbnail {
    url: String,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Deserialize)]
struct RawEntry {
    id: Option<String>,
    title: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    duration: Option<f64>,
    ie_key: Option<String>,
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<Thumbnail>,
}

fn best_thumbnail(entry: &RawEntry) -> Option<String> {
    entry
        .thumbnails
        .iter()
        .enumerate()
        // Later thumbnails are preferred by yt-dlp when sizes are unknown.
        .max_by_key(|(i, thumbnail)| {
            let area = u64::from(thumbnail.width.unwrap_or(0))
                * u64::from(thumbnail.height.unwrap_or(0));
            (area, *i)
        })
        .map(|(_, thumbnail)| thumbnail.url.clone())
        .or_else(|| entry.thumbnail.clone())
}

/// Parses one line of `--dump-json --flat-playlist` output.
///
/// Returns `None` for lines that are valid JSON but do not describe a playable
/// track (channels, playlists, entries without id or title).
pub(crate) fn parse_search_entry(line: &str) -> Result<Option<SearchEntry>, ParseError> {
    let entry = serde_json::from_str::<RawEntry>(line)?;

    if entry
        .ie_key
        .as_deref()
        .map_or(false, |key| NON_TRACK_EXTRACTORS.contains(&key))
    {
        return Ok(None);
    }

    let thumbnail_url = best_thumbnail(&entry);

    let (id, title) = match (entry.id, entry.title) {
        (Some(id), Some(title)) if !id.is_empty() && !title.is_empty() => (id, title),
        _ => return Ok(None),
    };

    let uploader = entry
        .uploader
        .or(entry.channel)
        .filter(|uploader| !uploader.is_empty())
        .unwrap_or_else(|| UNKNOWN_UPLOADER.to_string());

    let duration = entry
        .duration
        .filter(|duration| duration.is_finite() && *duration > 0.0)
        .map(|duration| duration.round() as u32)
        .unwrap_or_default();

    Ok(Some(SearchEntry {
        id,
        title,
        uploader,
        duration,
        thumbnail_url,
    }))
}
