mod ytdlp;

use serde::Serialize;

pub use ytdlp::*;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchEntry {
    pub id: String,
    pub title: String,
    pub uploader: String,
    /// Seconds, `0` when the site did not report one.
    pub duration: u32,
    pub thumbnail_url: Option<String>,
}

pub type SearchEntries = Vec<SearchEntry>;
