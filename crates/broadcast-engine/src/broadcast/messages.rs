use crate::broadcast::types::{Topic, TrackDescriptor};
use rand::seq::IndexedRandom;

const ICONS: [&str; 5] = ["🎧", "🎵", "🎶", "📻", "💿"];
const TITLE_DISPLAY_LENGTH: usize = 40;
const UPLOADER_DISPLAY_LENGTH: usize = 30;
const MARKDOWN_CONTROL_CHARS: [char; 5] = ['*', '_', '`', '[', ']'];

pub(crate) const SEARCHING_STATUS: &str = "📡 Searching for music...";

pub fn format_duration(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Drops Markdown control characters and cuts the text to `max_chars` characters.
pub(crate) fn sanitize(text: &str, max_chars: usize) -> String {
    text.chars()
        .filter(|c| !MARKDOWN_CONTROL_CHARS.contains(c))
        .take(max_chars)
        .collect::<String>()
        .trim()
        .to_string()
}

pub fn now_playing_caption(track: &TrackDescriptor, display_name: &str) -> String {
    let icon = ICONS.choose(&mut rand::rng()).copied().unwrap_or("🎧");

    format!(
        "{} *{}*\n👤 {}\n⏱ {} | 📻 _{}_",
        icon,
        sanitize(&track.title, TITLE_DISPLAY_LENGTH),
        sanitize(&track.uploader, UPLOADER_DISPLAY_LENGTH),
        format_duration(track.duration),
        sanitize(display_name, usize::MAX),
    )
}

pub(crate) fn loading_status(track: &TrackDescriptor) -> String {
    format!(
        "⬇️ Loading: *{}*...",
        sanitize(&track.title, TITLE_DISPLAY_LENGTH)
    )
}

pub(crate) fn rotation_notice(topic: &Topic) -> String {
    format!(
        "🔀 Switching the station to *{}*",
        sanitize(&topic.display_name, usize::MAX)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(title: &str, uploader: &str, duration: u32) -> TrackDescriptor {
        TrackDescriptor {
            id: "id".into(),
            title: title.into(),
            uploader: uploader.into(),
            duration,
            artwork_url: None,
        }
    }

    #[test]
    fn should_format_duration_as_minutes_and_seconds() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(65), "1:05");
        assert_eq!(format_duration(3600), "60:00");
    }

    #[test]
    fn should_strip_markdown_and_truncate_by_characters() {
        assert_eq!(sanitize("*Bold* _title_ [x]", 100), "Bold title x");
        assert_eq!(sanitize("Привет мир", 6), "Привет");
        assert_eq!(sanitize("  padded  ", 100), "padded");
    }

    #[test]
    fn should_build_now_playing_caption() {
        let caption = now_playing_caption(
            &track(&"a".repeat(60), "Some *Artist*", 125),
            "Lo_Fi",
        );

        let expected_tail = format!("*{}*\n👤 Some Artist\n⏱ 2:05 | 📻 _LoFi_", "a".repeat(40));
        assert!(caption.ends_with(&expected_tail), "{}", caption);
        assert!(ICONS.iter().any(|icon| caption.starts_with(icon)));
    }

    #[test]
    fn should_sanitize_loading_status() {
        assert_eq!(
            loading_status(&track("Song *1*", "x", 1)),
            "⬇️ Loading: *Song 1*..."
        );
    }
}
