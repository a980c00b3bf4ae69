use broadcast_engine::{PipelineSettings, SessionSettings};
use serde::Deserialize;
use std::time::Duration;

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30u64
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_ytdlp_path() -> String {
    "yt-dlp".to_string()
}

fn default_downloads_directory() -> String {
    "downloads".to_string()
}

fn default_max_concurrent_downloads() -> usize {
    3
}

fn default_content_cache_ttl() -> u64 {
    60 * 60
}

fn default_search_timeout() -> u64 {
    30
}

fn default_fetch_timeout() -> u64 {
    180
}

fn default_rotation_period() -> u64 {
    60 * 60
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_low_water_mark() -> usize {
    3
}

fn default_played_history_cap() -> usize {
    200
}

#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct TelegramCredentials {
    #[serde(rename = "telegram_bot_token")]
    pub(crate) bot_token: String,
}

/// Durations are in seconds.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct Config {
    #[serde(default = "default_bind_address")]
    pub(crate) bind_address: String,
    #[serde(default = "default_shutdown_timeout")]
    pub(crate) shutdown_timeout: u64,
    #[serde(default = "default_telegram_api_url")]
    pub(crate) telegram_api_url: String,
    #[serde(default = "default_ytdlp_path")]
    pub(crate) ytdlp_path: String,
    #[serde(default = "default_downloads_directory")]
    pub(crate) downloads_directory: String,
    #[serde(default)]
    pub(crate) catalog_path: Option<String>,
    #[serde(default = "default_max_concurrent_downloads")]
    pub(crate) max_concurrent_downloads: usize,
    #[serde(default = "default_content_cache_ttl")]
    pub(crate) content_cache_ttl: u64,
    #[serde(default = "default_search_timeout")]
    pub(crate) search_timeout: u64,
    #[serde(default = "default_fetch_timeout")]
    pub(crate) fetch_timeout: u64,
    #[serde(default = "default_rotation_period")]
    pub(crate) rotation_period: u64,
    #[serde(default = "default_failure_threshold")]
    pub(crate) failure_threshold: u32,
    #[serde(default = "default_low_water_mark")]
    pub(crate) low_water_mark: usize,
    #[serde(default = "default_played_history_cap")]
    pub(crate) played_history_cap: usize,
    // Loaded separately: envy hands every value to flattened structs as a string.
    #[serde(skip)]
    pub(crate) telegram: TelegramCredentials,
}

impl Config {
    pub(crate) fn from_env() -> Self {
        let config = envy::from_env::<Self>().and_then(|mut config| {
            config.telegram = envy::from_env::<TelegramCredentials>()?;
            Ok(config)
        });

        match config {
            Ok(config) => config,
            Err(error) => panic!("Missing environment variable: {:#?}", error),
        }
    }

    pub(crate) fn content_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.content_cache_ttl)
    }

    pub(crate) fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            rotation_period: Duration::from_secs(self.rotation_period),
            failure_threshold: self.failure_threshold,
            low_water_mark: self.low_water_mark,
            played_history_cap: self.played_history_cap,
            ..SessionSettings::default()
        }
    }

    pub(crate) fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            max_concurrent_fetches: self.max_concurrent_downloads,
            search_timeout: Duration::from_secs(self.search_timeout),
            fetch_timeout: Duration::from_secs(self.fetch_timeout),
            ..PipelineSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn should_apply_defaults() {
        let config = envy::from_iter::<_, Config>(vars(&[])).unwrap();

        assert_eq!(config.bind_address, "0.0.0.0:8080");
        assert_eq!(config.ytdlp_path, "yt-dlp");
        assert_eq!(config.catalog_path, None);
        assert_eq!(config.content_cache_ttl(), Duration::from_secs(3600));

        let session = config.session_settings();
        assert_eq!(session.rotation_period, Duration::from_secs(3600));
        assert_eq!(session.failure_threshold, 5);
        assert_eq!(session.low_water_mark, 3);
        assert_eq!(session.played_history_cap, 200);

        let pipeline = config.pipeline_settings();
        assert_eq!(pipeline.max_concurrent_fetches, 3);
        assert_eq!(pipeline.search_timeout, Duration::from_secs(30));
        assert_eq!(pipeline.fetch_timeout, Duration::from_secs(180));
    }

    #[test]
    fn should_read_overrides() {
        let config = envy::from_iter::<_, Config>(vars(&[
            ("CATALOG_PATH", "/etc/radio/catalog.json"),
            ("MAX_CONCURRENT_DOWNLOADS", "5"),
            ("ROTATION_PERIOD", "600"),
            ("FAILURE_THRESHOLD", "2"),
        ]))
        .unwrap();

        assert_eq!(config.catalog_path.as_deref(), Some("/etc/radio/catalog.json"));
        assert_eq!(config.pipeline_settings().max_concurrent_fetches, 5);
        assert_eq!(config.session_settings().rotation_period, Duration::from_secs(600));
        assert_eq!(config.session_settings().failure_threshold, 2);
    }

    #[test]
    fn should_read_telegram_credentials() {
        let credentials = envy::from_iter::<_, TelegramCredentials>(vars(&[(
            "TELEGRAM_BOT_TOKEN",
            "123:abc",
        )]))
        .unwrap();

        assert_eq!(credentials.bot_token, "123:abc");
    }
}
