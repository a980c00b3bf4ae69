mod catalog;
pub(crate) use catalog::*;

mod expiring_map;
pub(crate) use expiring_map::*;

mod telegram_client;
pub(crate) use telegram_client::*;

mod ytdlp_sources;
pub(crate) use ytdlp_sources::*;
