mod broadcast;
pub use broadcast::*;

mod catalog;
pub use catalog::*;

pub mod fallback;

mod pipeline;
pub use pipeline::*;

use serde::{Deserialize, Serialize};
use std::ops::Deref;

// DestinationId
#[derive(Eq, PartialEq, Clone, Copy, Hash, Debug, Serialize, Deserialize)]
pub struct DestinationId(pub i64);

impl Deref for DestinationId {
    type Target = i64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<i64> for DestinationId {
    fn from(value: i64) -> Self {
        DestinationId(value)
    }
}

impl std::fmt::Display for DestinationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// TrackId
#[derive(Eq, PartialEq, Clone, Hash, Debug, Serialize, Deserialize)]
pub struct TrackId(pub String);

impl Deref for TrackId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<&str> for TrackId {
    fn from(value: &str) -> Self {
        TrackId(value.to_string())
    }
}

impl From<String> for TrackId {
    fn from(value: String) -> Self {
        TrackId(value)
    }
}

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
