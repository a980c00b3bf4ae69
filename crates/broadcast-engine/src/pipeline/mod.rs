mod cache;
pub use cache::*;

#[allow(clippy::module_inception)]
mod pipeline;
pub use pipeline::*;

mod sources;
pub use sources::*;
