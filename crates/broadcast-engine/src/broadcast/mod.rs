mod traits;
pub use traits::*;

mod types;
pub use types::*;

mod messages;
pub use messages::{format_duration, now_playing_caption};

mod playlist;

mod session;
pub use session::*;

mod registry;
pub use registry::*;

#[cfg(test)]
mod test_mocks;


#[cfg(test)]
mod registry_tests;
