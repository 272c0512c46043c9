pub mod config;
pub mod directory;
pub mod error;
pub mod forward;
pub mod logging;
pub mod slack;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Result, SlackError};
pub use forward::{LogRecord, SlackHandler, SlackLayer};
pub use slack::{Params, SlackClient};
