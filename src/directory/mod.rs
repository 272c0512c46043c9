//! Channel and user directory
//!
//! Maps human-readable channel and user names to Slack IDs.
//!
//! Key features:
//! - Lazy-loading: the first lookup pulls the full listing
//! - Snapshot refresh: a rebuild replaces a mapping wholesale, never merges
//! - No expiry: stale entries live until a forced refresh

mod cache;
mod types;

pub use cache::{CacheStats, DirectoryCache, DirectorySource, UserDirectory, is_channel_id};
pub use types::{ChannelRecord, SLACKBOT_ID, UserRecord};
