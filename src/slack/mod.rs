mod client;
mod params;
mod rate_limit;
mod transport;
mod types;

pub use client::{HISTORY_COUNT_RANGE, SlackClient};
pub use params::Params;
pub use rate_limit::{Clock, DEFAULT_RETRY_AFTER_SECS, ManualClock, RateLimitGate, SystemClock};
pub use transport::{HttpBackend, RawResponse, ReqwestBackend, Transport};
pub use types::{ChannelId, MessageTs, UserId};
