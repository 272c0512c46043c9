use crate::error::{Result, SlackError};
use crate::slack::Params;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::level_filters::LevelFilter;

pub const DEFAULT_BASE_URL: &str = "https://slack.com/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Settings {
    pub client: ClientConfig,
    /// Present when `SLACK_LOG_CHANNEL` is set
    pub forwarder: Option<ForwarderConfig>,
}

#[derive(Clone)]
pub struct ClientConfig {
    pub token: String,
    pub base_url: String,
    pub verify_certs: bool,
    pub timeout_secs: u64,
    /// Fill the directory cache when the client is created
    pub preload_cache: bool,
}

impl ClientConfig {
    /// Create a config for `token` with default settings
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            verify_certs: true,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            preload_cache: false,
        }
    }

    /// Point the client at another API root (e.g. a test server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Toggle TLS certificate verification
    pub fn with_verify_certs(mut self, verify_certs: bool) -> Self {
        self.verify_certs = verify_certs;
        self
    }

    /// Set the per-request timeout
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Fill the directory cache when connecting
    pub fn with_preload_cache(mut self, preload_cache: bool) -> Self {
        self.preload_cache = preload_cache;
        self
    }
}

// Keep the token out of logs
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("token", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("verify_certs", &self.verify_certs)
            .field("timeout_secs", &self.timeout_secs)
            .field("preload_cache", &self.preload_cache)
            .finish()
    }
}

/// Where forwarded log records go and how they are posted
#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    pub channel: String,
    pub level: LevelFilter,
    pub username: Option<String>,
    pub icon_emoji: Option<String>,
}

impl ForwarderConfig {
    /// Create a forwarder config for `channel` at the default level
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            level: LevelFilter::WARN,
            username: None,
            icon_emoji: None,
        }
    }

    /// Extra `chat.postMessage` fields for every forwarded record
    pub fn post_options(&self) -> Params {
        let mut options = Params::new();
        if let Some(username) = &self.username {
            options.insert("username", username);
        }
        if let Some(icon_emoji) = &self.icon_emoji {
            options.insert("icon_emoji", icon_emoji);
        }
        options
    }
}

/// Load settings from `.env` (if present) and the process environment
pub fn load_settings() -> Result<Settings> {
    dotenvy::dotenv().ok();
    settings_from_lookup(|key| std::env::var(key).ok())
}

/// Load settings from a specific `.env`-format file without touching the
/// process environment. Variables already set in the environment win.
pub fn load_settings_from_path(path: impl AsRef<Path>) -> Result<Settings> {
    let path = path.as_ref();
    let file_vars: HashMap<String, String> = dotenvy::from_path_iter(path)
        .map_err(|e| SlackError::Config(format!("cannot read {}: {e}", path.display())))?
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| SlackError::Config(format!("invalid {}: {e}", path.display())))?;

    settings_from_lookup(|key| {
        std::env::var(key)
            .ok()
            .or_else(|| file_vars.get(key).cloned())
    })
}

/// Build settings from any variable source
pub fn settings_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Settings> {
    let token = lookup("SLACK_TOKEN")
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| SlackError::Config("SLACK_TOKEN not set".to_string()))?;

    let client = ClientConfig {
        token,
        base_url: lookup("SLACK_API_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        verify_certs: parse_or(&lookup, "SLACK_VERIFY_CERTS", true, parse_bool)?,
        timeout_secs: parse_or(&lookup, "SLACK_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS, |v| {
            v.parse().ok()
        })?,
        preload_cache: parse_or(&lookup, "SLACK_PRELOAD_CACHE", false, parse_bool)?,
    };

    let forwarder = match lookup("SLACK_LOG_CHANNEL") {
        Some(channel) if !channel.trim().is_empty() => Some(ForwarderConfig {
            channel,
            level: parse_or(&lookup, "SLACK_LOG_LEVEL", LevelFilter::WARN, |v| {
                LevelFilter::from_str(v).ok()
            })?,
            username: lookup("SLACK_LOG_USERNAME"),
            icon_emoji: lookup("SLACK_LOG_ICON_EMOJI"),
        }),
        _ => None,
    };

    Ok(Settings { client, forwarder })
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => parse(raw.trim()).ok_or_else(|| SlackError::Config(format!("Invalid {key}"))),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
