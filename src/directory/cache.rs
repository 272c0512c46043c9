//! Directory cache resolving channel and user names to Slack IDs

use crate::directory::types::{ChannelRecord, SLACKBOT_ID, UserRecord};
use crate::error::{Result, SlackError};
use crate::slack::{ChannelId, UserId};
use regex::Regex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, LazyLock};
use tokio::sync::RwLock;

static CHANNEL_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^C[A-Z0-9]+$").expect("channel id regex is valid"));

/// Whether `value` is already a raw channel ID rather than a name
pub fn is_channel_id(value: &str) -> bool {
    CHANNEL_ID_RE.is_match(value)
}

/// Where the cache gets full listings from when it (re)builds
pub trait DirectorySource: Send + Sync {
    fn fetch_channels(&self) -> impl Future<Output = Result<Vec<ChannelRecord>>> + Send;

    fn fetch_users(&self) -> impl Future<Output = Result<Vec<UserRecord>>> + Send;
}

/// Cache statistics for monitoring
#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    pub channel_hits: u64,
    pub channel_misses: u64,
    pub user_hits: u64,
    pub user_misses: u64,
    pub channel_refreshes: u64,
    pub user_refreshes: u64,
    pub api_errors: u64,
}

/// One `users.list` snapshot indexed both ways
#[derive(Debug, Default)]
pub struct UserDirectory {
    by_id: HashMap<String, UserRecord>,
    by_name: HashMap<String, UserRecord>,
}

impl UserDirectory {
    fn from_records(records: Vec<UserRecord>) -> Self {
        let mut directory = Self::default();
        for user in records {
            directory.by_name.insert(user.name.clone(), user.clone());
            directory.by_id.insert(user.id.clone(), user);
        }
        directory
            .by_id
            .entry(SLACKBOT_ID.to_string())
            .or_insert_with(UserRecord::slackbot);
        directory
    }

    /// Look up a user by Slack ID (includes Slackbot)
    pub fn by_id(&self, id: &str) -> Option<&UserRecord> {
        self.by_id.get(id)
    }

    /// Look up a user by handle
    pub fn by_name(&self, name: &str) -> Option<&UserRecord> {
        self.by_name.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }
}

/// In-memory name directory for one Slack workspace.
///
/// Each mapping is an immutable snapshot swapped in whole on refresh, so a
/// reader never sees a mix of two listings. Nothing expires on its own; call
/// [`DirectoryCache::ensure_populated`] with `force_refresh` to rebuild.
#[derive(Default)]
pub struct DirectoryCache {
    /// Channel name (no #) to record
    channels: RwLock<Arc<HashMap<String, ChannelRecord>>>,

    users: RwLock<Arc<UserDirectory>>,

    stats: RwLock<CacheStats>,
}

impl DirectoryCache {
    /// Create an empty, unpopulated cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a channel name (with or without #) or ID to a channel ID.
    ///
    /// IDs pass through untouched. A miss, or `force_refresh`, rebuilds the
    /// channel mapping once and looks again.
    pub async fn resolve_channel<S: DirectorySource>(
        &self,
        source: &S,
        name_or_id: &str,
        force_refresh: bool,
    ) -> Result<ChannelId> {
        if is_channel_id(name_or_id) {
            return Ok(ChannelId::new(name_or_id));
        }

        let name = name_or_id.strip_prefix('#').unwrap_or(name_or_id);

        if !force_refresh && let Some(id) = self.lookup_channel(name).await {
            self.stats.write().await.channel_hits += 1;
            tracing::trace!(channel = %name, channel_id = %id, "Channel cache hit");
            return Ok(id);
        }

        self.stats.write().await.channel_misses += 1;
        tracing::debug!(
            channel = %name,
            force_refresh = force_refresh,
            "Channel cache miss, refreshing channel list"
        );

        self.refresh_channels(source).await?;

        self.lookup_channel(name)
            .await
            .ok_or_else(|| SlackError::ChannelNotFound(name.to_string()))
    }

    /// Resolve a user name (with or without @) to a user ID. Never refreshes.
    pub async fn resolve_user(&self, name: &str) -> Result<UserId> {
        let name = name.strip_prefix('@').unwrap_or(name);
        let found = self.users.read().await.by_name(name).map(|u| u.id.clone());

        match found {
            Some(id) => {
                self.stats.write().await.user_hits += 1;
                Ok(UserId::new(id))
            }
            None => {
                self.stats.write().await.user_misses += 1;
                tracing::debug!(user = %name, "User not in cache");
                Err(SlackError::UserNotFound(name.to_string()))
            }
        }
    }

    /// Populate whichever mappings are empty, or both when `force_refresh`
    pub async fn ensure_populated<S: DirectorySource>(
        &self,
        source: &S,
        force_refresh: bool,
    ) -> Result<()> {
        if force_refresh || !self.is_users_populated().await {
            self.refresh_users(source).await?;
        }
        if force_refresh || !self.is_channels_populated().await {
            self.refresh_channels(source).await?;
        }
        Ok(())
    }

    /// Replace the channel mapping with a fresh listing
    pub async fn refresh_channels<S: DirectorySource>(&self, source: &S) -> Result<()> {
        let records = match source.fetch_channels().await {
            Ok(records) => records,
            Err(e) => {
                self.stats.write().await.api_errors += 1;
                return Err(e);
            }
        };

        let snapshot: HashMap<String, ChannelRecord> = records
            .into_iter()
            .map(|channel| (channel.name.clone(), channel))
            .collect();
        let count = snapshot.len();

        *self.channels.write().await = Arc::new(snapshot);
        self.stats.write().await.channel_refreshes += 1;
        tracing::info!(channels = count, "Channel cache rebuilt");
        Ok(())
    }

    /// Replace the user mappings with a fresh listing
    pub async fn refresh_users<S: DirectorySource>(&self, source: &S) -> Result<()> {
        let records = match source.fetch_users().await {
            Ok(records) => records,
            Err(e) => {
                self.stats.write().await.api_errors += 1;
                return Err(e);
            }
        };

        let snapshot = UserDirectory::from_records(records);
        let count = snapshot.len();

        *self.users.write().await = Arc::new(snapshot);
        self.stats.write().await.user_refreshes += 1;
        tracing::info!(users = count, "User cache rebuilt");
        Ok(())
    }

    async fn lookup_channel(&self, name: &str) -> Option<ChannelId> {
        self.channels
            .read()
            .await
            .get(name)
            .map(|c| ChannelId::new(c.id.clone()))
    }

    /// Cached channel record for a name, without refreshing
    pub async fn channel_by_name(&self, name: &str) -> Option<ChannelRecord> {
        let name = name.strip_prefix('#').unwrap_or(name);
        self.channels.read().await.get(name).cloned()
    }

    /// Cached user record for an ID
    pub async fn user_by_id(&self, id: &str) -> Option<UserRecord> {
        self.users.read().await.by_id(id).cloned()
    }

    /// Current user snapshot; stays valid even if a refresh swaps in a new one
    pub async fn users(&self) -> Arc<UserDirectory> {
        self.users.read().await.clone()
    }

    /// Check if the channel mapping holds a listing
    pub async fn is_channels_populated(&self) -> bool {
        !self.channels.read().await.is_empty()
    }

    pub async fn is_users_populated(&self) -> bool {
        !self.users.read().await.is_empty()
    }

    /// Get current cache sizes as (channels, users)
    pub async fn cache_sizes(&self) -> (usize, usize) {
        (
            self.channels.read().await.len(),
            self.users.read().await.len(),
        )
    }

    /// Snapshot of the cache statistics
    pub async fn get_stats(&self) -> CacheStats {
        self.stats.read().await.clone()
    }

    /// Drop both mappings; the next lookup repopulates lazily
    pub async fn clear(&self) {
        *self.channels.write().await = Arc::new(HashMap::new());
        *self.users.write().await = Arc::new(UserDirectory::default());
    }

    /// Log cache statistics (for periodic monitoring)
    pub async fn log_stats(&self) {
        let stats = self.get_stats().await;
        let (channel_count, user_count) = self.cache_sizes().await;

        let channel_hit_rate = hit_rate(stats.channel_hits, stats.channel_misses);
        let user_hit_rate = hit_rate(stats.user_hits, stats.user_misses);

        tracing::info!(
            channels_cached = channel_count,
            users_cached = user_count,
            channel_hit_rate = channel_hit_rate,
            user_hit_rate = user_hit_rate,
            channel_refreshes = stats.channel_refreshes,
            user_refreshes = stats.user_refreshes,
            api_errors = stats.api_errors,
            "Directory cache statistics"
        );
    }
}

fn hit_rate(hits: u64, misses: u64) -> u32 {
    if hits + misses > 0 {
        (hits as f32 / (hits + misses) as f32 * 100.0) as u32
    } else {
        0
    }
}
