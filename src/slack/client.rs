use crate::config::ClientConfig;
use crate::directory::{ChannelRecord, DirectoryCache, DirectorySource, UserDirectory, UserRecord};
use crate::error::{Result, SlackError};
use crate::slack::{
    ChannelId, Clock, HttpBackend, MessageTs, Params, RateLimitGate, ReqwestBackend,
    SystemClock, Transport, UserId,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// Inclusive bounds Slack accepts for `channels.history` `count`
pub const HISTORY_COUNT_RANGE: std::ops::RangeInclusive<u32> = 1..=1000;

/// Slack Web API client.
///
/// Channel arguments accept an ID (`C024BE91L`) or a name with or without `#`;
/// names go through the directory cache. Every method takes `options`, extra
/// form fields sent as-is. Typed arguments win over an option with the same key.
pub struct SlackClient<B = ReqwestBackend> {
    transport: Transport<B>,
    directory: DirectoryCache,
}

impl SlackClient<ReqwestBackend> {
    /// Client for `token` against the public Slack API, with default settings
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::from_config(ClientConfig::new(token))
    }

    /// Create a client with a reqwest backend built from `config`
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let backend = ReqwestBackend::new(&config)?;
        Ok(Self::with_backend(config, backend))
    }

    /// Like [`Self::from_config`], but fills the directory cache up front
    /// when `preload_cache` is set
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let preload = config.preload_cache;
        let client = Self::from_config(config)?;
        if preload {
            client.setup_cache(false).await?;
        }
        Ok(client)
    }
}

impl<B: HttpBackend> SlackClient<B> {
    /// Create a client over any HTTP backend
    pub fn with_backend(config: ClientConfig, backend: B) -> Self {
        Self::with_clock(config, backend, Arc::new(SystemClock))
    }

    /// Build with an explicit clock driving the rate-limit gate
    pub fn with_clock(config: ClientConfig, backend: B, clock: Arc<dyn Clock>) -> Self {
        let transport = Transport::new(
            backend,
            config.base_url,
            config.token,
            RateLimitGate::with_clock(clock),
        );
        Self {
            transport,
            directory: DirectoryCache::new(),
        }
    }

    /// Get the channel/user directory cache
    pub fn directory(&self) -> &DirectoryCache {
        &self.directory
    }

    /// Get the rate-limit gate shared by every call
    pub fn rate_limit_gate(&self) -> &RateLimitGate {
        self.transport.gate()
    }

    pub fn backend(&self) -> &B {
        self.transport.backend()
    }

    /// Call any API method directly
    pub async fn api_call(&self, method: &str, params: Params) -> Result<Value> {
        self.transport.post(method, params).await
    }

    /// Fill the user and channel caches (only the empty ones unless forced)
    pub async fn setup_cache(&self, force_refresh: bool) -> Result<()> {
        self.directory
            .ensure_populated(&self.transport, force_refresh)
            .await
    }

    /// Resolve a channel name or ID, refreshing the cache on a miss
    pub async fn resolve_channel(&self, channel: &str, force_refresh: bool) -> Result<ChannelId> {
        self.directory
            .resolve_channel(&self.transport, channel, force_refresh)
            .await
    }

    /// Resolve from the user cache; populate it first with [`Self::setup_cache`]
    pub async fn resolve_user(&self, user: &str) -> Result<UserId> {
        self.directory.resolve_user(user).await
    }

    /// chat.postMessage
    pub async fn post_message(&self, channel: &str, text: &str, options: Params) -> Result<Value> {
        let channel = self.resolve_channel(channel, false).await?;
        let params = with_required(options, [("channel", channel.as_str()), ("text", text)]);
        self.api_call("chat.postMessage", params).await
    }

    /// chat.update
    pub async fn update_message(
        &self,
        channel: &str,
        ts: &MessageTs,
        text: &str,
        options: Params,
    ) -> Result<Value> {
        let channel = self.resolve_channel(channel, false).await?;
        let params = with_required(
            options,
            [
                ("channel", channel.as_str()),
                ("ts", ts.as_str()),
                ("text", text),
            ],
        );
        self.api_call("chat.update", params).await
    }

    /// chat.delete
    pub async fn delete_message(
        &self,
        channel: &str,
        ts: &MessageTs,
        options: Params,
    ) -> Result<Value> {
        let channel = self.resolve_channel(channel, false).await?;
        let params = with_required(options, [("channel", channel.as_str()), ("ts", ts.as_str())]);
        self.api_call("chat.delete", params).await
    }

    /// channels.history
    ///
    /// `count` must be within 1..=1000; that is checked before any request.
    /// With `prettify`, each message's `user` ID is replaced by the cached user
    /// record when one exists.
    pub async fn channel_history(
        &self,
        channel: &str,
        count: u32,
        prettify: bool,
        options: Params,
    ) -> Result<Value> {
        if !HISTORY_COUNT_RANGE.contains(&count) {
            return Err(SlackError::Validation(format!(
                "count parameter out of range (must be 1-1000, got {count})"
            )));
        }

        self.setup_cache(false).await?;

        let channel = self.resolve_channel(channel, false).await?;
        let count = count.to_string();
        let params = with_required(
            options,
            [("channel", channel.as_str()), ("count", count.as_str())],
        );
        let mut result = self.api_call("channels.history", params).await?;

        if prettify {
            let users = self.directory.users().await;
            if let Some(messages) = result.get_mut("messages").and_then(Value::as_array_mut) {
                for message in messages {
                    prettify_message(message, &users);
                }
            }
        }

        Ok(result)
    }

    /// channels.list
    pub async fn list_channels(&self, exclude_archived: bool, options: Params) -> Result<Value> {
        let params = with_required(
            options,
            [("exclude_archived", if exclude_archived { "1" } else { "0" })],
        );
        self.api_call("channels.list", params).await
    }

    /// users.list
    pub async fn list_users(&self, options: Params) -> Result<Value> {
        self.api_call("users.list", options).await
    }

    /// channels.info
    pub async fn channel_info(&self, channel: &str, options: Params) -> Result<Value> {
        let channel = self.resolve_channel(channel, false).await?;
        let params = with_required(options, [("channel", channel.as_str())]);
        self.api_call("channels.info", params).await
    }

    /// channels.invite; `user` is a user name looked up in the cache
    pub async fn invite(&self, channel: &str, user: &str, options: Params) -> Result<Value> {
        self.setup_cache(false).await?;

        let channel = self.resolve_channel(channel, false).await?;
        let user = self.resolve_user(user).await?;
        let params = with_required(
            options,
            [("channel", channel.as_str()), ("user", user.as_str())],
        );
        self.api_call("channels.invite", params).await
    }

    /// channels.join (the method takes the channel as `name`)
    pub async fn join(&self, channel: &str, options: Params) -> Result<Value> {
        let channel = self.resolve_channel(channel, false).await?;
        let params = with_required(options, [("name", channel.as_str())]);
        self.api_call("channels.join", params).await
    }

    /// channels.leave
    pub async fn leave(&self, channel: &str, options: Params) -> Result<Value> {
        let channel = self.resolve_channel(channel, false).await?;
        let params = with_required(options, [("channel", channel.as_str())]);
        self.api_call("channels.leave", params).await
    }

    /// channels.mark: move the read cursor to `ts`
    pub async fn mark(&self, channel: &str, ts: &MessageTs, options: Params) -> Result<Value> {
        let channel = self.resolve_channel(channel, false).await?;
        let params = with_required(options, [("channel", channel.as_str()), ("ts", ts.as_str())]);
        self.api_call("channels.mark", params).await
    }

    /// channels.setPurpose
    pub async fn set_purpose(&self, channel: &str, purpose: &str, options: Params) -> Result<Value> {
        let channel = self.resolve_channel(channel, false).await?;
        let params = with_required(
            options,
            [("channel", channel.as_str()), ("purpose", purpose)],
        );
        self.api_call("channels.setPurpose", params).await
    }

    /// channels.setTopic
    pub async fn set_topic(&self, channel: &str, topic: &str, options: Params) -> Result<Value> {
        let channel = self.resolve_channel(channel, false).await?;
        let params = with_required(options, [("channel", channel.as_str()), ("topic", topic)]);
        self.api_call("channels.setTopic", params).await
    }

    /// auth.test
    pub async fn auth_test(&self, options: Params) -> Result<Value> {
        self.api_call("auth.test", options).await
    }

    /// emoji.list
    pub async fn emoji_list(&self, options: Params) -> Result<Value> {
        self.api_call("emoji.list", options).await
    }

    /// stars.list for a user name; `count` defaults to 100 and `page` to 1,
    /// either can be overridden through `options`
    pub async fn stars_list(&self, user: &str, options: Params) -> Result<Value> {
        self.setup_cache(false).await?;

        let user = self.resolve_user(user).await?;
        let mut params = Params::new().with("count", 100).with("page", 1);
        params.merge(&options);
        params.insert("user", user.as_str());
        self.api_call("stars.list", params).await
    }
}

impl<B: HttpBackend> DirectorySource for Transport<B> {
    async fn fetch_channels(&self) -> Result<Vec<ChannelRecord>> {
        let result = self
            .post("channels.list", Params::new().with("exclude_archived", 1))
            .await?;
        take_records(result, "channels", "channels.list")
    }

    async fn fetch_users(&self) -> Result<Vec<UserRecord>> {
        let result = self.post("users.list", Params::new()).await?;
        take_records(result, "members", "users.list")
    }
}

/// Caller options first, then the method's own arguments on top
fn with_required<const N: usize>(options: Params, required: [(&str, &str); N]) -> Params {
    let mut params = options;
    for (key, value) in required {
        params.insert(key, value);
    }
    params
}

fn take_records<T: DeserializeOwned>(mut result: Value, key: &str, method: &str) -> Result<Vec<T>> {
    match result.get_mut(key).map(Value::take) {
        Some(list) => Ok(serde_json::from_value(list)?),
        None => Err(SlackError::InvalidResponse(format!(
            "{method} response has no '{key}' list"
        ))),
    }
}

fn prettify_message(message: &mut Value, users: &UserDirectory) {
    let Some(user_id) = message.get("user").and_then(Value::as_str).map(str::to_string) else {
        return;
    };

    match users.by_id(&user_id) {
        Some(user) => message["user"] = user.to_value(),
        None => tracing::debug!(user_id = %user_id, "History author not in user cache"),
    }
}
