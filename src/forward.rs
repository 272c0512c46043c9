//! Forward application log records to a Slack channel
//!
//! [`SlackHandler`] is the handler itself: a severity threshold, a formatter
//! and an `emit` that posts one message per record. [`SlackHandler::into_layer`]
//! plugs it into `tracing`: the returned [`SlackLayer`] queues events and the
//! [`Forwarder`] task posts them.

use crate::config::{ClientConfig, ForwarderConfig};
use crate::error::{Result, SlackError};
use crate::logging::log_forward_error;
use crate::slack::{HttpBackend, Params, ReqwestBackend, SlackClient};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::level_filters::LevelFilter;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// Targets whose events are never forwarded; posting them would log again
const INTERNAL_TARGETS: &[&str] = &[
    env!("CARGO_CRATE_NAME"),
    "reqwest",
    "hyper",
    "hyper_util",
    "h2",
    "rustls",
];

/// A single log record, independent of the logging framework that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: Level,
    pub target: String,
    pub message: String,
    pub fields: Map<String, Value>,
}

impl LogRecord {
    /// Create a record with no target or fields
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            target: String::new(),
            message: message.into(),
            fields: Map::new(),
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// Turns a record into message text
pub trait RecordFormatter: Send + Sync {
    fn format(&self, record: &LogRecord) -> String;
}

/// `[LEVEL] message`
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultFormatter;

impl RecordFormatter for DefaultFormatter {
    fn format(&self, record: &LogRecord) -> String {
        format!("[{}] {}", record.level, record.message)
    }
}

impl<F> RecordFormatter for F
where
    F: Fn(&LogRecord) -> String + Send + Sync,
{
    fn format(&self, record: &LogRecord) -> String {
        self(record)
    }
}

pub type ErrorHandler = Box<dyn Fn(&SlackError) + Send + Sync>;

/// Posts log records to one channel through a [`SlackClient`]
pub struct SlackHandler<B = ReqwestBackend> {
    client: SlackClient<B>,
    channel: String,
    options: Params,
    level: LevelFilter,
    formatter: Box<dyn RecordFormatter>,
    on_error: ErrorHandler,
}

impl SlackHandler<ReqwestBackend> {
    /// Handler posting to `channel` with `options` added to every message
    pub fn new(token: impl Into<String>, channel: impl Into<String>, options: Params) -> Result<Self> {
        Ok(Self::from_client(SlackClient::new(token)?, channel, options))
    }

    /// Create a handler from loaded settings
    pub fn from_config(client: ClientConfig, forwarder: &ForwarderConfig) -> Result<Self> {
        let handler = Self::from_client(
            SlackClient::from_config(client)?,
            forwarder.channel.clone(),
            forwarder.post_options(),
        );
        Ok(handler.with_level(forwarder.level))
    }
}

impl<B: HttpBackend> SlackHandler<B> {
    /// Handler posting through an existing client; errors are logged by default
    pub fn from_client(client: SlackClient<B>, channel: impl Into<String>, options: Params) -> Self {
        let channel = channel.into();
        let log_channel = channel.clone();
        Self {
            client,
            channel,
            options,
            level: LevelFilter::TRACE,
            formatter: Box::new(DefaultFormatter),
            on_error: Box::new(move |e: &SlackError| log_forward_error(&log_channel, e)),
        }
    }

    /// Set the minimum level that gets posted
    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    pub fn set_level(&mut self, level: LevelFilter) {
        self.level = level;
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }

    pub fn with_formatter(mut self, formatter: impl RecordFormatter + 'static) -> Self {
        self.formatter = Box::new(formatter);
        self
    }

    /// Replace the formatter in place
    pub fn set_formatter(&mut self, formatter: impl RecordFormatter + 'static) {
        self.formatter = Box::new(formatter);
    }

    /// What happens to errors from records forwarded through the layer
    pub fn with_error_handler(mut self, on_error: impl Fn(&SlackError) + Send + Sync + 'static) -> Self {
        self.on_error = Box::new(on_error);
        self
    }

    pub fn client(&self) -> &SlackClient<B> {
        &self.client
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Whether a record at `level` passes the threshold
    pub fn enabled(&self, level: &Level) -> bool {
        self.level >= *level
    }

    pub fn format(&self, record: &LogRecord) -> String {
        self.formatter.format(record)
    }

    /// Post `record` if it passes the threshold.
    ///
    /// Returns `Ok(None)` for filtered records. Client errors are returned as-is.
    pub async fn emit(&self, record: &LogRecord) -> Result<Option<Value>> {
        if !self.enabled(&record.level) {
            return Ok(None);
        }

        let text = self.format(record);
        let response = self
            .client
            .post_message(&self.channel, &text, self.options.clone())
            .await?;
        Ok(Some(response))
    }

    /// Pass an error to the configured error handler
    pub fn handle_error(&self, error: &SlackError) {
        (self.on_error)(error)
    }

    /// Split into a `tracing` layer and the task that posts what it captures.
    ///
    /// Spawn [`Forwarder::run`] on a runtime; it finishes once the layer (and
    /// the subscriber holding it) is dropped and the queue is drained.
    pub fn into_layer(self) -> (SlackLayer, Forwarder<B>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let layer = SlackLayer {
            tx,
            level: self.level,
        };
        (layer, Forwarder { handler: self, rx })
    }
}

/// Drains records queued by a [`SlackLayer`] into its handler
pub struct Forwarder<B = ReqwestBackend> {
    handler: SlackHandler<B>,
    rx: mpsc::UnboundedReceiver<LogRecord>,
}

impl<B: HttpBackend> Forwarder<B> {
    /// Post queued records until the layer is dropped
    pub async fn run(mut self) {
        while let Some(record) = self.rx.recv().await {
            if let Err(e) = self.handler.emit(&record).await {
                self.handler.handle_error(&e);
            }
        }
        tracing::debug!(channel = %self.handler.channel, "Log forwarder stopped");
    }
}

/// `tracing` layer capturing events for a [`Forwarder`]
pub struct SlackLayer {
    tx: mpsc::UnboundedSender<LogRecord>,
    level: LevelFilter,
}

impl SlackLayer {
    fn is_internal(target: &str) -> bool {
        INTERNAL_TARGETS.iter().any(|t| {
            target == *t
                || target
                    .strip_prefix(t)
                    .is_some_and(|rest| rest.starts_with("::"))
        })
    }
}

impl<S: Subscriber> Layer<S> for SlackLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if self.level < *meta.level() || Self::is_internal(meta.target()) {
            return;
        }

        let mut visitor = RecordVisitor::default();
        event.record(&mut visitor);

        let record = LogRecord {
            level: *meta.level(),
            target: meta.target().to_string(),
            message: visitor.message,
            fields: visitor.fields,
        };

        // Forwarder gone means nobody is posting anymore
        let _ = self.tx.send(record);
    }
}

#[derive(Default)]
struct RecordVisitor {
    message: String,
    fields: Map<String, Value>,
}

impl Visit for RecordVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields
                .insert(field.name().into(), Value::String(format!("{value:?}")));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.into();
        } else {
            self.fields
                .insert(field.name().into(), Value::String(value.into()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().into(), value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().into(), value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().into(), value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBackend;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::layer::SubscriberExt;

    fn handler(backend: &MockBackend) -> SlackHandler<MockBackend> {
        backend.respond(
            "channels.list",
            json!({"ok": true, "channels": [{"id": "C1", "name": "channel"}]}),
        );
        backend.respond("chat.postMessage", json!({"ok": true, "ts": "1.0"}));
        let client = SlackClient::with_backend(ClientConfig::new("my key"), backend.clone());
        SlackHandler::from_client(client, "#channel", Params::new().with("username", "botname"))
    }

    #[tokio::test]
    async fn test_emit_posts_formatted_record() {
        let backend = MockBackend::new();
        let handler = handler(&backend).with_level(LevelFilter::WARN);

        let response = handler
            .emit(&LogRecord::new(Level::ERROR, "Oh noh!"))
            .await
            .unwrap();
        assert_eq!(response.unwrap()["ts"], "1.0");

        assert_eq!(backend.calls_to("chat.postMessage"), 1);
        let call = backend.last_call("chat.postMessage").unwrap();
        assert_eq!(call.params.get("channel"), Some("C1"));
        assert_eq!(call.params.get("text"), Some("[ERROR] Oh noh!"));
        assert_eq!(call.params.get("username"), Some("botname"));
    }

    #[tokio::test]
    async fn test_records_below_threshold_are_dropped() {
        let backend = MockBackend::new();
        let mut handler = handler(&backend);
        handler.set_level(LevelFilter::WARN);

        let response = handler
            .emit(&LogRecord::new(Level::INFO, "fine"))
            .await
            .unwrap();
        assert!(response.is_none());
        assert_eq!(backend.call_count(), 0);

        handler.emit(&LogRecord::new(Level::WARN, "hmm")).await.unwrap();
        assert_eq!(backend.calls_to("chat.postMessage"), 1);
    }

    #[tokio::test]
    async fn test_custom_formatter() {
        let backend = MockBackend::new();
        let handler = handler(&backend)
            .with_formatter(|r: &LogRecord| format!("{}: {} ({})", r.target, r.message, r.level));

        let record = LogRecord::new(Level::WARN, "disk almost full").with_target("app::disk");
        handler.emit(&record).await.unwrap();

        let call = backend.last_call("chat.postMessage").unwrap();
        assert_eq!(call.params.get("text"), Some("app::disk: disk almost full (WARN)"));
    }

    #[tokio::test]
    async fn test_emit_propagates_client_errors() {
        let backend = MockBackend::new();
        let handler = handler(&backend);
        backend.respond("chat.postMessage", json!({"ok": false, "error": "not_in_channel"}));

        let err = handler
            .emit(&LogRecord::new(Level::ERROR, "boom"))
            .await
            .unwrap_err();
        assert_eq!(err.api_code(), Some("not_in_channel"));
        assert_eq!(backend.calls_to("chat.postMessage"), 1);
    }

    #[test]
    fn test_internal_targets() {
        assert!(SlackLayer::is_internal("slack_lite"));
        assert!(SlackLayer::is_internal("slack_lite::slack::transport"));
        assert!(SlackLayer::is_internal("hyper_util::client"));
        assert!(!SlackLayer::is_internal("slack_lite_app"));
        assert!(!SlackLayer::is_internal("myapp"));
    }

    #[tokio::test]
    async fn test_layer_forwards_tracing_events() {
        let backend = MockBackend::new();
        let (layer, forwarder) = handler(&backend).with_level(LevelFilter::WARN).into_layer();

        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(target: "myapp", disk = "sda1", "Oh noh!");
            tracing::info!(target: "myapp", "all good");
            tracing::error!(target: "slack_lite::slack::transport", "internal failure");
        });

        forwarder.run().await;

        assert_eq!(backend.calls_to("chat.postMessage"), 1);
        let call = backend.last_call("chat.postMessage").unwrap();
        assert_eq!(call.params.get("text"), Some("[ERROR] Oh noh!"));
    }

    #[tokio::test]
    async fn test_forwarder_reports_errors_to_handler() {
        let backend = MockBackend::new();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = errors.clone();
        let handler = handler(&backend)
            .with_error_handler(move |e| sink.lock().unwrap().push(e.to_string()));
        backend.respond("chat.postMessage", json!({"ok": false, "error": "invalid_auth"}));

        let (layer, forwarder) = handler.into_layer();
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "myapp", "first");
            tracing::warn!(target: "myapp", "second");
        });
        forwarder.run().await;

        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("invalid_auth"));
    }

    #[test]
    fn test_visitor_collects_fields() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let layer = SlackLayer {
            tx,
            level: LevelFilter::TRACE,
        };
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!(target: "myapp", attempts = 3u64, ok = false, host = "db1", "retrying");
        });

        let record = rx.try_recv().unwrap();
        assert_eq!(record.level, Level::DEBUG);
        assert_eq!(record.target, "myapp");
        assert_eq!(record.message, "retrying");
        assert_eq!(record.fields["attempts"], json!(3));
        assert_eq!(record.fields["ok"], json!(false));
        assert_eq!(record.fields["host"], json!("db1"));
    }
}
