//! Logging utilities for structured tracing

use crate::error::SlackError;
use std::time::{Duration, Instant};

/// Times a single Slack API call and logs the duration on drop
pub struct Timer {
    start: Instant,
    method: String,
}

impl Timer {
    /// Start timing a call to `method`
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            method: method.into(),
        }
    }

    /// Time since the timer was started
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration_ms = self.elapsed().as_millis() as u64;
        tracing::debug!(
            method = %self.method,
            duration_ms = duration_ms,
            "Slack API call finished"
        );
    }
}

/// Log a failure to post a forwarded record to `channel`
pub fn log_forward_error(channel: &str, error: &SlackError) {
    tracing::error!(
        channel = %channel,
        error = %error,
        api_code = error.api_code().unwrap_or("-"),
        rate_limited = error.is_rate_limited(),
        "Could not forward log record to Slack"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use std::thread;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn capture(f: impl FnOnce()) -> String {
        let out = Captured::default();
        let writer = out.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        out.text()
    }

    #[test]
    fn test_timer_tracks_duration() {
        let timer = Timer::new("auth.test");
        thread::sleep(Duration::from_millis(10));
        assert!(timer.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn test_timer_logs_method_on_drop() {
        let logs = capture(|| drop(Timer::new("chat.postMessage")));
        assert!(logs.contains("method=chat.postMessage"));
        assert!(logs.contains("duration_ms="));
    }

    #[test]
    fn test_forward_error_names_channel_and_code() {
        let logs = capture(|| {
            log_forward_error("#alerts", &SlackError::Api("channel_not_found".into()))
        });
        assert!(logs.contains("channel=#alerts"));
        assert!(logs.contains("api_code=\"channel_not_found\""));
        assert!(logs.contains("rate_limited=false"));
    }
}
