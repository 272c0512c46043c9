//! Fail-fast cooldown after Slack answers HTTP 429

use crate::error::{Result, SlackError};
use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};

/// Seconds to wait when Slack sends no usable `retry-after` header
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 1;

/// Source of "now" for the rate-limit gate
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for simulating the passage of time
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward, saturating at the latest representable time
    pub fn advance(&self, by: std::time::Duration) {
        let by = Duration::from_std(by).unwrap_or(Duration::MAX);
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = now.checked_add_signed(by).unwrap_or(DateTime::<Utc>::MAX_UTC);
    }

    /// Jump to an arbitrary time
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Per-client cooldown state.
///
/// Once a deadline is recorded every `check` fails until the clock passes it.
/// A passed deadline is simply ignored; nothing clears it.
pub struct RateLimitGate {
    blocked_until: Mutex<Option<DateTime<Utc>>>,
    clock: Arc<dyn Clock>,
}

impl RateLimitGate {
    /// Create an open gate driven by the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an open gate driven by `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            blocked_until: Mutex::new(None),
            clock,
        }
    }

    /// Fail with [`SlackError::RateLimited`] while a cooldown is running
    pub fn check(&self) -> Result<()> {
        match self.blocked_until() {
            Some(until) if self.clock.now() < until => {
                tracing::debug!(until = %until, "Request refused, rate limit cooldown active");
                Err(SlackError::RateLimited { until })
            }
            _ => Ok(()),
        }
    }

    /// Start a cooldown of `retry_after_secs` (or the default) from now,
    /// replacing any earlier deadline. Returns the new deadline.
    pub fn record_limit(&self, retry_after_secs: Option<u64>) -> DateTime<Utc> {
        let secs = retry_after_secs.unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        let wait = i64::try_from(secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        let until = self
            .clock
            .now()
            .checked_add_signed(wait)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        *self.blocked_until.lock().unwrap_or_else(|e| e.into_inner()) = Some(until);
        tracing::warn!(retry_after_secs = secs, until = %until, "Rate limited by Slack");
        until
    }

    /// Last recorded deadline, whether or not it has passed
    pub fn blocked_until(&self) -> Option<DateTime<Utc>> {
        *self.blocked_until.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether a request made now would be refused
    pub fn is_blocked(&self) -> bool {
        self.check().is_err()
    }
}

impl Default for RateLimitGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;
    use tokio_test::{assert_err, assert_ok};

    fn gate() -> (RateLimitGate, ManualClock) {
        let clock = ManualClock::default();
        (RateLimitGate::with_clock(Arc::new(clock.clone())), clock)
    }

    #[test]
    fn test_fresh_gate_is_open() {
        let (gate, _) = gate();
        assert_ok!(gate.check());
        assert!(gate.blocked_until().is_none());
    }

    #[test]
    fn test_blocks_until_deadline_passes() {
        let (gate, clock) = gate();
        let until = gate.record_limit(Some(5));
        assert_eq!(until, clock.now() + Duration::seconds(5));

        match gate.check() {
            Err(SlackError::RateLimited { until: u }) => assert_eq!(u, until),
            other => panic!("expected rate limit, got {other:?}"),
        }

        clock.advance(StdDuration::from_secs(4));
        assert_err!(gate.check());

        clock.advance(StdDuration::from_secs(2));
        assert_ok!(gate.check());
        // stale deadline is kept but no longer consulted
        assert_eq!(gate.blocked_until(), Some(until));
    }

    #[test]
    fn test_default_retry_after() {
        let (gate, clock) = gate();
        let start = clock.now();
        let until = gate.record_limit(None);
        assert_eq!(until - start, Duration::seconds(1));
    }

    #[test]
    fn test_new_limit_overwrites_previous_deadline() {
        let (gate, clock) = gate();
        gate.record_limit(Some(60));
        let until = gate.record_limit(Some(2));
        assert_eq!(gate.blocked_until(), Some(until));

        clock.advance(StdDuration::from_secs(3));
        assert!(!gate.is_blocked());
    }

    #[test]
    fn test_huge_retry_after_saturates_instead_of_wrapping() {
        let (gate, clock) = gate();
        let until = gate.record_limit(Some(u64::MAX));
        assert!(until > clock.now());
        assert_err!(gate.check());

        let until = gate.record_limit(Some(i64::MAX as u64 + 1));
        assert_eq!(until, DateTime::<Utc>::MAX_UTC);

        clock.advance(StdDuration::from_secs(86_400 * 365));
        assert!(gate.is_blocked());
    }
}
