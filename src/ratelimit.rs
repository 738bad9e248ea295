//! Process-wide request pacing and rate-limit cooldown tracking
//!
//! The remote queue rate-limits per API key, not per caller, so one
//! [`RateLimiter`] instance is constructed per process (or per key) and
//! shared by every poller talking to that key. It enforces two policies:
//!
//! * a minimum gap between consecutive outbound requests across all
//!   concurrent callers, and
//! * a cooldown window after the remote API signals a rate limit, during
//!   which new requests fail fast instead of queueing.
//!
//! The limiter is an explicit injected value rather than module-global state
//! so tests can construct a fresh one per test.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct LimiterState {
    /// When the most recent outbound request was issued, across all callers
    last_request_at: Option<Instant>,
    /// No requests may be issued before this point
    limited_until: Option<Instant>,
}

/// Shared pacing state for all requests against one remote API key
#[derive(Debug)]
pub struct RateLimiter {
    min_gap: Duration,
    state: tokio::sync::Mutex<LimiterState>,
}

impl RateLimiter {
    /// Create a limiter enforcing the given minimum inter-request gap
    #[must_use]
    pub fn new(min_gap: Duration) -> Self {
        Self {
            min_gap,
            state: tokio::sync::Mutex::new(LimiterState::default()),
        }
    }

    /// Acquire permission to issue one outbound request
    ///
    /// Fails fast with the remaining wait when a cooldown window is active.
    /// Otherwise sleeps out whatever remains of the minimum gap since the
    /// previous request, then stamps this request as the most recent one.
    /// The async mutex is held across the sleep on purpose: two callers must
    /// not read the same `last_request_at` and both decide the gap is clear.
    ///
    /// # Errors
    /// Returns the remaining cooldown duration when rate-limited.
    pub async fn acquire(&self) -> Result<(), Duration> {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        if let Some(until) = state.limited_until {
            if until > now {
                return Err(until - now);
            }
            state.limited_until = None;
        }

        if let Some(last) = state.last_request_at {
            let next_allowed = last + self.min_gap;
            if next_allowed > now {
                let wait = next_allowed - now;
                debug!("Pacing outbound request: waiting {:?}", wait);
                tokio::time::sleep(wait).await;
            }
        }

        state.last_request_at = Some(Instant::now());
        Ok(())
    }

    /// Record a rate-limit signal from the remote API
    ///
    /// Subsequent [`RateLimiter::acquire`] calls fail fast until the window
    /// elapses. An existing later window is never shortened.
    pub async fn note_rate_limited(&self, cooldown: Duration) {
        let mut state = self.state.lock().await;
        let until = Instant::now() + cooldown;
        if state.limited_until.map_or(true, |current| until > current) {
            warn!("Remote API rate limited; cooling down for {:?}", cooldown);
            state.limited_until = Some(until);
        }
    }

    /// Remaining cooldown, if a window is currently active
    pub async fn cooldown_remaining(&self) -> Option<Duration> {
        let state = self.state.lock().await;
        let until = state.limited_until?;
        let now = Instant::now();
        (until > now).then(|| until - now)
    }
}

/// Extract a cooldown duration from a human-readable rate-limit message
///
/// The remote API embeds hints like "retry after 5 seconds" in its error
/// body. The exact phrasing is not a contract, so parsing is tolerant: the
/// first number following the word "after", or failing that the first number
/// directly preceding a "second(s)" token, is taken as the hint. Returns
/// `None` when no hint can be found; callers fall back to a configured
/// default cooldown.
#[must_use]
pub fn parse_retry_after(message: &str) -> Option<Duration> {
    let tokens: Vec<&str> = message.split_whitespace().collect();

    let numeric = |token: &str| -> Option<f64> {
        let trimmed = token.trim_matches(|c: char| !c.is_ascii_digit() && c != '.');
        let value: f64 = trimmed.parse().ok()?;
        (value.is_finite() && value >= 0.0).then_some(value)
    };

    for window in tokens.windows(2) {
        let [first, second] = window else { continue };
        if first.eq_ignore_ascii_case("after") {
            if let Some(value) = numeric(second) {
                return Some(Duration::from_secs_f64(value));
            }
        }
        if second.to_ascii_lowercase().starts_with("second") {
            if let Some(value) = numeric(first) {
                return Some(Duration::from_secs_f64(value));
            }
        }
    }
    None
}
