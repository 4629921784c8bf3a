//! Fixed-window gate on outbound provider calls.
//!
//! The window lives in storage as `{count, resetTime}` (epoch millis). An
//! expired window is replaced with a fresh zero-count one before anything
//! trusts it, so a burst at the boundary between two windows is possible.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, sync::Arc};
use tracing::{debug, info};

use crate::{
    clock::Clock,
    error::WeatherError,
    storage::{KeyValueStore, RATE_LIMIT_KEY, load_json, save_json},
};

pub const DEFAULT_MAX_CALLS: u32 = 10;
pub const DEFAULT_WINDOW_SECS: i64 = 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitWindow {
    pub count: u32,
    #[serde(rename = "resetTime", with = "chrono::serde::ts_milliseconds")]
    pub reset_time: DateTime<Utc>,
}

impl RateLimitWindow {
    fn fresh(now: DateTime<Utc>, window: Duration) -> Self {
        Self { count: 0, reset_time: now + window }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_calls: u32,
    pub window: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self { max_calls: DEFAULT_MAX_CALLS, window: Duration::seconds(DEFAULT_WINDOW_SECS) }
    }
}

/// Derived view for a "N calls remaining" indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub remaining: u32,
    pub max_calls: u32,
    pub is_limited: bool,
    pub reset_at: DateTime<Utc>,
}

/// Decides whether an outbound call may go ahead.
pub trait CallPolicy: Send + Sync + Debug {
    /// Consumes one unit of allowance or explains why none is left.
    fn acquire(&self) -> Result<(), WeatherError>;
}

#[derive(Debug)]
pub struct RateLimiter {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    policy: RateLimitPolicy,
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        policy: RateLimitPolicy,
    ) -> Self {
        Self { store, clock, policy }
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    /// Stored window, replaced by a fresh one when absent, unreadable or expired.
    fn current_window(&self) -> RateLimitWindow {
        let now = self.clock.now();

        let Some(stored) = load_json::<RateLimitWindow>(self.store.as_ref(), RATE_LIMIT_KEY)
        else {
            return RateLimitWindow::fresh(now, self.policy.window);
        };

        if now > stored.reset_time {
            let fresh = RateLimitWindow::fresh(now, self.policy.window);
            save_json(self.store.as_ref(), RATE_LIMIT_KEY, &fresh);
            info!(reset_at = %fresh.reset_time, "Rate-limit window expired, starting a new one");
            return fresh;
        }

        stored
    }

    fn status_of(&self, window: &RateLimitWindow) -> RateLimitStatus {
        let remaining = self.policy.max_calls.saturating_sub(window.count);
        RateLimitStatus {
            remaining,
            max_calls: self.policy.max_calls,
            is_limited: remaining == 0,
            reset_at: window.reset_time,
        }
    }

    /// Whether at least one call may still be made in the current window.
    pub fn check_rate_limit(&self) -> bool {
        !self.status().is_limited
    }

    pub fn status(&self) -> RateLimitStatus {
        let window = self.current_window();
        self.status_of(&window)
    }

    /// Uses one unit of quota. Returns `false` without touching storage when
    /// the window is exhausted.
    pub fn consume_call(&self) -> bool {
        let window = self.current_window();

        if window.count >= self.policy.max_calls {
            debug!(count = window.count, "Rate limit reached");
            return false;
        }

        let next = RateLimitWindow { count: window.count + 1, ..window };
        save_json(self.store.as_ref(), RATE_LIMIT_KEY, &next);
        debug!(count = next.count, max = self.policy.max_calls, "Consumed provider call");
        true
    }

    /// Human-readable time until the window resets: "now", "N min" or "Hh Mm".
    pub fn reset_time_remaining(&self) -> String {
        let window = self.current_window();
        format_reset_in(window.reset_time - self.clock.now())
    }
}

impl CallPolicy for RateLimiter {
    fn acquire(&self) -> Result<(), WeatherError> {
        if self.consume_call() {
            Ok(())
        } else {
            Err(WeatherError::RateLimited { reset_in: self.reset_time_remaining() })
        }
    }
}

fn format_reset_in(remaining: Duration) -> String {
    let millis = remaining.num_milliseconds();
    if millis <= 0 {
        return "now".to_string();
    }

    let minutes = (millis + 59_999) / 60_000;
    if minutes < 60 {
        return format!("{minutes} min");
    }

    format!("{}h {}m", minutes / 60, minutes % 60)
}
