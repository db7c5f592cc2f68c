// Hourly and daily sliding windows over past publishes

use chrono::{DateTime, Duration, Utc};
use clap::ValueEnum;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::metrics::RATE_WINDOW_USAGE;

// Slack added after the binding entry expires
const SAFETY_BUFFER_SECS: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Horizon {
    Hourly,
    Daily,
}

impl Horizon {
    pub fn duration(self) -> Duration {
        match self {
            Horizon::Hourly => Duration::hours(1),
            Horizon::Daily => Duration::days(1),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Horizon::Hourly => "hourly",
            Horizon::Daily => "daily",
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum RateLimitPolicy {
    /// Abandon the cycle; the next scheduled cycle retries.
    #[default]
    Skip,
    /// Block until the binding horizon frees a slot, then re-check once.
    Wait,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{horizon} rate limit reached ({count}/{limit}), next slot at {available_at}")]
pub struct RateLimitExceeded {
    pub horizon: Horizon,
    pub count: usize,
    pub limit: usize,
    pub available_at: DateTime<Utc>,
}

// oldest first
#[derive(Debug)]
pub struct RateWindow {
    horizon: Horizon,
    limit: usize,
    entries: VecDeque<DateTime<Utc>>,
}

impl RateWindow {
    pub fn new(horizon: Horizon, limit: usize) -> Self {
        Self {
            horizon,
            limit,
            entries: VecDeque::new(),
        }
    }

    fn purge(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.horizon.duration();
        while self.entries.front().is_some_and(|oldest| *oldest < cutoff) {
            self.entries.pop_front();
        }
    }

    fn push(&mut self, at: DateTime<Utc>) {
        self.entries.push_back(at);
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    fn is_saturated(&self) -> bool {
        self.entries.len() >= self.limit
    }

    // When the oldest entry leaves the window
    fn frees_at(&self) -> Option<DateTime<Utc>> {
        self.entries
            .front()
            .map(|oldest| *oldest + self.horizon.duration())
    }

    fn exceeded(&self, now: DateTime<Utc>) -> RateLimitExceeded {
        RateLimitExceeded {
            horizon: self.horizon,
            count: self.count(),
            limit: self.limit,
            available_at: self.frees_at().unwrap_or(now),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStats {
    pub hourly_count: usize,
    pub hourly_limit: usize,
    pub hourly_remaining: usize,
    pub daily_count: usize,
    pub daily_limit: usize,
    pub daily_remaining: usize,
}

pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    hourly: RateWindow,
    daily: RateWindow,
}

impl RateLimiter {
    pub fn new(clock: Arc<dyn Clock>, hourly_limit: usize, daily_limit: usize) -> Self {
        info!(hourly_limit, daily_limit, "Rate limiter initialized");
        Self {
            clock,
            hourly: RateWindow::new(Horizon::Hourly, hourly_limit),
            daily: RateWindow::new(Horizon::Daily, daily_limit),
        }
    }

    fn purge(&mut self) {
        let now = self.clock.now();
        self.hourly.purge(now);
        self.daily.purge(now);
    }

    // hourly is reported first when both are full
    pub fn can_proceed(&mut self) -> Result<(), RateLimitExceeded> {
        self.purge();
        let now = self.clock.now();
        for window in [&self.hourly, &self.daily] {
            if window.is_saturated() {
                let exceeded = window.exceeded(now);
                warn!(
                    horizon = %exceeded.horizon,
                    count = exceeded.count,
                    limit = exceeded.limit,
                    "Rate limit reached"
                );
                return Err(exceeded);
            }
        }
        Ok(())
    }

    // only after a successful publish
    pub fn record_operation(&mut self) {
        let now = self.clock.now();
        self.hourly.push(now);
        self.daily.push(now);
        self.purge();

        let stats = self.stats();
        RATE_WINDOW_USAGE
            .with_label_values(&["hourly"])
            .set(stats.hourly_count as f64);
        RATE_WINDOW_USAGE
            .with_label_values(&["daily"])
            .set(stats.daily_count as f64);
        debug!(
            hourly = stats.hourly_count,
            hourly_limit = stats.hourly_limit,
            daily = stats.daily_count,
            daily_limit = stats.daily_limit,
            "Operation recorded"
        );
    }

    /// Sleep until the saturated horizons free a slot, plus a safety buffer.
    /// Returns whether it slept; callers re-check with `can_proceed`.
    pub async fn wait_until_available(&mut self) -> bool {
        if self.can_proceed().is_ok() {
            return false;
        }

        // both windows may be full; the later one binds
        let wake_at = [&self.hourly, &self.daily]
            .into_iter()
            .filter(|w| w.is_saturated())
            .filter_map(|w| w.frees_at())
            .max();

        let Some(wake_at) = wake_at else {
            // a zero limit never frees up
            return false;
        };
        let wake_at = wake_at + Duration::seconds(SAFETY_BUFFER_SECS);

        info!(until = %wake_at, "Waiting for rate limit window to reopen");
        self.clock.sleep_until(wake_at).await;
        true
    }

    pub fn stats(&mut self) -> RateLimitStats {
        self.purge();
        RateLimitStats {
            hourly_count: self.hourly.count(),
            hourly_limit: self.hourly.limit(),
            hourly_remaining: self.hourly.limit().saturating_sub(self.hourly.count()),
            daily_count: self.daily.count(),
            daily_limit: self.daily.limit(),
            daily_remaining: self.daily.limit().saturating_sub(self.daily.count()),
        }
    }
}
