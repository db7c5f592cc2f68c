use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tracing::debug;

use crate::clock::Clock;

// Keeps next_run strictly after the anchor even for a zero interval
const MIN_INTERVAL_SECS: u64 = 1;

// Upper bound for base interval plus jitter (30 days)
pub const MAX_INTERVAL_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleState {
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: DateTime<Utc>,
}

pub struct CycleScheduler {
    clock: Arc<dyn Clock>,
    base_interval: std::time::Duration,
    jitter: std::time::Duration,
    rng: StdRng,
    state: ScheduleState,
}

impl CycleScheduler {
    pub fn new(
        clock: Arc<dyn Clock>,
        base_interval: std::time::Duration,
        jitter: std::time::Duration,
    ) -> Self {
        Self::with_rng(clock, base_interval, jitter, StdRng::from_entropy())
    }

    pub fn with_rng(
        clock: Arc<dyn Clock>,
        base_interval: std::time::Duration,
        jitter: std::time::Duration,
        rng: StdRng,
    ) -> Self {
        let now = clock.now();
        Self {
            clock,
            base_interval,
            jitter,
            rng,
            // first cycle is due immediately
            state: ScheduleState {
                last_run_at: None,
                next_run_at: now,
            },
        }
    }

    // base + uniform [0, jitter]
    pub fn compute_interval(&mut self) -> std::time::Duration {
        let jitter_secs = self.jitter.as_secs();
        let extra = if jitter_secs == 0 {
            0
        } else {
            self.rng.gen_range(0..=jitter_secs)
        };
        self.base_interval
            .saturating_add(std::time::Duration::from_secs(extra))
            .max(std::time::Duration::from_secs(MIN_INTERVAL_SECS))
    }

    /// Always strictly after `now`. Intervals are clamped to
    /// `[MIN_INTERVAL_SECS, MAX_INTERVAL_SECS]`.
    pub fn compute_next_run(
        &self,
        now: DateTime<Utc>,
        interval: std::time::Duration,
    ) -> DateTime<Utc> {
        let interval = interval.clamp(
            std::time::Duration::from_secs(MIN_INTERVAL_SECS),
            std::time::Duration::from_secs(MAX_INTERVAL_SECS),
        );
        let interval = Duration::from_std(interval)
            .unwrap_or(Duration::seconds(MAX_INTERVAL_SECS as i64));
        now.checked_add_signed(interval)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn plan_next(&mut self, started_at: DateTime<Utc>) -> DateTime<Utc> {
        let interval = self.compute_interval();
        let next_run_at = self.compute_next_run(started_at, interval);
        self.state = ScheduleState {
            last_run_at: Some(started_at),
            next_run_at,
        };
        debug!(
            interval_secs = interval.as_secs(),
            next_run = %next_run_at,
            "Next cycle planned"
        );
        next_run_at
    }

    pub async fn sleep_until(&self, at: DateTime<Utc>) {
        self.clock.sleep_until(at).await;
    }

    pub fn state(&self) -> ScheduleState {
        self.state
    }
}
