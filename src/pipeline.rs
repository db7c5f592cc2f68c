// Fetch → clean → generate → validate → rate check → publish → record, then sleep

use futures::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bluesky::{DestinationConnector, SourceConnector, retrieve_posts};
use crate::clean::extract_texts;
use crate::clock::Clock;
use crate::error::CycleError;
use crate::metrics::{CYCLE_DURATION, CYCLES_TOTAL, POSTS_PUBLISHED, VALIDATION_REJECTIONS};
use crate::models::PostReference;
use crate::ollama::{Generator, build_prompt, failure_content, fit_to_limit};
use crate::rate_limit::{RateLimitExceeded, RateLimitPolicy, RateLimiter};
use crate::scheduler::CycleScheduler;
use crate::validator::{
    ContentValidator, Rejection, ValidationOutcome, ValidationProfile, content_stats, sanitize,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Fetching,
    Cleaning,
    Generating,
    ValidatingGeneration,
    RateChecking,
    Dispatching,
    Recording,
    Sleeping,
}

#[derive(Debug)]
pub enum SkipReason {
    NoSourceContent,
    Rejected(Rejection),
    DryRun,
    RateLimited(RateLimitExceeded),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoSourceContent => f.write_str("no source content"),
            SkipReason::Rejected(r) => write!(f, "validation rejected: {r}"),
            SkipReason::DryRun => f.write_str("dry-run"),
            SkipReason::RateLimited(e) => write!(f, "{e}"),
        }
    }
}

#[derive(Debug)]
pub enum CycleResult {
    Published(PostReference),
    Skipped(SkipReason),
    Failed(CycleError),
}

impl CycleResult {
    pub fn label(&self) -> &'static str {
        match self {
            CycleResult::Published(_) => "published",
            CycleResult::Skipped(_) => "skipped",
            CycleResult::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for CycleResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleResult::Published(r) => write!(f, "published {}", r.uri),
            CycleResult::Skipped(reason) => write!(f, "skipped: {reason}"),
            CycleResult::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

pub trait CycleObserver: Send {
    fn on_transition(&mut self, _cycle: u64, _state: CycleState) {}

    fn on_generated(&mut self, _cycle: u64, _text: &str) {}

    fn on_result(&mut self, _cycle: u64, _result: &CycleResult) {}
}

#[derive(Debug, Default)]
pub struct TracingObserver;

impl CycleObserver for TracingObserver {
    fn on_transition(&mut self, cycle: u64, state: CycleState) {
        debug!(cycle, ?state, "Cycle state");
    }

    fn on_generated(&mut self, cycle: u64, text: &str) {
        let stats = content_stats(text);
        info!(cycle, chars = stats.length, text, "Generated post");
        debug!(cycle, ?stats, "Generated post stats");
    }

    fn on_result(&mut self, cycle: u64, result: &CycleResult) {
        CYCLES_TOTAL.with_label_values(&[result.label()]).inc();
        match result {
            CycleResult::Published(reference) => {
                POSTS_PUBLISHED.inc();
                info!(cycle, uri = %reference.uri, "Posted to destination account");
            }
            CycleResult::Skipped(SkipReason::Rejected(rejection)) => {
                VALIDATION_REJECTIONS
                    .with_label_values(&[rejection.check.label()])
                    .inc();
                warn!(cycle, check = rejection.check.label(), reason = %rejection, "Content validation failed, skipping");
            }
            CycleResult::Skipped(SkipReason::RateLimited(exceeded)) => {
                warn!(cycle, horizon = %exceeded.horizon, available_at = %exceeded.available_at, "Rate limit reached, skipping");
            }
            CycleResult::Skipped(reason) => {
                info!(cycle, %reason, "Cycle skipped");
            }
            CycleResult::Failed(e) => {
                error!(cycle, error = %e, "Cycle failed");
            }
        }
    }
}

pub enum DispatchMode {
    DryRun,
    Live(Arc<dyn DestinationConnector>),
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    // DID of the account to imitate
    pub source_account: String,
    pub page_limit: usize,
    pub max_pages: usize,
    pub sample_size: usize,
    pub char_limit: usize,
    pub model: String,
    pub languages: Vec<String>,
    pub rate_policy: RateLimitPolicy,
}

pub struct Pipeline {
    config: PipelineConfig,
    source: Arc<dyn SourceConnector>,
    generator: Arc<dyn Generator>,
    dispatch: DispatchMode,
    validator: ContentValidator,
    limiter: RateLimiter,
    scheduler: CycleScheduler,
    clock: Arc<dyn Clock>,
    observer: Box<dyn CycleObserver>,
    cycle: u64,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: PipelineConfig,
        source: Arc<dyn SourceConnector>,
        generator: Arc<dyn Generator>,
        dispatch: DispatchMode,
        validator: ContentValidator,
        limiter: RateLimiter,
        scheduler: CycleScheduler,
        clock: Arc<dyn Clock>,
        observer: Box<dyn CycleObserver>,
    ) -> Self {
        Self {
            config,
            source,
            generator,
            dispatch,
            validator,
            limiter,
            scheduler,
            clock,
            observer,
            cycle: 0,
        }
    }

    fn enter(&mut self, state: CycleState) {
        self.observer.on_transition(self.cycle, state);
    }

    /// Run cycles until `cancel` fires. An in-flight cycle is dropped at its next await.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            source = %self.config.source_account,
            model = %self.config.model,
            dry_run = matches!(self.dispatch, DispatchMode::DryRun),
            "Pipeline started"
        );

        loop {
            let started_at = self.clock.now();
            let timer = Instant::now();

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                outcome = AssertUnwindSafe(self.run_cycle()).catch_unwind() => outcome,
            };
            let result = outcome.unwrap_or_else(|panic| {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                CycleResult::Failed(CycleError::Unexpected(message))
            });

            CYCLE_DURATION.observe(timer.elapsed().as_secs_f64());
            self.observer.on_result(self.cycle, &result);

            self.enter(CycleState::Sleeping);
            let next_run = self.scheduler.plan_next(started_at);
            let schedule = self.scheduler.state();
            info!(
                last_run = ?schedule.last_run_at,
                next_run = %schedule.next_run_at,
                "Next post scheduled"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.scheduler.sleep_until(next_run) => {}
            }
            self.enter(CycleState::Idle);
        }

        info!(cycles = self.cycle, "Pipeline stopped");
    }

    pub async fn run_cycle(&mut self) -> CycleResult {
        self.cycle += 1;

        self.enter(CycleState::Fetching);
        let records = match retrieve_posts(
            self.source.as_ref(),
            &self.config.source_account,
            self.config.page_limit,
            self.config.max_pages,
        )
        .await
        {
            Ok(records) => records,
            Err(e) => return CycleResult::Failed(CycleError::Fetch(e)),
        };

        self.enter(CycleState::Cleaning);
        let posts = extract_texts(&records);
        if posts.is_empty() {
            return CycleResult::Skipped(SkipReason::NoSourceContent);
        }

        self.enter(CycleState::Generating);
        let prompt = build_prompt(&posts, self.config.char_limit, self.config.sample_size);
        let generated = match self.generator.generate(&prompt, &self.config.model).await {
            Ok(text) => fit_to_limit(&text, self.config.char_limit),
            Err(e) => {
                error!(model = %self.config.model, error = %e, "Generation failed");
                failure_content(&e)
            }
        };

        self.enter(CycleState::ValidatingGeneration);
        let text = sanitize(&generated);
        self.observer.on_generated(self.cycle, &text);
        for profile in [ValidationProfile::General, ValidationProfile::Dispatch] {
            let outcome = self.validator.check(profile, &text);
            debug!(
                cycle = self.cycle,
                ?profile,
                accepted = outcome.is_accepted(),
                reason = outcome.reason(),
                "Validation result"
            );
            if let ValidationOutcome::Rejected(rejection) = outcome {
                return CycleResult::Skipped(SkipReason::Rejected(rejection));
            }
        }

        let destination = match &self.dispatch {
            DispatchMode::DryRun => return CycleResult::Skipped(SkipReason::DryRun),
            DispatchMode::Live(destination) => Arc::clone(destination),
        };

        self.enter(CycleState::RateChecking);
        if let Err(exceeded) = self.limiter.can_proceed() {
            match self.config.rate_policy {
                RateLimitPolicy::Skip => {
                    return CycleResult::Skipped(SkipReason::RateLimited(exceeded));
                }
                RateLimitPolicy::Wait => {
                    self.limiter.wait_until_available().await;
                    if let Err(exceeded) = self.limiter.can_proceed() {
                        return CycleResult::Skipped(SkipReason::RateLimited(exceeded));
                    }
                }
            }
        }

        self.enter(CycleState::Dispatching);
        let reference = match destination.publish(&text, &self.config.languages).await {
            Ok(reference) => reference,
            Err(e) => return CycleResult::Failed(CycleError::Dispatch(e)),
        };

        self.enter(CycleState::Recording);
        self.limiter.record_operation();
        CycleResult::Published(reference)
    }
}
