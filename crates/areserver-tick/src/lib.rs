//! Fixed-rate tick scheduler for the Areserver drain loop.
//!
//! The server has one logical thread of control. Every tick it drains all
//! pending transport events and admin commands, then sleeps until the next
//! tick is due. This crate owns the "sleep until due" half and keeps an eye
//! on how long each drain takes.
//!
//! # Usage
//!
//! ```ignore
//! let mut scheduler = TickScheduler::new(TickConfig::default());
//! loop {
//!     scheduler.wait_for_tick().await;
//!     let handled = drain(&mut hub, &mut dispatcher);
//!     scheduler.record_tick_end(handled);
//! }
//! ```

use std::time::{Duration, Instant};

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when the loop wakes up later than scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickPolicy {
    /// Forget the missed ticks and schedule the next one a full interval
    /// from now. One drain empties the queue anyway, so there is nothing
    /// to catch up on.
    #[default]
    Skip,
    /// Keep the original cadence: the next tick fires at its originally
    /// scheduled time, even if that is immediately.
    Drop,
}

/// Configuration for the tick scheduler.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Ticks per second, `1..=MAX_TICK_RATE_HZ`.
    pub tick_rate_hz: u32,
    /// Late-wakeup handling.
    pub policy: TickPolicy,
    /// Fraction of the tick interval (0.0–1.0) a drain may use before a
    /// warning is logged. Default: 0.80.
    pub budget_warn_threshold: f64,
    /// Random delay (0–max µs) added to the first tick only. Staggers
    /// several servers started together on one host. Default: 0.
    pub initial_jitter_us: u64,
}

impl Default for TickConfig {
    /// 125 Hz: one drain every 8 ms.
    fn default() -> Self {
        Self {
            tick_rate_hz: 125,
            policy: TickPolicy::default(),
            budget_warn_threshold: 0.80,
            initial_jitter_us: 0,
        }
    }
}

impl TickConfig {
    /// Maximum supported tick rate.
    pub const MAX_TICK_RATE_HZ: u32 = 128;

    /// Default config at `tick_rate_hz`. Out-of-range rates are clamped
    /// when a scheduler is built from it.
    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            ..Default::default()
        }
    }

    /// Clamps out-of-range values.
    ///
    /// Called by [`TickScheduler::new`]. The rate is forced into
    /// `1..=MAX_TICK_RATE_HZ`; the threshold into `0.0..=1.0`.
    pub fn validated(mut self) -> Self {
        let clamped = self.tick_rate_hz.clamp(1, Self::MAX_TICK_RATE_HZ);
        if clamped != self.tick_rate_hz {
            warn!(
                rate = self.tick_rate_hz,
                clamped,
                "tick_rate_hz out of range, clamping"
            );
            self.tick_rate_hz = clamped;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }

    /// Length of one tick.
    ///
    /// A zero rate is treated as 1 Hz so this never divides by zero.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.tick_rate_hz.max(1)))
    }
}

// ---------------------------------------------------------------------------
// TickInfo
// ---------------------------------------------------------------------------

/// Returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Tick number, starting at 1.
    pub tick: u64,
    /// `true` if the loop woke up more than 10% of an interval late.
    pub overrun: bool,
    /// Whole intervals lost to the late wakeup.
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Running totals kept by the scheduler.
#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    pub total_ticks: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    /// Events handled across every drain.
    pub total_events: u64,
    /// Events handled by the most recent drain.
    pub last_events: usize,
    /// Exponential moving average of drain time (α = 0.1).
    pub avg_drain_time: Duration,
    pub max_drain_time: Duration,
    /// Last drain time divided by the tick interval. Above 1.0 means the
    /// drain alone used more than a whole tick.
    pub budget_utilization: f64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-rate scheduler for the drain loop.
pub struct TickScheduler {
    config: TickConfig,
    interval: Duration,
    tick_count: u64,
    next_tick: TokioInstant,
    /// Set by `wait_for_tick`, consumed by `record_tick_end`.
    drain_start: Option<Instant>,
    metrics: TickMetrics,
}

impl TickScheduler {
    /// Creates a scheduler whose first tick fires one interval from now,
    /// plus the configured jitter.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let interval = config.tick_interval();

        let jitter = if config.initial_jitter_us > 0 {
            Duration::from_micros(rand::rng().random_range(0..config.initial_jitter_us))
        } else {
            Duration::ZERO
        };

        debug!(
            rate_hz = config.tick_rate_hz,
            interval_ms = interval.as_secs_f64() * 1000.0,
            policy = ?config.policy,
            "tick scheduler created"
        );

        Self {
            interval,
            tick_count: 0,
            next_tick: TokioInstant::now() + interval + jitter,
            drain_start: None,
            metrics: TickMetrics::default(),
            config,
        }
    }

    /// Shorthand for a default-config scheduler at `tick_rate_hz`.
    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(tick_rate_hz))
    }

    /// Sleeps until the next tick is due.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let due = self.next_tick;
        time::sleep_until(due).await;

        let now = TokioInstant::now();
        self.tick_count += 1;
        self.drain_start = Some(Instant::now());

        let late_by = now.saturating_duration_since(due);
        let overrun = late_by > self.interval / 10;
        let ticks_skipped = if overrun {
            (late_by.as_nanos() / self.interval.as_nanos()) as u64
        } else {
            0
        };

        self.next_tick = match self.config.policy {
            TickPolicy::Skip => {
                if ticks_skipped > 0 {
                    warn!(
                        tick = self.tick_count,
                        skipped = ticks_skipped,
                        late_ms = late_by.as_secs_f64() * 1000.0,
                        "tick overrun, skipping ahead"
                    );
                }
                now + self.interval
            }
            TickPolicy::Drop => {
                if overrun {
                    warn!(
                        tick = self.tick_count,
                        late_ms = late_by.as_secs_f64() * 1000.0,
                        "tick overrun, keeping original schedule"
                    );
                }
                due + self.interval
            }
        };

        if overrun {
            self.metrics.total_overruns += 1;
        }
        self.metrics.total_skipped += ticks_skipped;
        self.metrics.total_ticks += 1;

        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            overrun,
            ticks_skipped,
        }
    }

    /// Records the end of this tick's drain and how many events it handled.
    ///
    /// Does nothing unless a tick is in progress.
    pub fn record_tick_end(&mut self, events_processed: usize) {
        let Some(start) = self.drain_start.take() else {
            return;
        };
        let elapsed = start.elapsed();

        let utilization = elapsed.as_secs_f64() / self.interval.as_secs_f64();
        self.metrics.budget_utilization = utilization;
        if utilization >= self.config.budget_warn_threshold {
            warn!(
                tick = self.tick_count,
                events = events_processed,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                interval_ms = self.interval.as_secs_f64() * 1000.0,
                "drain approaching tick interval"
            );
        }

        self.metrics.last_events = events_processed;
        self.metrics.total_events += events_processed as u64;
        if elapsed > self.metrics.max_drain_time {
            self.metrics.max_drain_time = elapsed;
        }
        let alpha = 0.1;
        let prev = self.metrics.avg_drain_time.as_secs_f64();
        self.metrics.avg_drain_time =
            Duration::from_secs_f64(prev * (1.0 - alpha) + elapsed.as_secs_f64() * alpha);
    }

    /// Ticks completed so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Running totals since the scheduler started.
    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }

    pub fn tick_rate_hz(&self) -> u32 {
        self.config.tick_rate_hz
    }

    pub fn tick_interval(&self) -> Duration {
        self.interval
    }
}
