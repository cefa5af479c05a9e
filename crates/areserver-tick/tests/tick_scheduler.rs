//! Integration tests for the tick scheduler.
//!
//! Async tests run with `start_paused = true`, so tokio's clock only moves
//! when every task is idle and `sleep_until` resolves without real waiting.

use std::time::Duration;

use areserver_tick::{TickConfig, TickPolicy, TickScheduler};

fn config_20hz() -> TickConfig {
    TickConfig::with_rate(20)
}

// =========================================================================
// TickConfig
// =========================================================================

#[test]
fn test_default_config_drains_every_8ms() {
    let cfg = TickConfig::default();
    assert_eq!(cfg.tick_rate_hz, 125);
    assert_eq!(cfg.tick_interval(), Duration::from_millis(8));
    assert_eq!(cfg.policy, TickPolicy::Skip);
    assert_eq!(cfg.initial_jitter_us, 0);
}

#[test]
fn test_validated_clamps_rate_above_max() {
    let cfg = TickConfig::with_rate(1_000).validated();
    assert_eq!(cfg.tick_rate_hz, TickConfig::MAX_TICK_RATE_HZ);
}

#[test]
fn test_validated_zero_rate_becomes_one() {
    let cfg = TickConfig::with_rate(0).validated();
    assert_eq!(cfg.tick_rate_hz, 1);
    assert_eq!(cfg.tick_interval(), Duration::from_secs(1));
}

#[test]
fn test_validated_clamps_threshold() {
    let cfg = TickConfig {
        budget_warn_threshold: 3.0,
        ..TickConfig::default()
    }
    .validated();
    assert_eq!(cfg.budget_warn_threshold, 1.0);
}

// =========================================================================
// Scheduler
// =========================================================================

#[test]
fn test_scheduler_initial_state() {
    let s = TickScheduler::new(config_20hz());
    assert_eq!(s.tick_count(), 0);
    assert_eq!(s.tick_rate_hz(), 20);
    assert_eq!(s.tick_interval(), Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_tick_fires_after_one_interval() {
    let mut s = TickScheduler::new(config_20hz());
    let start = tokio::time::Instant::now();

    let info = s.wait_for_tick().await;

    assert_eq!(info.tick, 1);
    assert!(!info.overrun);
    assert_eq!(info.ticks_skipped, 0);
    assert_eq!(start.elapsed(), Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
async fn test_ticks_increment_monotonically() {
    let mut s = TickScheduler::with_rate(125);
    for expected in 1..=5 {
        let info = s.wait_for_tick().await;
        assert_eq!(info.tick, expected);
    }
    assert_eq!(s.tick_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_initial_jitter_delays_only_first_tick() {
    let mut s = TickScheduler::new(TickConfig {
        initial_jitter_us: 5_000,
        ..config_20hz()
    });
    let start = tokio::time::Instant::now();

    s.wait_for_tick().await;
    let first = start.elapsed();
    assert!(first >= Duration::from_millis(50));
    assert!(first < Duration::from_millis(55));

    let before_second = tokio::time::Instant::now();
    s.wait_for_tick().await;
    assert_eq!(before_second.elapsed(), Duration::from_millis(50));
}

// =========================================================================
// Overruns
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_skip_policy_reschedules_from_now() {
    let mut s = TickScheduler::new(config_20hz());
    s.wait_for_tick().await;

    // Lose three and a half intervals before asking for the next tick.
    tokio::time::advance(Duration::from_millis(225)).await;
    let info = s.wait_for_tick().await;
    assert!(info.overrun);
    assert_eq!(info.ticks_skipped, 3);

    let before = tokio::time::Instant::now();
    s.wait_for_tick().await;
    assert_eq!(before.elapsed(), Duration::from_millis(50));
    assert_eq!(s.metrics().total_overruns, 1);
    assert_eq!(s.metrics().total_skipped, 3);
}

#[tokio::test(start_paused = true)]
async fn test_drop_policy_keeps_original_cadence() {
    let mut s = TickScheduler::new(TickConfig {
        policy: TickPolicy::Drop,
        ..config_20hz()
    });
    s.wait_for_tick().await;

    tokio::time::advance(Duration::from_millis(80)).await;
    let info = s.wait_for_tick().await;
    assert!(info.overrun);

    // Second tick was due at 100ms and fired at 130ms, so the third is due
    // at 150ms: 20ms from now.
    let before = tokio::time::Instant::now();
    s.wait_for_tick().await;
    assert_eq!(before.elapsed(), Duration::from_millis(20));
}

// =========================================================================
// Metrics
// =========================================================================

#[test]
fn test_initial_metrics_are_zero() {
    let s = TickScheduler::new(config_20hz());
    let m = s.metrics();
    assert_eq!(m.total_ticks, 0);
    assert_eq!(m.total_events, 0);
    assert_eq!(m.avg_drain_time, Duration::ZERO);
    assert_eq!(m.max_drain_time, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_record_tick_end_counts_events() {
    let mut s = TickScheduler::new(config_20hz());

    for events in [3, 0, 7] {
        s.wait_for_tick().await;
        s.record_tick_end(events);
    }

    let m = s.metrics();
    assert_eq!(m.total_ticks, 3);
    assert_eq!(m.total_events, 10);
    assert_eq!(m.last_events, 7);
}

#[tokio::test(start_paused = true)]
async fn test_record_tick_end_without_wait_is_noop() {
    let mut s = TickScheduler::new(config_20hz());
    s.record_tick_end(4);
    assert_eq!(s.metrics().total_events, 0);
}

#[tokio::test(start_paused = true)]
async fn test_drain_time_tracked_from_wall_clock() {
    let mut s = TickScheduler::new(config_20hz());

    s.wait_for_tick().await;
    // Drain timing uses std::time::Instant, so burn real time.
    std::thread::sleep(Duration::from_micros(200));
    s.record_tick_end(1);

    let m = s.metrics();
    assert!(m.max_drain_time >= Duration::from_micros(200));
    assert!(m.budget_utilization > 0.0);
    assert!(m.budget_utilization < 1.0);
}

// =========================================================================
// Drain loop pattern
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_drain_loop_empties_queue_each_tick() {
    let mut s = TickScheduler::new(config_20hz());
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<u32>();

    tokio::spawn(async move {
        for i in 0..10 {
            tx.send(i).ok();
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    });

    let mut seen = Vec::new();
    while s.tick_count() < 6 {
        s.wait_for_tick().await;
        let mut handled = 0;
        while let Ok(v) = rx.try_recv() {
            seen.push(v);
            handled += 1;
        }
        s.record_tick_end(handled);
    }

    // 300ms of ticks covers the sends at 0..=180ms.
    assert_eq!(seen, (0..10).collect::<Vec<_>>());
    assert_eq!(s.metrics().total_events, 10);
}
