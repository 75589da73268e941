//! Tests for the room expiry sweep.

use std::time::Duration;

use caro_clock::{SweepConfig, SweepTimer};
use tokio::time::{self, Instant};

fn every_second() -> SweepConfig {
    SweepConfig {
        interval: Some(Duration::from_secs(1)),
        initial_jitter: Duration::ZERO,
    }
}

#[test]
fn test_default_config_is_disabled() {
    let timer = SweepTimer::new(SweepConfig::default());
    assert!(!timer.is_enabled());
    assert!(!timer.is_armed());
}

#[tokio::test(start_paused = true)]
async fn test_disabled_timer_never_fires() {
    let mut timer = SweepTimer::disabled();
    timer.arm();
    assert!(!timer.is_armed());

    let fired = time::timeout(Duration::from_secs(3600), timer.wait_for_sweep()).await;
    assert!(fired.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_unarmed_timer_pends() {
    let mut timer = SweepTimer::new(every_second());
    let fired = time::timeout(Duration::from_secs(10), timer.wait_for_sweep()).await;
    assert!(fired.is_err());
    assert_eq!(timer.sweep_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_armed_timer_fires_each_interval() {
    let mut timer = SweepTimer::new(every_second());
    let start = Instant::now();
    timer.arm();

    let first = timer.wait_for_sweep().await;
    assert_eq!(first.sweep, 1);
    assert_eq!(Instant::now() - start, Duration::from_secs(1));

    let second = timer.wait_for_sweep().await;
    assert_eq!(second.sweep, 2);
    assert_eq!(Instant::now() - start, Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_disarm_stops_sweeps() {
    let mut timer = SweepTimer::new(every_second());
    timer.arm();
    timer.wait_for_sweep().await;
    timer.disarm();

    let fired = time::timeout(Duration::from_secs(10), timer.wait_for_sweep()).await;
    assert!(fired.is_err());
    assert_eq!(timer.sweep_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_jitter_delays_first_sweep_within_bound() {
    let mut timer = SweepTimer::new(SweepConfig {
        interval: Some(Duration::from_secs(1)),
        initial_jitter: Duration::from_millis(500),
    });
    let start = Instant::now();
    timer.arm();
    timer.wait_for_sweep().await;

    let waited = Instant::now() - start;
    assert!(waited >= Duration::from_secs(1));
    assert!(waited < Duration::from_millis(1_500));
}
