use std::sync::atomic::AtomicBool;
use std::time::Duration;

use clap::Parser;
use ttl_dedup_harness::{run, HarnessConfig};

fn config(args: &[&str]) -> HarnessConfig {
    HarnessConfig::try_parse_from(std::iter::once("dedup-harness").chain(args.iter().copied()))
        .unwrap()
}

#[test]
fn shared_key_is_computed_once_per_episode() {
    // The first value stays fresh for the whole run.
    let config = config(&[
        "--callers",
        "20",
        "--spawn-interval",
        "1ms",
        "--max-delay",
        "0ms",
        "--ttl",
        "1h",
    ]);
    let summary = run(&config, &AtomicBool::new(false)).unwrap();

    assert_eq!(summary.callers, 20);
    assert_eq!(summary.compute_calls, 1);
    let g = summary.statistics.key("G").unwrap();
    assert_eq!(g.resolved, 20);
    assert_eq!(summary.statistics.callers(), 20);
}

#[test]
fn keys_are_computed_independently() {
    let config = config(&[
        "--callers",
        "9",
        "--keys",
        "A,B,C",
        "--spawn-interval",
        "0ms",
        "--max-delay",
        "50ms",
        "--ttl",
        "1h",
        "--workers",
        "9",
    ]);
    let summary = run(&config, &AtomicBool::new(false)).unwrap();

    assert_eq!(summary.compute_calls, 3);
    for key in ["A", "B", "C"] {
        assert_eq!(summary.statistics.key(key).unwrap().resolved, 3);
    }
}

#[test]
fn failures_are_reported() {
    let config = config(&[
        "--callers",
        "4",
        "--spawn-interval",
        "0ms",
        "--max-delay",
        "0ms",
        "--failure-rate",
        "1",
        "--workers",
        "1",
    ]);
    let summary = run(&config, &AtomicBool::new(false)).unwrap();

    // Nothing is ever cached, so every caller computes and fails.
    assert_eq!(summary.compute_calls, 4);
    assert_eq!(summary.statistics.key("G").unwrap().failed, 4);
    assert!(summary
        .to_string()
        .ends_with("Calls to compute: 4"));
}

#[test]
fn waiters_time_out_on_slow_computation() {
    // The first caller computes for 300ms; the others give up after 50ms.
    let config = config(&[
        "--callers",
        "3",
        "--spawn-interval",
        "10ms",
        "--min-delay",
        "300ms",
        "--max-delay",
        "301ms",
        "--ttl",
        "1h",
        "--timeout",
        "50ms",
    ]);
    let summary = run(&config, &AtomicBool::new(false)).unwrap();

    let g = summary.statistics.key("G").unwrap();
    assert_eq!(g.callers(), 3);
    assert!(g.timed_out >= 1);
    assert!(g.resolved >= 1);
    assert!(g.max_latency >= Duration::from_millis(300));
    assert_eq!(summary.compute_calls, 1);
}

#[test]
fn cancelled_run_starts_no_callers() {
    let summary = run(&config(&["--callers", "5"]), &AtomicBool::new(true)).unwrap();
    assert_eq!(summary.callers, 0);
    assert_eq!(summary.compute_calls, 0);
    assert_eq!(summary.statistics.callers(), 0);
}

#[test]
fn invalid_config_is_rejected() {
    assert!(run(&config(&["--callers", "0"]), &AtomicBool::new(false)).is_err());
}
