use levee_stats::{SharedStats, Stats};
use std::thread;

#[test]
fn unknown_names_read_as_zero() {
    let stats = Stats::new();
    assert_eq!(stats.count("never"), 0);
    assert!(stats.snapshot().counts.is_empty());
    assert!(stats.snapshot().samples.is_empty());
}

#[test]
fn counters_move_both_ways() {
    let mut stats = Stats::new();
    stats.decrement("in_flight");
    stats.decrement("in_flight");
    stats.increment("in_flight");
    assert_eq!(stats.count("in_flight"), -1);
}

#[test]
fn averages_reflect_every_sample() {
    let mut stats = Stats::new();
    for v in [1.0, 2.0, 3.0, 4.0] {
        stats.sample("latency", v);
    }

    let snapshot = stats.snapshot();
    let latency = snapshot.sample("latency").unwrap();
    assert_eq!(latency.count, 4);
    assert_eq!(latency.average, 2.5);
}

#[test]
fn emptied_sample_averages_to_infinity() {
    let mut stats = Stats::new();
    stats.sample("latency", 12.0);
    stats.reset_samples(Some("latency"));

    let snapshot = stats.snapshot();
    let latency = snapshot.sample("latency").unwrap();
    assert_eq!(latency.count, 0);
    assert!(latency.average.is_infinite());
}

#[test]
fn full_reset_keeps_every_name() {
    let mut stats = Stats::new();
    stats.increment("a");
    stats.increment("b");
    stats.sample("c", 1.0);
    stats.reset();

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.count("a"), Some(0));
    assert_eq!(snapshot.count("b"), Some(0));
    assert_eq!(snapshot.sample("c").unwrap().count, 0);
}

#[test]
fn named_reset_leaves_others_alone() {
    let mut stats = Stats::new();
    stats.increment("a");
    stats.increment("b");
    stats.reset_counts(Some("a"));

    assert_eq!(stats.count("a"), 0);
    assert_eq!(stats.count("b"), 1);
}

#[test]
fn retention_limit_slides_the_window() {
    let mut stats = Stats::builder().max_samples(3).build();
    assert_eq!(stats.max_samples(), Some(3));
    for v in [100.0, 1.0, 2.0, 3.0] {
        stats.sample("latency", v);
    }

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.sample("latency").unwrap().count, 3);
    assert_eq!(snapshot.sample("latency").unwrap().average, 2.0);
}

#[test]
fn snapshots_do_not_track_later_updates() {
    let mut stats = Stats::new();
    stats.increment("calls");
    let before = stats.snapshot();
    stats.increment("calls");

    assert_eq!(before.count("calls"), Some(1));
    assert_eq!(stats.snapshot().count("calls"), Some(2));
}

#[test]
fn shared_stats_accept_updates_from_many_threads() {
    let stats = SharedStats::default();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let stats = stats.clone();
            thread::spawn(move || {
                for i in 0..100 {
                    stats.increment("calls");
                    stats.sample("latency", i as f64);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(stats.count("calls"), 800);
    let snapshot = stats.snapshot();
    assert_eq!(snapshot.sample("latency").unwrap().count, 800);
    assert_eq!(snapshot.sample("latency").unwrap().average, 49.5);
}
