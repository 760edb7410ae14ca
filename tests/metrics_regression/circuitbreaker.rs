//! Circuit breaker metrics regression tests

use super::helpers::*;
use levee_circuitbreaker::{command_fn, CircuitBreaker, CircuitBreakerConfig, Command, Completion};
use serial_test::serial;
use std::time::Duration;

/// Succeeds on even requests and fails on odd ones.
fn flaky(
    name: &str,
    max_failures: usize,
) -> CircuitBreaker<impl Command<Request = u32, Response = u32, Error = String> + use<>> {
    CircuitBreaker::new(
        command_fn(|req: u32, done: Completion<u32, String>| {
            if req % 2 == 0 {
                done.succeed(req)
            } else {
                done.fail(format!("odd {req}"))
            }
        }),
        CircuitBreakerConfig::builder()
            .name(name)
            .max_failures(max_failures)
            .reset_timeout(Duration::from_millis(50))
            .build(),
    )
}

#[tokio::test]
#[serial]
async fn circuitbreaker_metrics_exist() {
    init_recorder();

    let breaker = flaky("test_cb", 2);
    for i in 0..6 {
        let _ = breaker.run_async(i).await;
    }
    // 0 ok, 1 fail, 2 ok, 3 fail, 4 ok, 5 fail: never two in a row.
    assert!(breaker.is_closed());
    breaker.open();

    assert_counter_exists("levee_calls_total");
    assert_metric_has_label("levee_calls_total", "breaker", "test_cb");
    assert_metric_has_label("levee_calls_total", "outcome", "success");
    assert_metric_has_label("levee_calls_total", "outcome", "failure");

    assert_counter_exists("levee_transitions_total");
    assert_metric_has_label("levee_transitions_total", "breaker", "test_cb");

    assert_gauge_exists("levee_state");
    assert_metric_has_label("levee_state", "breaker", "test_cb");

    assert_histogram_exists("levee_call_duration_seconds");
    assert_metric_has_label("levee_call_duration_seconds", "breaker", "test_cb");
}

#[tokio::test]
#[serial]
async fn circuitbreaker_outcome_counts() {
    init_recorder();

    let breaker = flaky("counted_cb", 2);
    breaker.run_async(0).await.unwrap();
    breaker.run_async(1).await.unwrap_err();
    breaker.run_async(3).await.unwrap_err();
    breaker.run_async(0).await.unwrap_err();

    let snapshot = get_metrics_snapshot();
    let labels = |outcome: &'static str| [("breaker", "counted_cb"), ("outcome", outcome)];
    assert_eq!(counter_value(&snapshot, "levee_calls_total", &labels("success")), 1);
    assert_eq!(counter_value(&snapshot, "levee_calls_total", &labels("failure")), 2);
    assert_eq!(counter_value(&snapshot, "levee_calls_total", &labels("rejected")), 1);
}

#[tokio::test]
#[serial]
async fn circuitbreaker_transition_labels() {
    init_recorder();

    let breaker = flaky("cycling_cb", 1);
    breaker.run_async(1).await.unwrap_err();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(breaker.is_half_open());
    breaker.run_async(2).await.unwrap();

    let snapshot = get_metrics_snapshot();
    let transitions = |from: &str, to: &str| {
        counter_value(
            &snapshot,
            "levee_transitions_total",
            &[("breaker", "cycling_cb"), ("from", from), ("to", to)],
        )
    };
    assert_eq!(transitions("CLOSE", "OPEN"), 1);
    assert_eq!(transitions("OPEN", "HALF_OPEN"), 1);
    assert_eq!(transitions("HALF_OPEN", "CLOSE"), 1);
}

#[tokio::test]
#[serial]
async fn circuitbreaker_timeout_metrics() {
    init_recorder();

    let breaker = CircuitBreaker::new(
        command_fn(|_: (), _done: Completion<(), String>| {}),
        CircuitBreakerConfig::builder()
            .name("slow_cb")
            .timeout(Duration::from_millis(20))
            .build(),
    );
    assert!(breaker.run_async(()).await.unwrap_err().is_timeout());

    let snapshot = get_metrics_snapshot();
    assert_eq!(
        counter_value(
            &snapshot,
            "levee_calls_total",
            &[("breaker", "slow_cb"), ("outcome", "timeout")]
        ),
        1
    );
}
