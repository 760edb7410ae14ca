use super::{capture, Parked};
use levee_circuitbreaker::{
    BreakerError, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerEvent, DEFAULT_TIMEOUT_MESSAGE,
};
use levee_core::Event;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn config(max_failures: usize) -> CircuitBreakerConfig {
    CircuitBreakerConfig::builder()
        .max_failures(max_failures)
        .timeout(Duration::from_millis(100))
        .reset_timeout(Duration::from_secs(10))
        .build()
}

#[tokio::test(start_paused = true)]
async fn slow_command_times_out() {
    let parked = Parked::default();
    let breaker = CircuitBreaker::new(parked.command(), config(5));

    let err = breaker.run_async(1).await.unwrap_err();

    assert_eq!(
        err,
        BreakerError::Timeout {
            message: DEFAULT_TIMEOUT_MESSAGE.to_string()
        }
    );
    assert_eq!(err.code(), Some("ETIMEDOUT"));
    assert_eq!(breaker.failure_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn custom_timeout_message() {
    let breaker = CircuitBreaker::new(
        Parked::default().command(),
        CircuitBreakerConfig::builder()
            .timeout(Duration::from_millis(10))
            .timeout_error_message("too slow")
            .build(),
    );

    let err = breaker.run_async(1).await.unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(err.to_string(), "too slow");
}

#[tokio::test(start_paused = true)]
async fn timeouts_open_at_threshold() {
    let parked = Parked::default();
    let breaker = CircuitBreaker::new(parked.command(), config(2));

    assert!(breaker.run_async(1).await.unwrap_err().is_timeout());
    assert!(breaker.is_closed());
    assert!(breaker.run_async(2).await.unwrap_err().is_timeout());
    assert!(breaker.is_open());
}

#[tokio::test(start_paused = true)]
async fn late_response_is_discarded() {
    let parked = Parked::default();
    let breaker = CircuitBreaker::new(parked.command(), config(5));
    let mut events = breaker.events();

    let delivered = Arc::new(AtomicUsize::new(0));
    let d = Arc::clone(&delivered);
    let (callback, rx) = capture();
    breaker.run(1, move |result| {
        d.fetch_add(1, Ordering::SeqCst);
        callback(result);
    });

    assert!(rx.await.unwrap().unwrap_err().is_timeout());

    parked.succeed_next(1);
    sleep(Duration::from_secs(1)).await;

    assert_eq!(delivered.load(Ordering::SeqCst), 1);
    assert_eq!(breaker.failure_count(), 1);

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(event.kind());
    }
    assert_eq!(kinds, vec!["attempted", "timeout"]);
}

#[tokio::test(start_paused = true)]
async fn timely_response_cancels_the_timer() {
    let parked = Parked::default();
    let breaker = CircuitBreaker::new(parked.command(), config(1));
    let mut events = breaker.events();

    let (callback, rx) = capture();
    breaker.run(1, callback);
    sleep(Duration::from_millis(50)).await;
    parked.succeed_next(5);
    assert_eq!(rx.await.unwrap(), Ok(5));

    sleep(Duration::from_secs(1)).await;
    assert!(breaker.is_closed());
    assert_eq!(breaker.failure_count(), 0);
    while let Ok(event) = events.try_recv() {
        assert!(!matches!(event, CircuitBreakerEvent::CallTimedOut { .. }));
    }
}

#[tokio::test(start_paused = true)]
async fn timeout_does_not_cancel_the_command() {
    let parked = Parked::default();
    let breaker = CircuitBreaker::new(parked.command(), config(5));

    let _ = breaker.run_async(1).await;
    // The command still holds its completion; nothing was torn down.
    assert_eq!(parked.len(), 1);
}
