use super::{Parked, Toggle};
use levee_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerEvent, CircuitState};
use levee_core::{Event, FnListener};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<CircuitBreakerEvent>) -> Vec<&'static str> {
    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(event.kind());
    }
    kinds
}

#[tokio::test(start_paused = true)]
async fn tripping_call_event_order() {
    let breaker = CircuitBreaker::new(
        Toggle::failing().command(),
        CircuitBreakerConfig::builder().max_failures(1).build(),
    );
    let mut events = breaker.events();

    let _ = breaker.run_async(1).await;
    let _ = breaker.run_async(2).await;

    assert_eq!(
        drain(&mut events),
        vec![
            "attempted",
            "duration",
            "failed",
            "state_transition",
            "attempted",
            "rejected",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn builder_hooks_fire() {
    let log = Arc::new(Mutex::new(Vec::<String>::new()));
    let push = |log: &Arc<Mutex<Vec<String>>>| {
        let log = Arc::clone(log);
        move |entry: String| log.lock().unwrap().push(entry)
    };

    let (a, r, s, f, t, d, x) = (
        push(&log),
        push(&log),
        push(&log),
        push(&log),
        push(&log),
        push(&log),
        push(&log),
    );
    let toggle = Toggle::default();
    let breaker = CircuitBreaker::new(
        toggle.command(),
        CircuitBreakerConfig::builder()
            .max_failures(1)
            .on_call_attempted(move |state| a(format!("attempted in {state}")))
            .on_call_rejected(move || r("rejected".into()))
            .on_success(move || s("success".into()))
            .on_failure(move |error| f(format!("failure: {error}")))
            .on_timeout(move |timeout| t(format!("timeout after {timeout:?}")))
            .on_duration(move |_| d("duration".into()))
            .on_state_transition(move |from, to| x(format!("{from} -> {to}")))
            .build(),
    );

    let _ = breaker.run_async(1).await;
    toggle.set_failing(true);
    let _ = breaker.run_async(2).await;
    let _ = breaker.run_async(3).await;

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "attempted in CLOSE",
            "duration",
            "success",
            "attempted in CLOSE",
            "duration",
            "failure: failed 2",
            "CLOSE -> OPEN",
            "attempted in OPEN",
            "rejected",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn timeout_hook_receives_the_deadline() {
    let seen = Arc::new(Mutex::new(None));
    let s = Arc::clone(&seen);
    let breaker = CircuitBreaker::new(
        Parked::default().command(),
        CircuitBreakerConfig::builder()
            .timeout(Duration::from_millis(250))
            .on_timeout(move |timeout| *s.lock().unwrap() = Some(timeout))
            .build(),
    );

    let _ = breaker.run_async(1).await;
    assert_eq!(*seen.lock().unwrap(), Some(Duration::from_millis(250)));
}

#[tokio::test(start_paused = true)]
async fn duration_measures_the_command() {
    let parked = Parked::default();
    let breaker = CircuitBreaker::new(parked.command(), CircuitBreakerConfig::default());
    let mut events = breaker.events();

    let call = breaker.run_async(1);
    sleep(Duration::from_millis(300)).await;
    parked.succeed_next(1);
    call.await.unwrap();

    let elapsed = std::iter::from_fn(|| events.try_recv().ok())
        .find_map(|event| match event {
            CircuitBreakerEvent::CallDuration { elapsed, .. } => Some(elapsed),
            _ => None,
        })
        .unwrap();
    assert_eq!(elapsed, Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn events_carry_the_breaker_name() {
    let breaker = CircuitBreaker::new(
        Toggle::default().command(),
        CircuitBreakerConfig::builder().name("inventory").build(),
    );
    let mut events = breaker.events();

    breaker.run_async(1).await.unwrap();
    breaker.open();

    while let Ok(event) = events.try_recv() {
        assert_eq!(event.source(), "inventory");
    }
}

#[tokio::test(start_paused = true)]
async fn late_subscribers_only_see_later_events() {
    let breaker = CircuitBreaker::new(Toggle::default().command(), CircuitBreakerConfig::default());
    breaker.run_async(1).await.unwrap();

    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    breaker.subscribe(FnListener::new(move |_: &CircuitBreakerEvent| {
        c.fetch_add(1, Ordering::SeqCst);
    }));

    breaker.open();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn panicking_listener_does_not_break_the_breaker() {
    let breaker = CircuitBreaker::new(
        Toggle::failing().command(),
        CircuitBreakerConfig::builder()
            .max_failures(1)
            .on_failure(|_| panic!("listener bug"))
            .build(),
    );

    assert!(breaker.run_async(1).await.unwrap_err().is_inner());
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[tokio::test(start_paused = true)]
async fn listeners_may_call_back_into_the_breaker() {
    let breaker = CircuitBreaker::new(Toggle::failing().command(), CircuitBreakerConfig::default());
    let handle = breaker.clone();
    breaker.subscribe(FnListener::new(move |event: &CircuitBreakerEvent| {
        if matches!(event, CircuitBreakerEvent::CallFailed { .. }) {
            // Reading state and forcing transitions from a listener must not deadlock.
            let _ = handle.failure_count();
            handle.open();
        }
    }));

    let _ = breaker.run_async(1).await;
    assert!(breaker.is_open());
}
