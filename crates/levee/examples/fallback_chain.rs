//! Fallback chain example
//!
//! A flaky primary lookup falls back to a replica, which falls back to a
//! static cache. Each link is its own breaker; watch the primary trip, reject,
//! probe and recover in the logs.
//! Run with: cargo run -p levee --example fallback_chain --features tracing

use levee::{BreakerError, CircuitBreakerConfig, Completion};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::filter::LevelFilter;

#[derive(Debug, Clone)]
struct LookupError(String);

impl std::fmt::Display for LookupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lookup failed: {}", self.0)
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::DEBUG)
        .init();

    println!("=== Fallback Chain Example ===\n");

    let primary_down = Arc::new(AtomicBool::new(true));
    let down = Arc::clone(&primary_down);

    let primary = levee::breaker(
        move |key: String, done: Completion<String, LookupError>| {
            if down.load(Ordering::SeqCst) {
                done.fail(LookupError(format!("primary unreachable for {key}")));
            } else {
                done.succeed(format!("{key} from primary"));
            }
        },
        CircuitBreakerConfig::builder()
            .name("primary")
            .max_failures(2)
            .reset_timeout(Duration::from_millis(200))
            .on_state_transition(|from, to| println!("  [primary] {from} -> {to}"))
            .build(),
    );

    let replica = levee::breaker(
        |key: String, done: Completion<String, LookupError>| {
            // Slow enough to hit its own timeout every other call.
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                if key.len() % 2 == 0 {
                    done.succeed(format!("{key} from replica"));
                } else {
                    done.fail(LookupError("replica miss".into()));
                }
            });
        },
        CircuitBreakerConfig::builder()
            .name("replica")
            .timeout(Duration::from_millis(100))
            .build(),
    );

    let cache = levee::breaker(
        |key: String, done: Completion<String, LookupError>| {
            done.succeed(format!("{key} from cache (stale)"))
        },
        CircuitBreakerConfig::builder().name("cache").build(),
    );

    let stats = levee::stats(&primary);
    let chain = primary.clone().with_fallback(replica.with_fallback(cache));

    println!("--- Primary down ---");
    for key in ["ab", "abc", "abcd", "abcde"] {
        match chain.run_async(key.to_string()).await {
            Ok(value) => println!("  {key}: {value}"),
            Err(BreakerError::OpenCircuit { message }) => println!("  {key}: rejected ({message})"),
            Err(e) => println!("  {key}: error {e}"),
        }
    }
    println!("  primary open: {}", primary.is_open());

    println!("\n--- Primary recovers ---");
    primary_down.store(false, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(250)).await;
    println!("  primary half-open: {}", primary.is_half_open());

    let value = chain.run_async("xyz".to_string()).await;
    println!("  xyz: {:?}", value);
    println!("  primary closed: {}", primary.is_closed());

    println!("\n--- Primary stats ---");
    let snapshot = stats.snapshot();
    for (name, count) in &snapshot.counts {
        println!("  {name}: {count}");
    }
    if let Some(duration) = snapshot.sample("duration") {
        println!(
            "  duration: {} samples, {:.3} ms average",
            duration.count, duration.average
        );
    }
}
