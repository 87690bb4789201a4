//! Failure handling example for singleton-guard.
//!
//! Demonstrates:
//! - A transient construction failure that the next caller recovers from
//! - A poisoning registry where the first failure is final
//! - Bounding how long a caller waits on someone else's construction
//!
//! Run with: `cargo run --example failure_and_retry`

use singleton_guard::{define_registry, GuardError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

define_registry!(lenient);
define_registry!(strict, Poison);

#[derive(Debug, thiserror::Error)]
#[error("upstream unavailable (try {0})")]
struct Unavailable(usize);

#[derive(Debug)]
struct Upstream {
    endpoint: &'static str,
}

static TRIES: AtomicUsize = AtomicUsize::new(0);

/// Fails on the first call, succeeds afterwards.
fn flaky_connect() -> Result<Upstream, Unavailable> {
    let attempt = TRIES.fetch_add(1, Ordering::SeqCst) + 1;
    if attempt == 1 {
        Err(Unavailable(attempt))
    } else {
        Ok(Upstream {
            endpoint: "https://upstream.example.com",
        })
    }
}

struct Report;

fn main() -> Result<(), GuardError> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("=== singleton-guard: Failure and Retry ===\n");

    // -------------------------------------------------------------------------
    // 1. Retry policy
    // -------------------------------------------------------------------------
    println!("1. Retry policy...");

    match lenient::try_instance_of(flaky_connect) {
        Ok(upstream) => println!("   unexpected success: {:?}", upstream),
        Err(e) => println!("   first call failed: {}", e),
    }
    let upstream = lenient::try_instance_of(flaky_connect)?;
    println!("   second call connected to {}", upstream.endpoint);

    // -------------------------------------------------------------------------
    // 2. Poison policy
    // -------------------------------------------------------------------------
    println!("\n2. Poison policy...");

    TRIES.store(0, Ordering::SeqCst);
    for _ in 0..3 {
        match strict::try_instance_of(flaky_connect) {
            Ok(upstream) => println!("   connected to {}", upstream.endpoint),
            Err(e) => println!("   failed: {}", e),
        }
    }
    println!("   factory calls: {}", TRIES.load(Ordering::SeqCst));

    // -------------------------------------------------------------------------
    // 3. Bounded waiting
    // -------------------------------------------------------------------------
    println!("\n3. Bounded waiting...");

    let builder = thread::spawn(|| {
        lenient::instance_of(|| {
            thread::sleep(Duration::from_millis(300));
            Report
        });
    });
    thread::sleep(Duration::from_millis(20));

    match lenient::try_instance_of_timeout(|| Ok::<_, Unavailable>(Report), Duration::from_millis(50)) {
        Ok(_) => println!("   report was ready"),
        Err(e) => println!("   {}", e),
    }

    let _ = builder.join();
    println!("   report ready now: {}", lenient::contains::<Report>());

    println!("\n=== Example Complete ===");
    Ok(())
}
