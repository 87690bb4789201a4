//! Concurrent registry example for singleton-guard.
//!
//! Demonstrates:
//! - 50 threads racing for the first `Counter`; it is built exactly once
//! - Two unrelated types initialized side by side without blocking each other
//! - Tracing registry events through a callback
//!
//! Run with: `cargo run --example concurrent_registry`

use singleton_guard::define_registry;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

define_registry!(services);

static COUNTERS_BUILT: AtomicUsize = AtomicUsize::new(0);

struct Counter {
    hits: AtomicUsize,
}

impl Counter {
    fn new_incrementing_a_global_counter() -> Self {
        COUNTERS_BUILT.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        Counter {
            hits: AtomicUsize::new(0),
        }
    }
}

struct SlowIndex;
struct FastCache;

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("=== singleton-guard: Concurrent Registry ===\n");

    services::set_trace_callback(|event| {
        if let singleton_guard::RegistryEvent::GuardCreated { type_name } = event {
            println!("   [trace] guard created for {type_name}");
        }
    });

    // -------------------------------------------------------------------------
    // 1. Fifty callers, one counter
    // -------------------------------------------------------------------------
    println!("1. Spawning 50 callers for Counter...");

    let barrier = Arc::new(Barrier::new(50));
    let handles: Vec<_> = (0..50)
        .map(|_| {
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                let counter = services::instance_of(Counter::new_incrementing_a_global_counter);
                counter.hits.fetch_add(1, Ordering::SeqCst);
                counter as *const Counter as usize
            })
        })
        .collect();

    let addresses: Vec<usize> = handles
        .into_iter()
        .map(|h| h.join().unwrap_or_default())
        .collect();

    let counter = services::get::<Counter>();
    println!(
        "   constructions: {}, distinct addresses: {}, hits: {}",
        COUNTERS_BUILT.load(Ordering::SeqCst),
        addresses.windows(2).filter(|p| p[0] != p[1]).count() + 1,
        counter.map_or(0, |c| c.hits.load(Ordering::SeqCst))
    );

    // -------------------------------------------------------------------------
    // 2. Independent types
    // -------------------------------------------------------------------------
    println!("\n2. A slow type does not hold up a fast one...");

    let start = Instant::now();
    let slow = thread::spawn(move || {
        services::instance_of(|| {
            thread::sleep(Duration::from_millis(200));
            SlowIndex
        });
        start.elapsed()
    });

    thread::sleep(Duration::from_millis(10));
    services::instance_of(|| FastCache);
    println!("   FastCache ready after {:?}", start.elapsed());

    if let Ok(elapsed) = slow.join() {
        println!("   SlowIndex ready after {:?}", elapsed);
    }

    // -------------------------------------------------------------------------
    // Summary
    // -------------------------------------------------------------------------
    println!("\n=== Example Complete ===");
    println!(
        "The registry holds {} guards.",
        services::registry().len()
    );
}
