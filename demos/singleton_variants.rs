//! Singleton variants example for singleton-guard.
//!
//! Demonstrates:
//! - A static `InitGuard` replacing a class-level "the one instance" field
//! - An associated `instance()` accessor as the only way to obtain the value
//! - The registry replacing construction interception (`instance_of::<T>`)
//! - The locked variant: many threads, one construction
//!
//! Run with: `cargo run --example singleton_variants`

use singleton_guard::{define_registry, InitGuard};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

define_registry!(app);

/// Stands in for an expensive, side-effecting constructor.
static CONSTRUCTIONS: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug)]
struct Settings {
    name: &'static str,
}

static SETTINGS: InitGuard<Settings> = InitGuard::new();

fn settings() -> &'static Settings {
    SETTINGS.get_or_init(|| {
        CONSTRUCTIONS.fetch_add(1, Ordering::SeqCst);
        Settings { name: "demo" }
    })
}

mod clock {
    use singleton_guard::InitGuard;
    use std::time::Instant;

    /// Can only be obtained through [`Clock::instance`].
    pub struct Clock {
        started: Instant,
    }

    impl Clock {
        pub fn instance() -> &'static Clock {
            static INSTANCE: InitGuard<Clock> = InitGuard::new();
            INSTANCE.get_or_init(|| Clock {
                started: Instant::now(),
            })
        }

        pub fn uptime_ms(&self) -> u128 {
            self.started.elapsed().as_millis()
        }
    }
}

struct Audit;

impl Audit {
    fn business_logic(&self) -> &'static str {
        "executing some business logic"
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("=== singleton-guard: Singleton Variants ===\n");

    // -------------------------------------------------------------------------
    // 1. Static guard
    // -------------------------------------------------------------------------
    println!("1. Static guard...");

    let s1 = settings();
    let s2 = settings();
    assert!(std::ptr::eq(s1, s2));
    println!("   {} at {:p} and {:p}", s1.name, s1, s2);

    // -------------------------------------------------------------------------
    // 2. Associated accessor
    // -------------------------------------------------------------------------
    println!("\n2. Associated accessor...");

    let c1 = clock::Clock::instance();
    let c2 = clock::Clock::instance();
    assert!(std::ptr::eq(c1, c2));
    println!("   same clock, uptime {}ms", c2.uptime_ms());

    // -------------------------------------------------------------------------
    // 3. Registry lookup by type
    // -------------------------------------------------------------------------
    println!("\n3. Registry lookup by type...");

    let a1 = app::instance_of(|| Audit);
    let a2 = app::instance_of(|| Audit);
    assert!(std::ptr::eq(a1, a2));
    println!("   {}", a1.business_logic());

    // -------------------------------------------------------------------------
    // 4. Many threads, one construction
    // -------------------------------------------------------------------------
    println!("\n4. Racing 8 threads on a fresh guard...");

    static SHARED: InitGuard<Vec<u32>> = InitGuard::new();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            thread::spawn(move || {
                let value = SHARED.get_or_init(|| {
                    CONSTRUCTIONS.fetch_add(1, Ordering::SeqCst);
                    vec![i]
                });
                value as *const Vec<u32> as usize
            })
        })
        .collect();

    let addresses: Vec<usize> = handles
        .into_iter()
        .map(|h| h.join().unwrap_or_default())
        .collect();
    assert!(addresses.windows(2).all(|pair| pair[0] == pair[1]));
    println!("   one value for all threads: {:?}", SHARED.get());

    // -------------------------------------------------------------------------
    // Summary
    // -------------------------------------------------------------------------
    println!("\n=== Example Complete ===");
    println!(
        "Constructors run: {} (one per guard)",
        CONSTRUCTIONS.load(Ordering::SeqCst)
    );
}
