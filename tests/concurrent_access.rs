//! Integration tests for concurrent first access.
//!
//! Each test drives many threads at a singleton that nobody has constructed yet
//! and checks that the factory ran once and every thread holds the same object.

use singleton_guard::{define_registry, InitGuard};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

/// Spawns `callers` threads that start together and each run `call`.
fn race<R, F>(callers: usize, call: F) -> Vec<R>
where
    R: Send + 'static,
    F: Fn() -> R + Send + Sync + 'static,
{
    let barrier = Arc::new(Barrier::new(callers));
    let call = Arc::new(call);

    let handles: Vec<_> = (0..callers)
        .map(|_| {
            let barrier = barrier.clone();
            let call = call.clone();
            thread::spawn(move || {
                barrier.wait();
                call()
            })
        })
        .collect();

    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

fn all_same(addresses: &[usize]) -> bool {
    addresses.windows(2).all(|pair| pair[0] == pair[1])
}

#[test]
fn test_fifty_callers_one_counter() {
    define_registry!(counters);

    static CONSTRUCTED: AtomicUsize = AtomicUsize::new(0);

    struct Counter {
        serial: usize,
    }

    impl Counter {
        fn new_incrementing_a_global_counter() -> Self {
            let serial = CONSTRUCTED.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(10));
            Counter { serial }
        }
    }

    let addresses = race(50, || {
        let counter = counters::instance_of(Counter::new_incrementing_a_global_counter);
        counter as *const Counter as usize
    });

    assert_eq!(addresses.len(), 50);
    assert!(all_same(&addresses));
    assert_eq!(CONSTRUCTED.load(Ordering::SeqCst), 1);
    assert_eq!(counters::get::<Counter>().map(|c| c.serial), Some(0));
}

#[test]
fn test_two_types_ten_callers_each() {
    define_registry!(pair);

    static A_CALLS: AtomicUsize = AtomicUsize::new(0);
    static B_CALLS: AtomicUsize = AtomicUsize::new(0);

    struct A;
    struct B;

    // Half the threads ask for A, half for B, all at the same moment.
    let a_addresses = Arc::new(std::sync::Mutex::new(Vec::new()));
    let b_addresses = Arc::new(std::sync::Mutex::new(Vec::new()));
    let barrier = Arc::new(Barrier::new(20));

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let barrier = barrier.clone();
            let a_addresses = a_addresses.clone();
            let b_addresses = b_addresses.clone();
            thread::spawn(move || {
                barrier.wait();
                if i % 2 == 0 {
                    let a = pair::instance_of(|| {
                        A_CALLS.fetch_add(1, Ordering::SeqCst);
                        A
                    });
                    a_addresses.lock().unwrap().push(a as *const A as usize);
                } else {
                    let b = pair::instance_of(|| {
                        B_CALLS.fetch_add(1, Ordering::SeqCst);
                        B
                    });
                    b_addresses.lock().unwrap().push(b as *const B as usize);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(A_CALLS.load(Ordering::SeqCst), 1);
    assert_eq!(B_CALLS.load(Ordering::SeqCst), 1);

    let a_addresses = a_addresses.lock().unwrap();
    let b_addresses = b_addresses.lock().unwrap();
    assert_eq!(a_addresses.len(), 10);
    assert_eq!(b_addresses.len(), 10);
    assert!(all_same(&a_addresses));
    assert!(all_same(&b_addresses));
    assert_eq!(pair::registry().len(), 2);
}

#[test]
fn test_any_number_of_callers_converges() {
    for callers in [1, 2, 3, 8, 17, 32] {
        let guard: &'static InitGuard<Vec<usize>> = Box::leak(Box::new(InitGuard::new()));
        let calls: &'static AtomicUsize = Box::leak(Box::new(AtomicUsize::new(0)));

        let addresses = race(callers, move || {
            let value = guard.get_or_init(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                vec![callers]
            });
            value as *const Vec<usize> as usize
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1, "callers = {callers}");
        assert!(all_same(&addresses), "callers = {callers}");
        assert_eq!(guard.get(), Some(&vec![callers]));
    }
}

#[test]
fn test_repeated_calls_are_idempotent() {
    define_registry!(repeated);

    static CALLS: AtomicUsize = AtomicUsize::new(0);

    let addresses = race(8, || {
        (0..1_000)
            .map(|_| {
                let value = repeated::instance_of(|| {
                    CALLS.fetch_add(1, Ordering::SeqCst);
                    String::from("shared")
                });
                value as *const String as usize
            })
            .collect::<Vec<_>>()
    });

    let flattened: Vec<usize> = addresses.into_iter().flatten().collect();
    assert_eq!(flattened.len(), 8_000);
    assert!(all_same(&flattened));
    assert_eq!(CALLS.load(Ordering::SeqCst), 1);
}

#[test]
fn test_published_value_is_complete() {
    define_registry!(tables);

    struct Table {
        rows: Vec<u64>,
        checksum: u64,
    }

    let checksums = race(16, || {
        let table = tables::instance_of(|| {
            let rows: Vec<u64> = (1..=10_000).collect();
            let checksum = rows.iter().sum();
            Table { rows, checksum }
        });
        // Every reader sees the rows and the checksum written by the factory.
        (table.rows.iter().sum::<u64>(), table.checksum)
    });

    for (computed, stored) in checksums {
        assert_eq!(computed, stored);
        assert_eq!(stored, 50_005_000);
    }
}
