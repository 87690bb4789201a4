//! Exactly-once initialization guard.
//!
//! An [`InitGuard<T>`] owns the slot for one lazily constructed value. The first
//! caller to find it empty runs the factory; callers arriving while that attempt is
//! in flight block until it settles; callers arriving after publication read the
//! value without taking a lock.
//!
//! ```text
//! Uninitialized --begin--> Initializing --complete--> Initialized
//!                               |
//!                               +--fail--> Uninitialized   (FailurePolicy::Retry)
//!                               +--fail--> Poisoned        (FailurePolicy::Poison)
//! ```

use std::any::type_name;
use std::convert::Infallible;
use std::error::Error;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::guard_error::{FactoryError, FactoryPanicked, GuardError};

/// What a guard does after a factory fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Go back to uninitialized; the next caller runs its own factory.
    #[default]
    Retry,
    /// Stay failed; every later caller gets the original error.
    Poison,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Uninitialized,
    Initializing { owner: ThreadId, attempt: u64 },
    Initialized,
    Poisoned,
}

/// One run of a factory. Waiters hold on to it so they report the outcome of
/// the attempt they blocked on, not of whichever attempt ran last.
struct Attempt {
    number: u64,
    failure: OnceLock<FactoryError>,
}

struct Slot {
    state: State,
    attempts: u64,
    waiting: usize,
    in_flight: Option<Arc<Attempt>>,
    poisoned_by: Option<FactoryError>,
}

/// A cell whose value is constructed at most once, by whichever caller gets
/// there first.
///
/// `InitGuard::new` is `const`, so a guard can live in a `static` and stand in for
/// a hand-written singleton:
///
/// ```rust
/// use singleton_guard::InitGuard;
///
/// struct Settings {
///     name: String,
/// }
///
/// static SETTINGS: InitGuard<Settings> = InitGuard::new();
///
/// let a = SETTINGS.get_or_init(|| Settings { name: "app".into() });
/// let b = SETTINGS.get_or_init(|| unreachable!());
///
/// assert!(std::ptr::eq(a, b));
/// assert_eq!(b.name, "app");
/// ```
///
/// The factory must not call back into the same guard. Doing so from the thread
/// that is running the factory panics with [`GuardError::Reentrant`]; doing it
/// through another thread that the factory then waits on deadlocks.
pub struct InitGuard<T> {
    value: OnceLock<T>,
    slot: Mutex<Slot>,
    settled: Condvar,
    policy: FailurePolicy,
}

impl<T> InitGuard<T> {
    /// Creates an empty guard with [`FailurePolicy::Retry`].
    pub const fn new() -> Self {
        Self::with_policy(FailurePolicy::Retry)
    }

    /// Creates an empty guard with the given failure policy.
    pub const fn with_policy(policy: FailurePolicy) -> Self {
        Self {
            value: OnceLock::new(),
            slot: Mutex::new(Slot {
                state: State::Uninitialized,
                attempts: 0,
                waiting: 0,
                in_flight: None,
                poisoned_by: None,
            }),
            settled: Condvar::new(),
            policy,
        }
    }

    /// Creates a guard that is already initialized with `value`.
    pub fn with_value(value: T) -> Self {
        Self {
            value: OnceLock::from(value),
            slot: Mutex::new(Slot {
                state: State::Initialized,
                attempts: 0,
                waiting: 0,
                in_flight: None,
                poisoned_by: None,
            }),
            settled: Condvar::new(),
            policy: FailurePolicy::Retry,
        }
    }

    /// Returns the value, running `factory` first if nobody has published one yet.
    ///
    /// # Panics
    ///
    /// - if `factory` re-enters this guard
    /// - if this call waited on another caller's attempt and that attempt failed,
    ///   or the guard is poisoned; use [`get_or_try_init`](Self::get_or_try_init)
    ///   to receive those failures as errors
    /// - if `factory` itself panics (the guard is left retryable or poisoned
    ///   according to its policy)
    pub fn get_or_init<F>(&self, factory: F) -> &T
    where
        F: FnOnce() -> T,
    {
        match self.get_or_try_init(|| Ok::<T, Infallible>(factory())) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    /// Returns the value, running the fallible `factory` first if needed.
    ///
    /// # Errors
    ///
    /// [`GuardError::ConstructionFailed`] when the attempt this call ran, or the
    /// attempt it waited on, failed; also for every call on a poisoned guard.
    pub fn get_or_try_init<F, E>(&self, factory: F) -> Result<&T, GuardError>
    where
        F: FnOnce() -> Result<T, E>,
        E: Error + Send + Sync + 'static,
    {
        if let Some(value) = self.value.get() {
            return Ok(value);
        }
        self.initialize(factory, None)
    }

    /// Like [`get_or_try_init`](Self::get_or_try_init), but gives up waiting on
    /// another caller's attempt after `timeout`.
    ///
    /// The timeout only bounds waiting. A caller that ends up running the
    /// factory itself runs it to completion.
    ///
    /// # Errors
    ///
    /// [`GuardError::TimedOut`] if the in-flight attempt did not settle in time,
    /// otherwise as for `get_or_try_init`.
    pub fn get_or_try_init_timeout<F, E>(
        &self,
        factory: F,
        timeout: Duration,
    ) -> Result<&T, GuardError>
    where
        F: FnOnce() -> Result<T, E>,
        E: Error + Send + Sync + 'static,
    {
        if let Some(value) = self.value.get() {
            return Ok(value);
        }
        self.initialize(factory, Some(timeout))
    }

    /// Returns the value if it has been published. Never blocks.
    pub fn get(&self) -> Option<&T> {
        self.value.get()
    }

    pub fn is_initialized(&self) -> bool {
        self.value.get().is_some()
    }

    pub fn is_poisoned(&self) -> bool {
        self.lock().state == State::Poisoned
    }

    /// Number of times a factory has been started on this guard.
    pub fn attempts(&self) -> u64 {
        self.lock().attempts
    }

    /// Number of callers currently blocked on an in-flight attempt.
    pub fn waiting(&self) -> usize {
        self.lock().waiting
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Consumes the guard, returning the value if one was published.
    pub fn into_inner(self) -> Option<T> {
        self.value.into_inner()
    }

    #[cold]
    fn initialize<F, E>(&self, factory: F, timeout: Option<Duration>) -> Result<&T, GuardError>
    where
        F: FnOnce() -> Result<T, E>,
        E: Error + Send + Sync + 'static,
    {
        let started = Instant::now();
        let mut slot = self.lock();
        let mut awaited: Option<Arc<Attempt>> = None;

        // Re-check under the lock: another caller may have finished or started
        // an attempt since the fast path looked.
        let attempt = loop {
            match slot.state {
                State::Initialized => return Ok(self.published()),
                State::Poisoned => return Err(self.poisoned(&slot)),
                State::Initializing { owner, attempt } => {
                    if owner == thread::current().id() {
                        drop(slot);
                        panic!(
                            "{}",
                            GuardError::Reentrant {
                                type_name: type_name::<T>()
                            }
                        );
                    }
                    if awaited.is_none() {
                        awaited = slot.in_flight.clone();
                    }
                    if let Some(previous) = awaited.as_ref().filter(|p| p.number != attempt) {
                        return Err(self.failure(previous));
                    }
                    slot = self.wait(slot, started, timeout)?;
                }
                State::Uninitialized => {
                    if let Some(previous) = &awaited {
                        return Err(self.failure(previous));
                    }
                    slot.attempts += 1;
                    let attempt = Arc::new(Attempt {
                        number: slot.attempts,
                        failure: OnceLock::new(),
                    });
                    slot.state = State::Initializing {
                        owner: thread::current().id(),
                        attempt: attempt.number,
                    };
                    slot.in_flight = Some(attempt.clone());
                    break attempt;
                }
            }
        };
        drop(slot);

        let number = attempt.number;
        debug!(type_name = type_name::<T>(), attempt = number, "initializing singleton");

        let completion = Completion {
            guard: self,
            attempt,
            settled: false,
        };
        match factory() {
            Ok(value) => {
                let value = self.value.get_or_init(|| value);
                completion.settle(None);
                debug!(type_name = type_name::<T>(), attempt = number, "singleton published");
                Ok(value)
            }
            Err(err) => {
                let source: FactoryError = Arc::new(err);
                completion.settle(Some(source.clone()));
                warn!(
                    type_name = type_name::<T>(),
                    attempt = number,
                    error = %source,
                    policy = ?self.policy,
                    "singleton construction failed"
                );
                Err(GuardError::ConstructionFailed {
                    type_name: type_name::<T>(),
                    attempt: number,
                    source,
                })
            }
        }
    }

    fn wait<'a>(
        &self,
        mut slot: MutexGuard<'a, Slot>,
        started: Instant,
        timeout: Option<Duration>,
    ) -> Result<MutexGuard<'a, Slot>, GuardError> {
        trace!(type_name = type_name::<T>(), "waiting for in-flight initialization");

        let remaining = match timeout {
            None => None,
            Some(timeout) => {
                let waited = started.elapsed();
                match timeout.checked_sub(waited).filter(|r| !r.is_zero()) {
                    Some(remaining) => Some(remaining),
                    None => {
                        warn!(
                            type_name = type_name::<T>(),
                            ?waited,
                            "gave up waiting for initialization"
                        );
                        return Err(GuardError::TimedOut {
                            type_name: type_name::<T>(),
                            waited,
                        });
                    }
                }
            }
        };

        slot.waiting += 1;
        let mut slot = match remaining {
            None => self.settled.wait(slot).unwrap_or_else(|p| p.into_inner()),
            Some(remaining) => {
                self.settled
                    .wait_timeout(slot, remaining)
                    .unwrap_or_else(|p| p.into_inner())
                    .0
            }
        };
        slot.waiting -= 1;
        Ok(slot)
    }

    fn finish(&self, attempt: &Attempt, failure: Option<FactoryError>) {
        let mut slot = self.lock();
        let next = match failure {
            None => State::Initialized,
            Some(source) => {
                // Set before the state changes, so every waiter of this attempt
                // finds it once it holds the lock again.
                let _ = attempt.failure.set(source.clone());
                match self.policy {
                    FailurePolicy::Retry => State::Uninitialized,
                    FailurePolicy::Poison => {
                        slot.poisoned_by = Some(source);
                        State::Poisoned
                    }
                }
            }
        };
        debug_assert!(matches!(
            slot.state,
            State::Initializing { attempt: current, .. } if current == attempt.number
        ));
        slot.state = next;
        slot.in_flight = None;
        drop(slot);
        self.settled.notify_all();
    }

    fn failure(&self, attempt: &Attempt) -> GuardError {
        let source = attempt
            .failure
            .get()
            .cloned()
            .unwrap_or_else(|| Arc::new(FactoryPanicked));
        GuardError::ConstructionFailed {
            type_name: type_name::<T>(),
            attempt: attempt.number,
            source,
        }
    }

    // Poisoning is terminal, so the poisoning attempt is always the last one.
    fn poisoned(&self, slot: &Slot) -> GuardError {
        GuardError::ConstructionFailed {
            type_name: type_name::<T>(),
            attempt: slot.attempts,
            source: slot
                .poisoned_by
                .clone()
                .unwrap_or_else(|| Arc::new(FactoryPanicked)),
        }
    }

    fn published(&self) -> &T {
        match self.value.get() {
            Some(value) => value,
            None => unreachable!("{} marked initialized before publication", type_name::<T>()),
        }
    }

    // The slot lock is never held while user code runs, so a poisoned lock
    // still holds consistent bookkeeping.
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Settles an attempt exactly once, including when the factory unwinds.
struct Completion<'a, T> {
    guard: &'a InitGuard<T>,
    attempt: Arc<Attempt>,
    settled: bool,
}

impl<T> Completion<'_, T> {
    fn settle(mut self, failure: Option<FactoryError>) {
        self.settled = true;
        self.guard.finish(&self.attempt, failure);
    }
}

impl<T> Drop for Completion<'_, T> {
    fn drop(&mut self) {
        if !self.settled {
            warn!(
                type_name = type_name::<T>(),
                attempt = self.attempt.number,
                "factory panicked during construction"
            );
            self.guard.finish(&self.attempt, Some(Arc::new(FactoryPanicked)));
        }
    }
}

impl<T> Default for InitGuard<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for InitGuard<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.lock();
        f.debug_struct("InitGuard")
            .field("state", &slot.state)
            .field("attempts", &slot.attempts)
            .field("policy", &self.policy)
            .field("value", &self.value.get())
            .finish()
    }
}

// -------------------------------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------------------------------
