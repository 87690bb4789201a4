//! A process-wide registry of lazily constructed singletons, one per type.
//!
//! Each type gets its own [`InitGuard`], created the first time anyone asks for
//! that type. Creating the guard is itself an exactly-once step: concurrent first
//! requests for a type converge on the same guard, and only then does the guard
//! decide who runs the factory.
//!
//! # Examples
//!
//! ```
//! use singleton_guard::SingletonRegistry;
//!
//! struct Pool {
//!     size: usize,
//! }
//!
//! let registry = SingletonRegistry::new();
//!
//! let pool = registry.instance_of(|| Pool { size: 8 });
//! let again = registry.instance_of(|| Pool { size: 99 });
//!
//! assert!(std::ptr::eq(pool, again));
//! assert_eq!(again.size, 8);
//! ```

use std::{
    any::{type_name, Any, TypeId},
    collections::HashMap,
    convert::Infallible,
    error::Error,
    fmt,
    sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use tracing::debug;

use crate::{FailurePolicy, GuardError, InitGuard, RegistryEvent};

/// Type alias for the user-supplied tracing callback.
///
/// The callback receives a reference to a `RegistryEvent` every time the registry is
/// interacted with. It must be thread-safe because the registry itself is shared.
pub type TraceCallback = dyn Fn(&RegistryEvent) + Send + Sync + 'static;

/// Guards are leaked on creation so that handed-out references are `'static`;
/// the map only ever grows.
type GuardMap = HashMap<TypeId, &'static (dyn Any + Send + Sync)>;

/// Maps each singleton type to the guard that constructs it.
///
/// A registry is meant to live as long as the process, usually in a `static`
/// (see [`define_registry!`](crate::define_registry)). Guards it creates are never
/// freed, even if the registry itself is dropped.
pub struct SingletonRegistry {
    guards: RwLock<GuardMap>,
    trace: Mutex<Option<Arc<TraceCallback>>>,
    policy: FailurePolicy,
}

impl SingletonRegistry {
    /// Creates an empty registry whose guards use [`FailurePolicy::Retry`].
    ///
    /// Guards are leaked so lookups can hand out `&'static T`. A registry that is
    /// not itself `static` still leaks one guard per type it has seen when it is
    /// dropped.
    pub fn new() -> Self {
        Self::with_policy(FailurePolicy::Retry)
    }

    /// Creates an empty registry; every guard it creates uses `policy`.
    ///
    /// Leaks its guards like [`new`](Self::new).
    pub fn with_policy(policy: FailurePolicy) -> Self {
        Self {
            guards: RwLock::new(HashMap::new()),
            trace: Mutex::new(None),
            policy,
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    // ---------------------------------------------------------------------------------------------
    // Tracing
    // ---------------------------------------------------------------------------------------------

    /// Sets a tracing callback that will be invoked on every registry interaction.
    ///
    /// The callback runs without any registry lock held, so it may call back into
    /// the registry. A registry call made from the callback emits its own event.
    ///
    /// # Example
    /// ```rust
    /// use singleton_guard::{RegistryEvent, SingletonRegistry};
    ///
    /// let registry = SingletonRegistry::new();
    /// registry.set_trace_callback(|event| println!("[registry-trace] {event}"));
    /// ```
    pub fn set_trace_callback(&self, callback: impl Fn(&RegistryEvent) + Send + Sync + 'static) {
        let mut guard = self.trace.lock().unwrap_or_else(|p| p.into_inner());
        *guard = Some(Arc::new(callback));
    }

    /// Clears the tracing callback (disables registry tracing).
    pub fn clear_trace_callback(&self) {
        let mut guard = self.trace.lock().unwrap_or_else(|p| p.into_inner());
        *guard = None;
    }

    fn emit_event(&self, event: &RegistryEvent) {
        let callback = self
            .trace
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        if let Some(callback) = callback {
            callback(event);
        }
    }

    // ---------------------------------------------------------------------------------------------
    // Registry
    // ---------------------------------------------------------------------------------------------

    /// Returns the guard for `T`, creating it if this is the first request.
    ///
    /// Concurrent first requests all receive the same guard.
    pub fn guard<T: Send + Sync + 'static>(&self) -> &'static InitGuard<T> {
        if let Some(guard) = self.existing::<T>() {
            return guard;
        }

        let mut created = false;
        let entry = *self
            .write()
            .entry(TypeId::of::<T>())
            .or_insert_with(|| {
                created = true;
                let guard: &'static (dyn Any + Send + Sync) =
                    Box::leak(Box::new(InitGuard::<T>::with_policy(self.policy)));
                guard
            });

        if created {
            debug!(type_name = type_name::<T>(), policy = ?self.policy, "created singleton guard");
            self.emit_event(&RegistryEvent::GuardCreated {
                type_name: type_name::<T>(),
            });
        }

        downcast(entry)
    }

    /// Returns the singleton for `T`, constructing it with `factory` if needed.
    ///
    /// # Panics
    ///
    /// Under the same conditions as [`InitGuard::get_or_init`].
    pub fn instance_of<T, F>(&self, factory: F) -> &'static T
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        match self.try_instance_of(|| Ok::<T, Infallible>(factory())) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    /// Returns the singleton for `T`, constructing it with the fallible `factory`
    /// if needed.
    ///
    /// # Errors
    ///
    /// As for [`InitGuard::get_or_try_init`].
    pub fn try_instance_of<T, E, F>(&self, factory: F) -> Result<&'static T, GuardError>
    where
        T: Send + Sync + 'static,
        E: Error + Send + Sync + 'static,
        F: FnOnce() -> Result<T, E>,
    {
        let result = self.guard::<T>().get_or_try_init(factory);
        self.emit_event(&RegistryEvent::InstanceOf {
            type_name: type_name::<T>(),
            ok: result.is_ok(),
        });
        result
    }

    /// Like [`try_instance_of`](Self::try_instance_of), but waits at most
    /// `timeout` for another caller's attempt.
    ///
    /// # Errors
    ///
    /// As for [`InitGuard::get_or_try_init_timeout`].
    pub fn try_instance_of_timeout<T, E, F>(
        &self,
        factory: F,
        timeout: Duration,
    ) -> Result<&'static T, GuardError>
    where
        T: Send + Sync + 'static,
        E: Error + Send + Sync + 'static,
        F: FnOnce() -> Result<T, E>,
    {
        let result = self
            .guard::<T>()
            .get_or_try_init_timeout(factory, timeout);
        self.emit_event(&RegistryEvent::InstanceOf {
            type_name: type_name::<T>(),
            ok: result.is_ok(),
        });
        result
    }

    /// Returns the singleton for `T` if it has been published. Never constructs.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&'static T> {
        let value = self.existing::<T>().and_then(InitGuard::get);
        self.emit_event(&RegistryEvent::Get {
            type_name: type_name::<T>(),
            found: value.is_some(),
        });
        value
    }

    /// Checks whether a singleton for `T` has been published.
    ///
    /// A guard whose construction is still in flight, or has failed, does not count.
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        let found = self
            .existing::<T>()
            .is_some_and(InitGuard::is_initialized);
        self.emit_event(&RegistryEvent::Contains {
            type_name: type_name::<T>(),
            found,
        });
        found
    }

    /// Number of types that have a guard, published or not.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn existing<T: Send + Sync + 'static>(&self) -> Option<&'static InitGuard<T>> {
        let entry = self.read().get(&TypeId::of::<T>()).copied();
        entry.map(downcast)
    }

    // Map updates never run user code, so a poisoned lock still holds a
    // consistent map.
    fn read(&self) -> RwLockReadGuard<'_, GuardMap> {
        self.guards.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, GuardMap> {
        self.guards.write().unwrap_or_else(|p| p.into_inner())
    }
}

fn downcast<T: Send + Sync + 'static>(
    entry: &'static (dyn Any + Send + Sync),
) -> &'static InitGuard<T> {
    match entry.downcast_ref::<InitGuard<T>>() {
        Some(guard) => guard,
        None => unreachable!("registry entry for {} holds another type", type_name::<T>()),
    }
}

impl Default for SingletonRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SingletonRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingletonRegistry")
            .field("guards", &self.len())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

// -------------------------------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------------------------------
