//! Macros for declaring singleton registries.
//!
//! This module provides a macro-based approach to create isolated,
//! thread-safe singleton registries that live in a `static`.

/// Declares a module holding a static [`SingletonRegistry`](crate::SingletonRegistry)
/// and free functions that delegate to it.
///
/// The macro generates a module containing:
/// - The registry static (hidden), created on first use
/// - `registry()` for direct access to the registry
/// - `instance_of`, `try_instance_of`, `try_instance_of_timeout`, `get`,
///   `contains`, `set_trace_callback` and `clear_trace_callback`
///
/// # Examples
///
/// ```rust
/// use singleton_guard::define_registry;
///
/// struct Database {
///     url: String,
/// }
///
/// define_registry!(services);
///
/// let db = services::instance_of(|| Database {
///     url: "postgresql://localhost".to_string(),
/// });
///
/// // Later requests never run their factory.
/// let again = services::instance_of(|| -> Database { unreachable!() });
///
/// assert!(std::ptr::eq(db, again));
/// assert_eq!(again.url, "postgresql://localhost");
/// ```
///
/// # Failure Policy
///
/// A second argument names the [`FailurePolicy`](crate::FailurePolicy) variant used by
/// every guard in the registry:
///
/// ```rust
/// use singleton_guard::{define_registry, FailurePolicy};
///
/// define_registry!(strict, Poison);
///
/// assert_eq!(strict::registry().policy(), FailurePolicy::Poison);
/// ```
///
/// # Multiple Registries
///
/// Each declared registry is isolated; the same type gets one instance per registry:
///
/// ```rust
/// use singleton_guard::define_registry;
///
/// define_registry!(primary);
/// define_registry!(replica);
///
/// primary::instance_of(|| "primary".to_string());
/// replica::instance_of(|| "replica".to_string());
///
/// assert_eq!(primary::get::<String>().map(String::as_str), Some("primary"));
/// assert_eq!(replica::get::<String>().map(String::as_str), Some("replica"));
/// ```
#[macro_export]
macro_rules! define_registry {
    ($name:ident) => {
        $crate::define_registry!($name, Retry);
    };
    ($name:ident, $policy:ident) => {
        pub mod $name {
            #![allow(dead_code)]

            use std::sync::LazyLock;
            use std::time::Duration;

            // Registry storage (module-private)
            static REGISTRY: LazyLock<$crate::SingletonRegistry> =
                LazyLock::new(|| {
                    $crate::SingletonRegistry::with_policy($crate::FailurePolicy::$policy)
                });

            /// The registry behind this module's functions.
            pub fn registry() -> &'static $crate::SingletonRegistry {
                &REGISTRY
            }

            /// Return the singleton for `T`, constructing it with `factory` if needed.
            pub fn instance_of<T, F>(factory: F) -> &'static T
            where
                T: Send + Sync + 'static,
                F: FnOnce() -> T,
            {
                REGISTRY.instance_of(factory)
            }

            /// Return the singleton for `T`, constructing it with a fallible `factory` if needed.
            pub fn try_instance_of<T, E, F>(factory: F) -> Result<&'static T, $crate::GuardError>
            where
                T: Send + Sync + 'static,
                E: std::error::Error + Send + Sync + 'static,
                F: FnOnce() -> Result<T, E>,
            {
                REGISTRY.try_instance_of(factory)
            }

            /// Like `try_instance_of`, waiting at most `timeout` on another caller.
            pub fn try_instance_of_timeout<T, E, F>(
                factory: F,
                timeout: Duration,
            ) -> Result<&'static T, $crate::GuardError>
            where
                T: Send + Sync + 'static,
                E: std::error::Error + Send + Sync + 'static,
                F: FnOnce() -> Result<T, E>,
            {
                REGISTRY.try_instance_of_timeout(factory, timeout)
            }

            /// Return the published singleton for `T`, if any.
            pub fn get<T: Send + Sync + 'static>() -> Option<&'static T> {
                REGISTRY.get()
            }

            /// Check whether a singleton for `T` has been published.
            pub fn contains<T: Send + Sync + 'static>() -> bool {
                REGISTRY.contains::<T>()
            }

            /// Set a tracing callback for registry operations.
            pub fn set_trace_callback(
                callback: impl Fn(&$crate::RegistryEvent) + Send + Sync + 'static,
            ) {
                REGISTRY.set_trace_callback(callback)
            }

            /// Clear the tracing callback.
            pub fn clear_trace_callback() {
                REGISTRY.clear_trace_callback()
            }
        }
    };
}
