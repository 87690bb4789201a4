//! # Singleton Guard
//!
//! Exactly-once lazy initialization for shared, per-type instances.
//!
//! Many callers may race to obtain the first instance of a shared object. This
//! crate guarantees that the construction step runs once, that every caller
//! sees the same fully constructed value, and that a failed construction does
//! not wedge later callers.
//!
//! ## Quick Start
//!
//! ```rust
//! use singleton_guard::instance_of;
//!
//! struct Config {
//!     name: String,
//! }
//!
//! let config = instance_of(|| Config { name: "app".to_string() });
//! let same = instance_of(|| Config { name: "ignored".to_string() });
//!
//! assert!(std::ptr::eq(config, same));
//! assert_eq!(same.name, "app");
//! ```
//!
//! ## Building Blocks
//!
//! - [`InitGuard`] - one lazily constructed value; works in a `static`
//! - [`SingletonRegistry`] - one `InitGuard` per type, created on first request
//! - [`define_registry!`] - declare an isolated static registry with free functions
//! - [`FailurePolicy`] - retry after a failed construction, or stay poisoned
//!
//! ## Main Functions
//!
//! The crate root re-exports the functions of a default process-wide registry:
//!
//! - [`instance_of`] - Return the singleton for a type, constructing it if needed
//! - [`try_instance_of`] - Same, with a fallible factory
//! - [`try_instance_of_timeout`] - Same, bounding the wait on another caller
//! - [`get`] - Return a published singleton without constructing
//! - [`contains`] - Check if a type has a published singleton
//! - [`set_trace_callback`] - Set up tracing for registry operations

#[macro_use]
mod macros;

mod guard;
mod guard_error;
mod registry;
mod registry_event;

pub use guard::{FailurePolicy, InitGuard};
pub use guard_error::{FactoryError, GuardError};
pub use registry::{SingletonRegistry, TraceCallback};
pub use registry_event::RegistryEvent;

define_registry!(global);

// Re-export the default registry's API
pub use global::{
    clear_trace_callback, contains, get, instance_of, set_trace_callback, try_instance_of,
    try_instance_of_timeout,
};
