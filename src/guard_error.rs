use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

/// Shared handle to the error a factory produced.
///
/// Every caller of a failed attempt receives a clone of the same source.
pub type FactoryError = Arc<dyn Error + Send + Sync + 'static>;

/// Errors reported by [`InitGuard`](crate::InitGuard) and the registry.
///
/// Fallible calls only ever return `ConstructionFailed` or `TimedOut`.
/// `Reentrant` names a programming error: it is the message of the panic raised
/// when a factory re-enters its own guard, and no call returns it, so there is
/// nothing to match on.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GuardError {
    /// The factory returned an error or panicked.
    ///
    /// Reported to the caller that ran the factory and to every caller that was
    /// blocked on the same attempt. Under [`FailurePolicy::Poison`](crate::FailurePolicy::Poison)
    /// it is also reported to every later caller.
    #[error("construction of {type_name} failed on attempt {attempt}: {source}")]
    ConstructionFailed {
        type_name: &'static str,
        attempt: u64,
        #[source]
        source: FactoryError,
    },

    /// A factory called back into the guard it is constructing.
    ///
    /// Never returned; the guard panics with this message instead of deadlocking.
    /// Use it to recognize the panic message, e.g. in a panic hook.
    #[error("reentrant initialization of {type_name}: the factory re-entered its own guard")]
    Reentrant { type_name: &'static str },

    /// The caller gave up waiting for another caller's attempt to settle.
    #[error("timed out after {waited:?} waiting for {type_name} to be initialized")]
    TimedOut {
        type_name: &'static str,
        waited: Duration,
    },
}

impl GuardError {
    /// Name of the singleton type the error is about.
    pub fn type_name(&self) -> &'static str {
        match self {
            GuardError::ConstructionFailed { type_name, .. }
            | GuardError::Reentrant { type_name }
            | GuardError::TimedOut { type_name, .. } => type_name,
        }
    }
}

/// Source used when a factory unwinds instead of returning.
#[derive(Debug, thiserror::Error)]
#[error("factory panicked during construction")]
pub(crate) struct FactoryPanicked;
