/// Events emitted by a [`SingletonRegistry`](crate::SingletonRegistry).
///
/// These events are passed to the tracing callback set via `set_trace_callback`.
/// The `Clone` derive allows callbacks to store or forward events if needed.
///
/// # Examples
///
/// ```rust
/// use singleton_guard::RegistryEvent;
///
/// let event = RegistryEvent::GuardCreated { type_name: "i32" };
/// assert_eq!(event.to_string(), "guard_created { type_name: i32 }");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// The first request for a type created its guard.
    GuardCreated {
        /// The type name of the singleton (e.g., "i32", "alloc::string::String")
        type_name: &'static str,
    },

    /// An instance was requested with a factory.
    InstanceOf {
        type_name: &'static str,
        /// Whether the caller came back with a value
        ok: bool,
    },

    /// A published instance was looked up without a factory.
    Get {
        type_name: &'static str,
        /// Whether the instance had been published
        found: bool,
    },

    /// A publication check was performed.
    Contains { type_name: &'static str, found: bool },
}

impl RegistryEvent {
    pub fn type_name(&self) -> &'static str {
        match self {
            RegistryEvent::GuardCreated { type_name }
            | RegistryEvent::InstanceOf { type_name, .. }
            | RegistryEvent::Get { type_name, .. }
            | RegistryEvent::Contains { type_name, .. } => type_name,
        }
    }
}

impl std::fmt::Display for RegistryEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryEvent::GuardCreated { type_name } => {
                write!(f, "guard_created {{ type_name: {} }}", type_name)
            }
            RegistryEvent::InstanceOf { type_name, ok } => {
                write!(f, "instance_of {{ type_name: {}, ok: {} }}", type_name, ok)
            }
            RegistryEvent::Get { type_name, found } => {
                write!(f, "get {{ type_name: {}, found: {} }}", type_name, found)
            }
            RegistryEvent::Contains { type_name, found } => {
                write!(
                    f,
                    "contains {{ type_name: {}, found: {} }}",
                    type_name, found
                )
            }
        }
    }
}
