//! Error taxonomy for the runtime.
//!
//! Mirrors the kinds called out by the spec: configuration errors are
//! surfaced at build time, dispatch errors during event handling, capacity
//! errors at the `send` call site, and immutability violations when someone
//! tries to mutate an already-constructed [`crate::event::Event`].

use thiserror::Error;

/// Errors raised while assembling a [`crate::machine::MachineBuilder`].
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("machine has no registered states")]
    NoStates,
    #[error("explicit initial state {0:?} is not a registered state")]
    UnregisteredInitialState(String),
    #[error("resource {0:?} is already registered on this manager")]
    DuplicateResource(String),
    #[error("state {0:?} is already registered")]
    DuplicateState(String),
    #[error("state {state:?} names parent {parent:?}, which is not registered")]
    DanglingParent { state: String, parent: String },
    #[error("state hierarchy contains a cycle through {0:?}")]
    CyclicHierarchy(String),
    #[error("path manager has already been built")]
    AlreadyBuilt,
    #[error("a machine named {0:?} is already registered")]
    DuplicateMachine(String),
}

/// Errors raised while dispatching an event or pseudo-signal.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum DispatchError {
    #[error("handler returned unregistered target state {0:?}")]
    UnknownState(String),
}

/// Errors raised by the bounded event queue.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum CapacityError {
    #[error("event queue is full")]
    QueueFull,
    #[error("machine worker has terminated; queue is disconnected")]
    Disconnected,
}

/// Raised when code attempts to reassign a field on an already-constructed
/// [`crate::event::Event`].
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("event {0:?} is immutable after construction")]
pub struct ImmutableError(pub String);

/// Raised by a [`crate::resource::Resource`]'s `release()` when teardown
/// fails. Collected rather than propagated immediately, so one resource's
/// failure never prevents the rest of a [`crate::resource::ResourceManager`]
/// from releasing.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("resource {name:?} failed to release: {message}")]
pub struct ResourceError {
    pub name: String,
    pub message: String,
}
