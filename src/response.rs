//! The value returned by a state's event and init handlers.
//!
//! Shaped after `statig`'s `Response<T>` (`Handled`/`Super`/`Transition`):
//! this crate's states are looked up dynamically by name rather than known
//! as an enum at compile time, so `Transition` carries a `String` state name
//! instead of a typed variant.

/// Outcome of handling an event (or pseudo-signal) in one state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// The event was handled; no transition.
    Handled,
    /// This state does not handle the event; bubble up to the parent.
    Super,
    /// Transition to the named state.
    Transition(String),
}

impl Response {
    /// Shorthand for `Response::Transition(name.into())`.
    pub fn transition(name: impl Into<String>) -> Self {
        Response::Transition(name.into())
    }
}
