//! Events and the internal Entry/Exit/Init signals.
//!
//! An [`Event`] is the only thing a state machine's queue ever carries.
//! Its name is fixed at construction time; [`Event::try_rename`] exists
//! solely to give the immutability invariant (testable property #6 in the
//! spec) a runtime witness, since Rust's ownership rules already make
//! accidental mutation a compile error for any code outside this module.

use std::any::Any;
use std::sync::Arc;

use crate::error::ImmutableError;

/// Rewrite `CamelCase`/`PascalCase` into `snake_case`, inserting an
/// underscore before each interior uppercase letter. Explicit string names
/// passed to [`Event::named`] bypass this entirely and are used verbatim.
///
/// Idempotent: `canonicalize(&canonicalize(s)) == canonicalize(s)`, since
/// the output never contains an uppercase letter for the second pass to act
/// on.
pub fn canonicalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let chars: Vec<char> = name.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && i != 0 {
            let prev_lower_or_digit = chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit();
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev_lower_or_digit || next_lower {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// Derive the canonical event name from a Rust type's short (unqualified)
/// name, e.g. `my_crate::MySpecialEvent` -> `"my_special_event"`.
pub fn name_of<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let short = full.rsplit("::").next().unwrap_or(full);
    canonicalize(short)
}

/// A message dispatched to a state machine's current state.
///
/// Immutable after construction: the name and payload are fixed by
/// [`Event::named`]/[`Event::with_payload`] and never change afterwards.
#[derive(Clone)]
pub struct Event {
    name: String,
    payload: Option<Arc<dyn Any + Send + Sync>>,
}

impl Event {
    /// Construct an event with an explicit, verbatim name.
    pub fn named(name: impl Into<String>) -> Self {
        Event {
            name: name.into(),
            payload: None,
        }
    }

    /// Construct an event whose name is canonicalized from `T`'s type name,
    /// carrying `payload`.
    pub fn with_payload<T: Send + Sync + 'static>(payload: T) -> Self {
        Event {
            name: name_of::<T>(),
            payload: Some(Arc::new(payload)),
        }
    }

    /// Construct a named event carrying an arbitrary payload.
    pub fn named_with_payload<T: Send + Sync + 'static>(
        name: impl Into<String>,
        payload: T,
    ) -> Self {
        Event {
            name: name.into(),
            payload: Some(Arc::new(payload)),
        }
    }

    /// The event's canonical name, matched against state handlers.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Borrow the payload as `T`, if one was attached and it is of that type.
    pub fn payload<T: 'static>(&self) -> Option<&T> {
        self.payload.as_ref().and_then(|p| p.downcast_ref::<T>())
    }

    /// Always fails: events are immutable after construction. Exists to give
    /// the "attempted reassignment is an error" invariant a callable, testable
    /// shape instead of relying solely on the absence of a setter.
    pub fn try_rename(&mut self, _name: impl Into<String>) -> Result<(), ImmutableError> {
        Err(ImmutableError(self.name.clone()))
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event").field("name", &self.name).finish()
    }
}

/// The three internal pseudo-events synthesized by the dispatcher. Never
/// observable at the external queue boundary and never carry a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Entry,
    Exit,
    Init,
}

impl Signal {
    pub fn name(&self) -> &'static str {
        match self {
            Signal::Entry => "entry",
            Signal::Exit => "exit",
            Signal::Init => "init",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_camel_case() {
        assert_eq!(canonicalize("MySpecialEvent"), "my_special_event");
        assert_eq!(canonicalize("a"), "a");
        assert_eq!(canonicalize("ABCFoo"), "abc_foo");
    }

    #[test]
    fn canonicalize_is_idempotent() {
        for s in ["MySpecialEvent", "already_snake", "ABCFoo", "X"] {
            let once = canonicalize(s);
            let twice = canonicalize(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn explicit_names_are_used_verbatim() {
        let e = Event::named("MixedCase");
        assert_eq!(e.name(), "MixedCase");
    }

    #[test]
    fn events_are_immutable() {
        let mut e = Event::named("a");
        assert!(e.try_rename("b").is_err());
        assert_eq!(e.name(), "a");
    }

    #[test]
    fn payload_roundtrip() {
        let e = Event::named_with_payload("tick", 42u32);
        assert_eq!(e.payload::<u32>(), Some(&42));
        assert_eq!(e.payload::<String>(), None);
    }
}
