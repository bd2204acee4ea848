//! The `StateBehavior` trait user code implements, and the `Action` context
//! handed to every call into it.
//!
//! `Response::Super` plays the role the original gave to an `AttributeError`
//! raised by a missing `on_<event>` method: returning it from `handle` is
//! the complete "I don't handle this, try my parent" signal (design note
//! §9 — "explicit 'handler exists' predicate... becomes a clean two-level
//! lookup").

use crate::event::{Event, Signal};
use crate::resource::ResourceManager;
use crate::response::Response;
use crate::timer::PostHandle;

/// Which resource manager a timer (or other resource) should be registered
/// on: the currently executing state's, or the owning machine's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    State,
    Machine,
}

/// One state in the hierarchy. Implement `handle` for ordinary events,
/// and/or `on_entry`/`on_exit`/`on_init` for the pseudo-signals.
///
/// All methods default to the original's defaults: `handle` defaults to
/// `Response::Super` (equivalent to `on_unhandled_event`'s bubble-up), and
/// `on_entry`/`on_exit`/`on_init` default to no-ops.
pub trait StateBehavior<C>: Send {
    /// Handle an external event. Return `Response::Super` to bubble the
    /// event up to this state's registered parent.
    #[allow(unused_variables)]
    fn handle(&mut self, action: &mut Action<'_, C>, event: &Event) -> Response {
        Response::Super
    }

    /// Called when this state is entered, root-to-destination order.
    #[allow(unused_variables)]
    fn on_entry(&mut self, action: &mut Action<'_, C>) {}

    /// Called when this state is exited, source-to-root order.
    #[allow(unused_variables)]
    fn on_exit(&mut self, action: &mut Action<'_, C>) {}

    /// Called immediately after entry completes for the innermost entered
    /// state. Returning `Some(name)` requests a further transition.
    #[allow(unused_variables)]
    fn on_init(&mut self, action: &mut Action<'_, C>) -> Option<String> {
        None
    }
}

/// Dispatch a `Signal` (as opposed to an external `Event`) to a behavior.
pub(crate) fn dispatch_signal<C>(
    behavior: &mut dyn StateBehavior<C>,
    action: &mut Action<'_, C>,
    signal: Signal,
) -> Option<String> {
    match signal {
        Signal::Entry => {
            behavior.on_entry(action);
            None
        }
        Signal::Exit => {
            behavior.on_exit(action);
            None
        }
        Signal::Init => behavior.on_init(action),
    }
}

/// The per-call context handed to every `StateBehavior<C>` method: the
/// user's shared context `C`, a handle back into the owning machine's
/// queue (for `send_to`/timers), and access to the resource manager of
/// either the currently-executing state or the machine, per [`Scope`].
///
/// This is the crate's answer to the original's thread-local
/// `current_sm()` lookup: an explicit parameter rather than ambient state,
/// as recommended in the design notes for exactly this situation.
pub struct Action<'a, C> {
    pub(crate) data: &'a mut C,
    pub(crate) machine_name: &'a str,
    pub(crate) post_handle: PostHandle,
    pub(crate) state_resources: &'a mut ResourceManager,
    pub(crate) machine_resources: &'a mut ResourceManager,
}

impl<'a, C> Action<'a, C> {
    /// The user's shared context.
    pub fn data(&mut self) -> &mut C {
        self.data
    }

    /// The name of the owning machine, for log messages and introspection.
    pub fn machine_name(&self) -> &str {
        self.machine_name
    }

    /// A cheap, `Clone + Send` handle that can post events back onto the
    /// owning machine's queue, independent of `C`. What `After`/`Every`
    /// capture in order to deliver their event without holding a reference
    /// to the machine itself.
    pub fn post_handle(&self) -> PostHandle {
        self.post_handle.clone()
    }

    /// The resource manager designated by `scope`.
    pub fn resources(&mut self, scope: Scope) -> &mut ResourceManager {
        match scope {
            Scope::State => self.state_resources,
            Scope::Machine => self.machine_resources,
        }
    }
}
