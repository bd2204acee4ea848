//! A hierarchical state machine runtime: nested states, entry/exit/init
//! pseudo-events, timers, and scoped resource cleanup, each machine running
//! on its own worker thread behind a bounded event queue.
//!
//! ```ignore
//! use hsmkit::event::Event;
//! use hsmkit::machine::MachineBuilder;
//! use hsmkit::response::Response;
//! use hsmkit::state::{Action, StateBehavior};
//!
//! struct Idle;
//! impl StateBehavior<()> for Idle {
//!     fn handle(&mut self, _action: &mut Action<'_, ()>, event: &Event) -> Response {
//!         match event.name() {
//!             "go" => Response::transition("Running"),
//!             _ => Response::Super,
//!         }
//!     }
//! }
//!
//! struct Running;
//! impl StateBehavior<()> for Running {}
//!
//! let handle = MachineBuilder::new("example", ())
//!     .state("Idle", None, Idle)
//!     .state("Running", None, Running)
//!     .build()
//!     .unwrap();
//! handle.send(Event::named("go")).unwrap();
//! ```
//!
//! # Module map
//!
//! - [`event`] — the [`event::Event`] type and the internal Entry/Exit/Init
//!   [`event::Signal`]s.
//! - [`state`] — the [`state::StateBehavior`] trait and its [`state::Action`]
//!   context.
//! - [`response`] — [`response::Response`], what a handler returns.
//! - [`path`] — hierarchy bookkeeping and transition planning.
//! - [`resource`] — scoped, releasable resources.
//! - [`timer`] — `After`/`Every` timers, built on [`resource`].
//! - [`machine`] — [`machine::MachineBuilder`] and [`machine::MachineHandle`].
//! - [`registry`] — process-wide lookup of running machines by name.
//! - [`error`] — the error taxonomy returned by the above.

pub mod error;
pub mod event;
pub mod machine;
pub mod path;
pub mod registry;
pub mod resource;
pub mod response;
pub mod state;
pub mod timer;

pub use error::{CapacityError, ConfigError, DispatchError, ImmutableError};
pub use event::Event;
pub use machine::{MachineBuilder, MachineHandle};
pub use response::Response;
pub use state::{Action, Scope, StateBehavior};
