//! Process-wide directory of running machines, keyed by name.
//!
//! Grounded on the original's module-level `_machines` dict (`pyeds/fsm.py`)
//! that backed `send_to(name, event)` so one machine could address another
//! without holding a direct reference. The Rust port swaps the bare dict for
//! a `Mutex` behind a `OnceLock`, since there is no interpreter-wide GIL to
//! lean on for the implicit synchronization the original got for free.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use crate::error::{CapacityError, ConfigError};
use crate::event::Event;
use crate::machine::MachineHandle;

fn directory() -> &'static Mutex<HashMap<String, MachineHandle>> {
    static DIRECTORY: OnceLock<Mutex<HashMap<String, MachineHandle>>> = OnceLock::new();
    DIRECTORY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Register `handle` under `name`. Called automatically by
/// [`crate::machine::MachineBuilder::build`] unless
/// [`crate::machine::MachineBuilder::without_registry`] was used.
pub(crate) fn register(name: String, handle: MachineHandle) -> Result<(), ConfigError> {
    let mut dir = directory().lock().unwrap();
    if dir.contains_key(&name) {
        return Err(ConfigError::DuplicateMachine(name));
    }
    dir.insert(name, handle);
    Ok(())
}

/// Remove `name` from the directory. Called automatically when a
/// registered machine's worker thread terminates.
pub(crate) fn unregister(name: &str) {
    directory().lock().unwrap().remove(name);
}

/// Look up a running machine's handle by name.
pub fn lookup(name: &str) -> Option<MachineHandle> {
    directory().lock().unwrap().get(name).cloned()
}

/// Post `event` to the machine registered as `name`, blocking if its queue
/// is full. The crate's equivalent of the original's `send_to`.
pub fn send_to(name: &str, event: Event) -> Result<(), CapacityError> {
    match lookup(name) {
        Some(handle) => handle.send(event),
        None => {
            log::warn!("send_to: no machine named {name:?} is registered");
            Err(CapacityError::Disconnected)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::MachineBuilder;
    use crate::response::Response;
    use crate::state::{Action, StateBehavior};
    use std::time::Duration;

    struct Idle;
    impl StateBehavior<()> for Idle {
        fn handle(&mut self, _action: &mut Action<'_, ()>, event: &Event) -> Response {
            if event.name() == "ping" {
                Response::Handled
            } else {
                Response::Super
            }
        }
    }

    #[test]
    fn lookup_finds_registered_machine_and_send_to_reaches_it() {
        let handle = MachineBuilder::new("registry-test-alpha", ())
            .state("Idle", None, Idle)
            .build()
            .unwrap();

        assert!(lookup("registry-test-alpha").is_some());
        send_to("registry-test-alpha", Event::named("ping")).unwrap();

        handle.do_terminate(None).unwrap();
        handle.wait(Some(Duration::from_secs(5)));
        assert!(lookup("registry-test-alpha").is_none());
    }

    #[test]
    fn send_to_unknown_machine_reports_disconnected() {
        let err = send_to("registry-test-does-not-exist", Event::named("ping")).unwrap_err();
        assert_eq!(err, CapacityError::Disconnected);
    }
}
