//! `After` (one-shot) and `Every` (periodic) timers.
//!
//! Grounded on the original `After`/`Every` (`pyeds/fsm.py`): construction
//! arms a background timer immediately and registers the timer as a
//! resource on either the current state or the current machine; firing
//! synthesizes a fresh `Event` by name and posts it back onto the owning
//! machine, never holding on to a long-lived `Event` instance. Where the
//! original discovers its owning machine through a thread-local
//! (`current_sm()`), this port takes an explicit [`crate::state::Action`]
//! parameter instead (design notes §9), since thread-local lookup does not
//! generalize across the generic `Machine<C>` context type.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::{CapacityError, ResourceError};
use crate::event::Event;
use crate::machine::Envelope;
use crate::resource::Resource;
use crate::state::{Action, Scope};

/// A cheap, `Clone + Send` capability to post an [`Event`] onto one
/// specific machine's queue, independent of that machine's context type.
/// What timers capture instead of a reference to the machine itself.
#[derive(Clone)]
pub struct PostHandle {
    sender: crossbeam_channel::Sender<Envelope>,
    machine_name: Arc<str>,
}

impl PostHandle {
    pub(crate) fn new(sender: crossbeam_channel::Sender<Envelope>, machine_name: Arc<str>) -> Self {
        PostHandle {
            sender,
            machine_name,
        }
    }

    /// Non-blocking post. Used by timers: if the queue is full the caller
    /// is expected to log and drop, never block a timer thread forever.
    pub fn try_post(&self, event: Event) -> Result<(), CapacityError> {
        self.sender
            .try_send(Envelope::Event(event))
            .map_err(|err| match err {
                crossbeam_channel::TrySendError::Full(_) => CapacityError::QueueFull,
                crossbeam_channel::TrySendError::Disconnected(_) => CapacityError::Disconnected,
            })
    }

    pub fn machine_name(&self) -> &str {
        &self.machine_name
    }
}

/// A handle to cancel an armed timer early, independent of the
/// [`crate::resource::ResourceManager`] that owns its release-on-exit.
#[derive(Clone)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
}

impl TimerHandle {
    /// Cancel the timer. Idempotent; safe after the timer has already
    /// fired.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

fn fire_once(post_handle: &PostHandle, event_name: &str, cancelled: &AtomicBool) {
    if cancelled.load(Ordering::SeqCst) {
        return;
    }
    if let Err(err) = post_handle.try_post(Event::named(event_name)) {
        log::error!(
            "{}: timer event {:?} dropped: {}",
            post_handle.machine_name(),
            event_name,
            err
        );
    }
}

/// A one-shot timer: fires `event_name` on the owning machine once, after
/// `delay`, then its background thread exits.
pub struct After {
    name: String,
    cancelled: Arc<AtomicBool>,
}

impl After {
    /// Arm a one-shot timer and register it on the resource manager
    /// designated by `scope`. Returns a [`TimerHandle`] the caller may use
    /// to cancel it early; the resource manager also releases it (which
    /// cancels it) when its owning scope exits or the machine terminates.
    pub fn arm<C>(
        action: &mut Action<'_, C>,
        delay: Duration,
        event_name: impl Into<String>,
        scope: Scope,
    ) -> TimerHandle {
        let event_name = event_name.into();
        let name = format!("After.{event_name}.{}", delay.as_secs_f64());
        let cancelled = Arc::new(AtomicBool::new(false));
        let handle = TimerHandle {
            cancelled: cancelled.clone(),
        };

        let post_handle = action.post_handle();
        let thread_cancelled = cancelled.clone();
        let thread_event_name = event_name.clone();
        thread::spawn(move || {
            thread::sleep(delay);
            fire_once(&post_handle, &thread_event_name, &thread_cancelled);
        });

        let resource = After {
            name: name.clone(),
            cancelled,
        };
        if let Err(err) = action.resources(scope).register(Box::new(resource)) {
            log::error!("{}: {err}", action.machine_name());
        }
        handle
    }
}

impl Resource for After {
    fn name(&self) -> &str {
        &self.name
    }

    fn release(&mut self) -> Result<(), ResourceError> {
        self.cancelled.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// A periodic timer: fires `event_name` on the owning machine every `delay`
/// until cancelled or released.
pub struct Every {
    name: String,
    cancelled: Arc<AtomicBool>,
}

impl Every {
    /// Arm a periodic timer and register it on the resource manager
    /// designated by `scope`.
    pub fn arm<C>(
        action: &mut Action<'_, C>,
        delay: Duration,
        event_name: impl Into<String>,
        scope: Scope,
    ) -> TimerHandle {
        let event_name = event_name.into();
        let name = format!("Every.{event_name}.{}", delay.as_secs_f64());
        let cancelled = Arc::new(AtomicBool::new(false));
        let handle = TimerHandle {
            cancelled: cancelled.clone(),
        };

        let post_handle = action.post_handle();
        let thread_cancelled = cancelled.clone();
        let thread_event_name = event_name.clone();
        thread::spawn(move || loop {
            thread::sleep(delay);
            if thread_cancelled.load(Ordering::SeqCst) {
                return;
            }
            fire_once(&post_handle, &thread_event_name, &thread_cancelled);
        });

        let resource = Every {
            name: name.clone(),
            cancelled,
        };
        if let Err(err) = action.resources(scope).register(Box::new(resource)) {
            log::error!("{}: {err}", action.machine_name());
        }
        handle
    }
}

impl Resource for Every {
    fn name(&self) -> &str {
        &self.name
    }

    fn release(&mut self) -> Result<(), ResourceError> {
        self.cancelled.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_handle_cancel_is_idempotent() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let handle = TimerHandle {
            cancelled: cancelled.clone(),
        };
        handle.cancel();
        handle.cancel();
        assert!(cancelled.load(Ordering::SeqCst));
    }
}
