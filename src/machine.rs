//! The state machine itself: builder, running dispatcher, and the handle
//! used to talk to it from other threads.
//!
//! Grounded on `StateMachine`/`event_loop`/`_dispatch`/`_exec_state` in the
//! original `pyeds/fsm.py`. The worker-thread-per-machine model, the
//! bounded queue with a sentinel for shutdown, and the bubble-up-then-
//! cascade dispatch algorithm are carried over line for line in spirit; the
//! embedding (generic `Running<C>` type-erased into a `MachineHandle` at
//! build time) is this port's answer to Rust not having Python's duck-typed
//! `self`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::error::{CapacityError, ConfigError, DispatchError};
use crate::event::{Event, Signal};
use crate::path::PathManager;
use crate::registry;
use crate::resource::ResourceManager;
use crate::response::Response;
use crate::state::{dispatch_signal, Action, StateBehavior};
use crate::timer::PostHandle;

/// What travels over a machine's internal channel: either an event to
/// dispatch, or the sentinel requesting orderly shutdown.
pub(crate) enum Envelope {
    Event(Event),
    Sentinel,
}

struct StateSlot<C> {
    behavior: Box<dyn StateBehavior<C>>,
    resources: ResourceManager,
}

/// Collects state registrations and machine-level options, then produces a
/// runnable machine. The Rust counterpart of the original's declarative
/// `DeclareState` binding plus `StateMachine.__init__`'s keyword arguments.
pub struct MachineBuilder<C> {
    name: String,
    context: C,
    order: Vec<String>,
    states: HashMap<String, (Option<String>, Box<dyn StateBehavior<C>>)>,
    queue_capacity: usize,
    initial_state: Option<String>,
    autostart: bool,
    register_in_directory: bool,
    on_start: Box<dyn FnMut(&mut C) + Send>,
    on_terminate: Box<dyn FnMut(&mut C, &mut ResourceManager) + Send>,
    on_exception: Box<dyn FnMut(&str, &str, &str) + Send>,
}

impl<C> MachineBuilder<C>
where
    C: Send + 'static,
{
    /// The default queue capacity, matching the original's `queue_size=64`.
    pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

    pub fn new(name: impl Into<String>, context: C) -> Self {
        MachineBuilder {
            name: name.into(),
            context,
            order: Vec::new(),
            states: HashMap::new(),
            queue_capacity: Self::DEFAULT_QUEUE_CAPACITY,
            initial_state: None,
            autostart: true,
            register_in_directory: true,
            on_start: Box::new(|_| {}),
            on_terminate: Box::new(|_, resources| {
                let _ = resources.release_all();
            }),
            on_exception: Box::new(|state, event, msg| {
                log::error!("unhandled exception in state {state:?} handling {event:?}: {msg}");
            }),
        }
    }

    /// Register a state. `parent` names a previously- or later-registered
    /// state; dangling/cyclic parents are reported by [`MachineBuilder::build`].
    /// Registration order defines the default initial state.
    pub fn state(
        mut self,
        name: impl Into<String>,
        parent: Option<&str>,
        behavior: impl StateBehavior<C> + 'static,
    ) -> Self {
        let name = name.into();
        if !self.states.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.states
            .insert(name, (parent.map(|p| p.to_string()), Box::new(behavior)));
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn initial_state(mut self, name: impl Into<String>) -> Self {
        self.initial_state = Some(name.into());
        self
    }

    pub fn autostart(mut self, autostart: bool) -> Self {
        self.autostart = autostart;
        self
    }

    /// Skip registering this machine in the process-wide [`crate::registry`].
    /// Useful for tests that construct many short-lived machines with
    /// colliding names.
    pub fn without_registry(mut self) -> Self {
        self.register_in_directory = false;
        self
    }

    pub fn on_start(mut self, hook: impl FnMut(&mut C) + Send + 'static) -> Self {
        self.on_start = Box::new(hook);
        self
    }

    pub fn on_terminate(
        mut self,
        hook: impl FnMut(&mut C, &mut ResourceManager) + Send + 'static,
    ) -> Self {
        self.on_terminate = Box::new(hook);
        self
    }

    pub fn on_exception(mut self, hook: impl FnMut(&str, &str, &str) + Send + 'static) -> Self {
        self.on_exception = Box::new(hook);
        self
    }

    /// Validate the configuration, build the path manager, and produce a
    /// [`MachineHandle`]. If `autostart` is `true` (the default) the worker
    /// thread is spawned before this returns; otherwise call
    /// [`MachineHandle::do_start`] explicitly.
    pub fn build(self) -> Result<MachineHandle, ConfigError> {
        if self.order.is_empty() {
            return Err(ConfigError::NoStates);
        }
        let initial = match &self.initial_state {
            Some(name) => {
                if !self.states.contains_key(name) {
                    return Err(ConfigError::UnregisteredInitialState(name.clone()));
                }
                name.clone()
            }
            None => self.order[0].clone(),
        };

        let mut path = PathManager::new();
        for name in &self.order {
            let parent = self.states[name].0.as_deref();
            path.add(name, parent)?;
        }
        path.build()?;
        let depth = path.depth();

        let mut slots = HashMap::new();
        let mut states_map = self.states;
        for name in &self.order {
            let (_, behavior) = states_map.remove(name).expect("just inserted");
            slots.insert(
                name.clone(),
                StateSlot {
                    behavior,
                    resources: ResourceManager::new(),
                },
            );
        }

        let (sender, receiver) = bounded::<Envelope>(self.queue_capacity);
        let (done_tx, done_rx) = bounded::<()>(0);
        let machine_name: Arc<str> = Arc::from(self.name.as_str());
        let post_handle = PostHandle::new(sender.clone(), machine_name.clone());
        let current_state = Arc::new(RwLock::new(initial.clone()));
        let states_list: Arc<Vec<String>> = Arc::new(self.order.clone());

        let running = Running {
            name: machine_name.clone(),
            context: self.context,
            states: slots,
            path,
            machine_resources: ResourceManager::new(),
            current: initial,
            receiver,
            post_handle,
            introspection: current_state.clone(),
            on_start: self.on_start,
            on_terminate: self.on_terminate,
            on_exception: self.on_exception,
            register_in_directory: self.register_in_directory,
        };

        let handle = MachineHandle {
            name: machine_name,
            sender,
            state: current_state,
            states: states_list,
            depth,
            done_rx,
            pending_start: Arc::new(Mutex::new(None)),
        };

        let register_in_directory = self.register_in_directory;
        if register_in_directory {
            registry::register(handle.name.to_string(), handle.clone())?;
        }

        let start: Box<dyn FnOnce() + Send> = Box::new(move || {
            let mut running = running;
            thread::spawn(move || {
                running.run();
                drop(done_tx);
            });
        });

        if self.autostart {
            start();
        } else {
            *handle.pending_start.lock().unwrap() = Some(start);
        }

        Ok(handle)
    }
}

/// The machine's private, owned state, moved wholesale onto the worker
/// thread when it starts. Never shared; all cross-thread communication
/// happens through the channel and the `Arc<RwLock<..>>` introspection
/// snapshot.
struct Running<C> {
    name: Arc<str>,
    context: C,
    states: HashMap<String, StateSlot<C>>,
    path: PathManager,
    machine_resources: ResourceManager,
    current: String,
    receiver: Receiver<Envelope>,
    post_handle: PostHandle,
    introspection: Arc<RwLock<String>>,
    on_start: Box<dyn FnMut(&mut C) + Send>,
    on_terminate: Box<dyn FnMut(&mut C, &mut ResourceManager) + Send>,
    on_exception: Box<dyn FnMut(&str, &str, &str) + Send>,
    register_in_directory: bool,
}

impl<C> Running<C> {
    fn handle_in(&mut self, state: &str, event: &Event) -> Response {
        let Running {
            states,
            context,
            machine_resources,
            post_handle,
            name,
            ..
        } = self;
        let slot = states.get_mut(state).expect("state must be registered");
        let mut action = Action {
            data: context,
            machine_name: &**name,
            post_handle: post_handle.clone(),
            state_resources: &mut slot.resources,
            machine_resources,
        };
        slot.behavior.handle(&mut action, event)
    }

    fn signal_in(&mut self, state: &str, signal: Signal) -> Option<String> {
        let Running {
            states,
            context,
            machine_resources,
            post_handle,
            name,
            ..
        } = self;
        let slot = states.get_mut(state).expect("state must be registered");
        let mut action = Action {
            data: context,
            machine_name: &**name,
            post_handle: post_handle.clone(),
            state_resources: &mut slot.resources,
            machine_resources,
        };
        dispatch_signal(&mut *slot.behavior, &mut action, signal)
    }

    /// Execute the dispatch algorithm for one external event (§4.4.1-4.4.3
    /// of the spec): bubble up the ancestor chain looking for a handler,
    /// then run the transition cascade if one was requested.
    fn dispatch(&mut self, event: Event) {
        log::debug!("{} {}({})", self.name, self.current, event.name());
        let mut cur = self.current.clone();
        let (response, handling_state) = loop {
            let response = self.handle_in(&cur, &event);
            if !matches!(response, Response::Super) {
                break (response, cur);
            }
            self.path.push_pend_exit(&cur);
            match self.path.parent_of(&cur).map(|s| s.to_string()) {
                Some(parent) => cur = parent,
                None => {
                    log::debug!(
                        "{} {}({}) wasn't handled",
                        self.name,
                        self.current,
                        event.name()
                    );
                    self.path.take_pend_exit();
                    return;
                }
            }
        };

        match response {
            Response::Handled | Response::Super => {
                self.path.take_pend_exit();
            }
            Response::Transition(target) => {
                if let Err(err) = self.run_transition(&handling_state, &target) {
                    log::error!("{}: {err}", self.name);
                    (self.on_exception)(&handling_state, event.name(), &err.to_string());
                }
            }
        }
    }

    /// Run the exit/entry/init cascade from `source` to `target`, repeating
    /// while `on_init` keeps requesting further transitions (§4.4.3).
    fn run_transition(&mut self, source: &str, target: &str) -> Result<(), DispatchError> {
        if !self.states.contains_key(target) {
            return Err(DispatchError::UnknownState(target.to_string()));
        }

        let mut current_source = source.to_string();
        let mut current_target = target.to_string();
        let mut pend = self.path.take_pend_exit();

        loop {
            log::debug!(
                "{} {} -> {}",
                self.name,
                current_source,
                current_target
            );

            // Decision D-1 (see DESIGN.md): a self-transition's identical
            // source/destination paths intersect completely, so `plan`
            // yields empty exit/enter lists here; no on_exit/on_entry runs
            // unless bubbling already queued something in `pend`.
            let (mut exit_list, mut enter_list) = self.path.plan(&current_source, &current_target);

            if !pend.is_empty() {
                let mut combined = std::mem::take(&mut pend);
                combined.extend(exit_list);
                exit_list = combined;
            }

            for state in &exit_list {
                self.signal_in(state, Signal::Exit);
                if let Some(slot) = self.states.get_mut(state) {
                    let _ = slot.resources.release_all();
                }
            }
            for state in &enter_list {
                self.signal_in(state, Signal::Entry);
            }
            enter_list.clear();

            self.current = current_target.clone();
            *self.introspection.write().unwrap() = current_target.clone();

            match self.signal_in(&current_target, Signal::Init) {
                Some(further) => {
                    if !self.states.contains_key(&further) {
                        return Err(DispatchError::UnknownState(further));
                    }
                    current_source = current_target;
                    current_target = further;
                }
                None => return Ok(()),
            }
        }
    }

    /// The worker thread's body: initial transition, `on_start`, then the
    /// event loop until the sentinel arrives (§4.4.4).
    fn run(&mut self) {
        log::debug!(
            "{} registered states {:?}",
            self.name,
            self.states.keys().collect::<Vec<_>>()
        );
        log::info!("{} {} is initial state", self.name, self.current);

        let initial = self.current.clone();
        if let Some(target) = self.signal_in(&initial, Signal::Init) {
            if let Err(err) = self.run_transition(&initial, &target) {
                log::error!("{}: initial transition failed: {err}", self.name);
            }
        }

        (self.on_start)(&mut self.context);

        loop {
            match self.receiver.recv() {
                Ok(Envelope::Event(event)) => self.dispatch(event),
                Ok(Envelope::Sentinel) | Err(_) => {
                    (self.on_terminate)(&mut self.context, &mut self.machine_resources);
                    if self.register_in_directory {
                        registry::unregister(&self.name);
                    }
                    log::info!("{} terminated", self.name);
                    return;
                }
            }
        }
    }
}

/// A cheap, `Clone + Send + Sync` handle to a running (or not-yet-started)
/// machine. This is what the process-wide [`crate::registry`] stores, and
/// what application code and timers use to talk to a machine.
#[derive(Clone)]
pub struct MachineHandle {
    name: Arc<str>,
    sender: Sender<Envelope>,
    state: Arc<RwLock<String>>,
    states: Arc<Vec<String>>,
    depth: usize,
    done_rx: Receiver<()>,
    pending_start: Arc<Mutex<Option<Box<dyn FnOnce() + Send>>>>,
}

impl MachineHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current state's name.
    pub fn state(&self) -> String {
        self.state.read().unwrap().clone()
    }

    /// The registered state names, in registration order.
    pub fn states(&self) -> &[String] {
        &self.states
    }

    /// The hierarchy's depth (the longest ancestor chain).
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Enqueue `event`, blocking forever if the queue is full.
    pub fn send(&self, event: Event) -> Result<(), CapacityError> {
        self.sender
            .send(Envelope::Event(event))
            .map_err(|_| CapacityError::Disconnected)
    }

    /// Enqueue `event` without blocking.
    pub fn try_send(&self, event: Event) -> Result<(), CapacityError> {
        self.sender
            .try_send(Envelope::Event(event))
            .map_err(|err| match err {
                TrySendError::Full(_) => CapacityError::QueueFull,
                TrySendError::Disconnected(_) => CapacityError::Disconnected,
            })
    }

    /// Enqueue `event`, waiting up to `timeout` if the queue is full.
    pub fn send_timeout(&self, event: Event, timeout: Duration) -> Result<(), CapacityError> {
        self.sender
            .send_timeout(Envelope::Event(event), timeout)
            .map_err(|err| match err {
                crossbeam_channel::SendTimeoutError::Timeout(_) => CapacityError::QueueFull,
                crossbeam_channel::SendTimeoutError::Disconnected(_) => {
                    CapacityError::Disconnected
                }
            })
    }

    /// Start the worker thread if `autostart` was disabled at build time.
    /// A no-op (but not an error) if the machine has already started.
    pub fn do_start(&self) -> Result<(), ConfigError> {
        if let Some(start) = self.pending_start.lock().unwrap().take() {
            start();
        }
        Ok(())
    }

    /// Request shutdown by posting the sentinel. The machine finishes any
    /// in-flight dispatch cascade, then processes already-queued events
    /// before terminating — the sentinel is just another queue entry.
    pub fn do_terminate(&self, timeout: Option<Duration>) -> Result<(), CapacityError> {
        match timeout {
            Some(t) => self
                .sender
                .send_timeout(Envelope::Sentinel, t)
                .map_err(|err| match err {
                    crossbeam_channel::SendTimeoutError::Timeout(_) => CapacityError::QueueFull,
                    crossbeam_channel::SendTimeoutError::Disconnected(_) => {
                        CapacityError::Disconnected
                    }
                }),
            None => self
                .sender
                .send(Envelope::Sentinel)
                .map_err(|_| CapacityError::Disconnected),
        }
    }

    /// Block until the worker thread exits, or `timeout` elapses. Returns
    /// whether it exited.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        match timeout {
            Some(t) => !matches!(self.done_rx.recv_timeout(t), Err(RecvTimeoutError::Timeout)),
            None => {
                let _ = self.done_rx.recv();
                true
            }
        }
    }

    pub(crate) fn post_handle(&self) -> PostHandle {
        PostHandle::new(self.sender.clone(), self.name.clone())
    }
}
