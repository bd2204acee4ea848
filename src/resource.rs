//! Keyed containers of releasable objects, scoped to either a state or a
//! machine. Grounded on the original `ResourceManager`/`ResourceInstance`
//! pair in `pyeds/fsm.py`: register by name, release everything in
//! registration order on teardown, and report (rather than raise through)
//! any individual `release()` failure.

use std::collections::HashMap;

use crate::error::{ConfigError, ResourceError};

/// Anything that can be registered on a [`ResourceManager`] and torn down
/// later. Timers (`After`/`Every`) are the canonical implementor.
pub trait Resource: Send {
    /// The name this resource is registered under; must be unique within
    /// its owning manager.
    fn name(&self) -> &str;

    /// Release the resource. Called at most once per resource, in
    /// registration order, during [`ResourceManager::release_all`]. A
    /// failure is logged and collected rather than aborting the release of
    /// the rest of the manager's resources.
    fn release(&mut self) -> Result<(), ResourceError>;
}

/// An ordered, keyed container of [`Resource`]s.
///
/// One instance lives on every registered state (state-scoped resources)
/// and one on the machine itself (machine-scoped resources).
#[derive(Default)]
pub struct ResourceManager {
    order: Vec<String>,
    resources: HashMap<String, Box<dyn Resource>>,
}

impl ResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `resource` under its own name. Errors if that name is
    /// already registered on this manager.
    pub fn register(&mut self, resource: Box<dyn Resource>) -> Result<(), ConfigError> {
        let name = resource.name().to_string();
        if self.resources.contains_key(&name) {
            return Err(ConfigError::DuplicateResource(name));
        }
        self.order.push(name.clone());
        self.resources.insert(name, resource);
        Ok(())
    }

    /// Remove and return a previously registered resource by name, without
    /// releasing it.
    pub fn unregister(&mut self, name: &str) -> Option<Box<dyn Resource>> {
        let resource = self.resources.remove(name);
        if resource.is_some() {
            self.order.retain(|n| n != name);
        }
        resource
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Release every resource, in registration order, then empty the
    /// container. A panic from an individual `release()` is allowed to
    /// propagate (Rust has no safe blanket-catch equivalent to the
    /// original's per-resource `try`/`except`); well-behaved resources
    /// (this crate's own timers included) never panic from `release()`.
    ///
    /// Every resource is released regardless of earlier failures: each
    /// `Err` is logged at `error` level as it happens, and the first one is
    /// returned to the caller once all releases have run.
    pub fn release_all(&mut self) -> Result<(), ResourceError> {
        let mut first_err = None;
        for name in self.order.drain(..) {
            if let Some(mut resource) = self.resources.remove(&name) {
                if let Err(err) = resource.release() {
                    log::error!("{err}");
                    if first_err.is_none() {
                        first_err = Some(err);
                    }
                }
            }
        }
        self.resources.clear();
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting {
        name: String,
        order: Arc<std::sync::Mutex<Vec<String>>>,
    }

    impl Resource for Counting {
        fn name(&self) -> &str {
            &self.name
        }
        fn release(&mut self) -> Result<(), ResourceError> {
            self.order.lock().unwrap().push(self.name.clone());
            Ok(())
        }
    }

    struct Failing {
        name: String,
        order: Arc<std::sync::Mutex<Vec<String>>>,
    }

    impl Resource for Failing {
        fn name(&self) -> &str {
            &self.name
        }
        fn release(&mut self) -> Result<(), ResourceError> {
            self.order.lock().unwrap().push(self.name.clone());
            Err(ResourceError {
                name: self.name.clone(),
                message: "boom".to_string(),
            })
        }
    }

    #[test]
    fn releases_in_registration_order_and_empties() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut rm = ResourceManager::new();
        for name in ["a", "b", "c"] {
            rm.register(Box::new(Counting {
                name: name.to_string(),
                order: order.clone(),
            }))
            .unwrap();
        }
        assert_eq!(rm.len(), 3);
        assert!(rm.release_all().is_ok());
        assert!(rm.is_empty());
        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn a_failing_release_does_not_stop_the_rest_and_reports_the_first_error() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut rm = ResourceManager::new();
        rm.register(Box::new(Failing {
            name: "a".into(),
            order: order.clone(),
        }))
        .unwrap();
        rm.register(Box::new(Failing {
            name: "b".into(),
            order: order.clone(),
        }))
        .unwrap();
        rm.register(Box::new(Counting {
            name: "c".into(),
            order: order.clone(),
        }))
        .unwrap();

        let err = rm.release_all().unwrap_err();
        assert_eq!(err.name, "a");
        assert!(rm.is_empty());
        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut rm = ResourceManager::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let _ = counter;
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        rm.register(Box::new(Counting {
            name: "x".into(),
            order: order.clone(),
        }))
        .unwrap();
        let err = rm
            .register(Box::new(Counting {
                name: "x".into(),
                order,
            }))
            .unwrap_err();
        assert_eq!(err, ConfigError::DuplicateResource("x".into()));
    }
}
