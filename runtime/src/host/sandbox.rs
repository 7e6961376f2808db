//! In-memory host page used by the CLI simulator and tests.

use crate::host::{HostEnvironment, Location, ObjectRef};
use crate::navigation::History;
use std::sync::{PoisonError, RwLock};

/// A page with a mutable location and an optional capability namespace.
pub struct SandboxHost {
    location: RwLock<Location>,
    /// Earlier locations, most recent last.
    past: RwLock<Vec<Location>>,
    namespace: RwLock<Option<ObjectRef>>,
}

impl SandboxHost {
    pub fn new(start: &str) -> Self {
        Self {
            location: RwLock::new(Location::parse(start)),
            past: RwLock::new(Vec::new()),
            namespace: RwLock::new(None),
        }
    }

    /// Move to `target`, resolved against the current location.
    pub fn navigate(&self, target: &str) {
        let previous = self.relocate(target);
        self.past
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(previous);
    }

    /// Swap in the resolved location and hand back the one it replaced.
    fn relocate(&self, target: &str) -> Location {
        let mut location = self.location.write().unwrap_or_else(PoisonError::into_inner);
        let next = Location::resolve(&location.href, target);
        std::mem::replace(&mut *location, next)
    }

    /// Return to the previous location. Returns false with no history left.
    pub fn back(&self) -> bool {
        let Some(previous) = self.past.write().unwrap_or_else(PoisonError::into_inner).pop() else {
            return false;
        };
        *self.location.write().unwrap_or_else(PoisonError::into_inner) = previous;
        true
    }

    /// Publish (or withdraw) the global capability namespace.
    pub fn set_namespace(&self, namespace: Option<ObjectRef>) {
        *self.namespace.write().unwrap_or_else(PoisonError::into_inner) = namespace;
    }
}

impl HostEnvironment for SandboxHost {
    fn location(&self) -> Location {
        self.location
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn namespace(&self) -> Option<ObjectRef> {
        self.namespace
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl History for SandboxHost {
    fn push_state(&self, url: &str) {
        self.navigate(url);
    }

    fn replace_state(&self, url: &str) {
        self.relocate(url);
    }
}
