//! Method wrapping for the externally owned player object.
//!
//! Every callable own property is replaced by a wrapper that patches object
//! arguments on the way in and object results on the way out, including the
//! settled value of deferred results. Wrappers are marked so a second pass
//! over the same object leaves them alone.

use crate::capability::Classifier;
use crate::error::HostResult;
use crate::host::{HostFunction, HostValue, ObjectRef};
use std::sync::Arc;
use tracing::{debug, info};

/// Namespace member already handled by [`MethodHook::install_on`].
const PLAYER_KEY: &str = "player";

#[derive(Clone)]
pub struct MethodHook {
    classifier: Arc<Classifier>,
}

impl MethodHook {
    pub fn new(classifier: Arc<Classifier>) -> Self {
        Self { classifier }
    }

    /// Patch `target` once, then wrap each of its methods. Returns the number
    /// of methods newly wrapped.
    pub fn install_on(&self, target: &ObjectRef) -> HostResult<usize> {
        self.classifier.patch(&HostValue::Object(target.clone()));

        let mut wrapped = 0;
        for (name, value) in target.entries()? {
            let HostValue::Function(original) = value else {
                continue;
            };
            if original.is_wrapped() {
                continue;
            }
            match target.set(&name, HostValue::Function(self.wrap(original))) {
                Ok(()) => wrapped += 1,
                Err(e) => debug!(method = %name, "method left unwrapped: {e}"),
            }
        }
        info!(methods = wrapped, "wrapped player methods");
        Ok(wrapped)
    }

    /// Wrap one method.
    pub fn wrap(&self, original: HostFunction) -> HostFunction {
        let classifier = self.classifier.clone();
        let name = original.name().to_string();
        HostFunction::wrapper(&name, move |args| {
            for arg in args {
                classifier.patch(arg);
            }
            let result = original.call(args)?;
            Ok(match result {
                HostValue::Deferred(pending) => {
                    let classifier = classifier.clone();
                    HostValue::Deferred(pending.map(move |settled| {
                        classifier.patch(&settled);
                        settled
                    }))
                }
                HostValue::Object(_) => {
                    classifier.patch(&result);
                    result
                }
                other => other,
            })
        })
    }

    /// Patch the namespace and its object members down to the configured
    /// depth, skipping the player. Returns the number of objects patched.
    pub fn walk_namespace(&self, namespace: &ObjectRef) -> usize {
        self.walk(namespace, 0)
    }

    fn walk(&self, obj: &ObjectRef, depth: usize) -> usize {
        if depth > self.classifier.targets().namespace_depth {
            return 0;
        }
        self.classifier.patch(&HostValue::Object(obj.clone()));

        let mut patched = 1;
        for (key, value) in obj.entries().unwrap_or_default() {
            if key == PLAYER_KEY {
                continue;
            }
            if let HostValue::Object(child) = value {
                patched += self.walk(&child, depth + 1);
            }
        }
        patched
    }
}
