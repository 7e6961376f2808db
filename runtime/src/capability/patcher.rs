//! Recursive object patcher: a depth-bounded walk applying the classifier
//! to every reachable field.
//!
//! The visited set is reset at the start of every top-level `patch` call, so
//! objects reused across capability requests are patched again each time.
//! A failure on one field is counted and skipped; siblings are still visited.

use crate::capability::classifier::{is_audio_only_key, Classifier};
use crate::error::HostResult;
use crate::host::{HostValue, ObjectRef};
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

/// Summary of one traversal.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PatchReport {
    pub objects_visited: usize,
    pub corrections: usize,
    pub failures: usize,
    /// Objects reached beyond the depth bound and left unvisited.
    pub depth_limited: usize,
}

impl PatchReport {
    pub fn changed(&self) -> bool {
        self.corrections > 0
    }
}

/// Identity set of objects seen during the current traversal.
///
/// Handles are pinned for the lifetime of the traversal so an address cannot
/// be freed and reused by a different object mid-walk.
#[derive(Default)]
pub struct VisitedSet {
    ids: HashSet<usize>,
    pinned: Vec<ObjectRef>,
}

impl VisitedSet {
    /// Mark `obj` visited. Returns false if it already was.
    pub fn insert(&mut self, obj: &ObjectRef) -> bool {
        if !self.ids.insert(obj.id()) {
            return false;
        }
        self.pinned.push(obj.clone());
        true
    }

    pub fn reset(&mut self) {
        self.ids.clear();
        self.pinned.clear();
    }
}

/// Walks an object graph and applies classifier corrections in place.
pub struct Patcher<'a> {
    classifier: &'a Classifier,
    visited: VisitedSet,
    report: PatchReport,
}

impl<'a> Patcher<'a> {
    pub fn new(classifier: &'a Classifier) -> Self {
        Self {
            classifier,
            visited: VisitedSet::default(),
            report: PatchReport::default(),
        }
    }

    /// Patch everything reachable from `root`. Non-object roots are ignored.
    pub fn patch(&mut self, root: &HostValue) -> PatchReport {
        self.visited.reset();
        self.report = PatchReport::default();
        match root {
            HostValue::Object(obj) => self.walk(obj, 0),
            HostValue::Array(items) if self.classifier.targets().descend_into_arrays => {
                self.walk_items(items, 0)
            }
            _ => {}
        }
        self.report
    }

    fn walk(&mut self, obj: &ObjectRef, depth: usize) {
        if depth > self.classifier.targets().max_depth {
            self.report.depth_limited += 1;
            return;
        }
        if !self.visited.insert(obj) {
            return;
        }
        self.report.objects_visited += 1;

        let entries = match obj.entries() {
            Ok(entries) => entries,
            Err(e) => {
                debug!("cannot enumerate object: {e}");
                self.report.failures += 1;
                return;
            }
        };

        for (key, value) in entries {
            if let Err(e) = self.visit_field(obj, &key, &value, depth) {
                debug!(key = %key, "field left unpatched: {e}");
                self.report.failures += 1;
            }
        }
    }

    fn walk_items(&mut self, items: &[HostValue], depth: usize) {
        for item in items {
            if let HostValue::Object(child) = item {
                self.walk(child, depth);
            }
        }
    }

    fn visit_field(
        &mut self,
        parent: &ObjectRef,
        key: &str,
        value: &HostValue,
        depth: usize,
    ) -> HostResult<()> {
        if is_audio_only_key(&key.to_lowercase()) {
            return Ok(());
        }

        if let Some(verdict) = self.classifier.classify(key, value) {
            let rule = verdict.rule;
            if let Some(corrected) = verdict.apply()? {
                debug!(key, rule, from = ?value, to = ?corrected, "patched capability field");
                parent.set(key, corrected)?;
            } else {
                debug!(key, rule, "raised capability sub-fields");
            }
            self.report.corrections += 1;
        }

        match value {
            HostValue::Object(child) => self.walk(child, depth + 1),
            HostValue::Array(items) if self.classifier.targets().descend_into_arrays => {
                self.walk_items(items, depth + 1)
            }
            _ => {}
        }
        Ok(())
    }
}
