//! Object-merge hook: patch merged results that look capability-bearing.

use crate::capability::classifier::{has_marker_key, MERGE_MARKERS};
use crate::capability::Classifier;
use crate::error::HostResult;
use crate::host::{HostValue, ObjectRef};
use crate::intercept::ObjectMerger;
use std::sync::Arc;
use tracing::debug;

pub struct AssignHook {
    original: Arc<dyn ObjectMerger>,
    classifier: Arc<Classifier>,
}

impl AssignHook {
    pub fn new(original: Arc<dyn ObjectMerger>, classifier: Arc<Classifier>) -> Self {
        Self {
            original,
            classifier,
        }
    }
}

impl ObjectMerger for AssignHook {
    fn assign(&self, target: &ObjectRef, sources: &[HostValue]) -> HostResult<ObjectRef> {
        let merged = self.original.assign(target, sources)?;
        let keys = merged.keys().unwrap_or_default();
        if has_marker_key(&keys, MERGE_MARKERS) {
            let report = self.classifier.patch(&HostValue::Object(merged.clone()));
            if report.changed() {
                debug!(corrections = report.corrections, "patched merged object");
            }
        }
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::json::{from_json, to_json};
    use crate::intercept::native::NativeObject;
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    #[test]
    fn test_merged_capabilities_patched() {
        let hook = AssignHook::new(Arc::new(NativeObject), Arc::new(Classifier::default()));
        let target = ObjectRef::new();
        let defaults = from_json(&json!({"maxBitrate": 4000}));
        let overrides = from_json(&json!({"maxHeight": 1080, "lang": "en"}));
        let merged = hook.assign(&target, &[defaults, overrides]).unwrap();

        assert!(merged.ptr_eq(&target));
        assert_json_eq!(
            to_json(&HostValue::Object(merged)).unwrap(),
            json!({"maxBitrate": 16000, "maxHeight": 2160, "lang": "en"})
        );
    }

    #[test]
    fn test_nested_only_caps_are_left_alone() {
        // No top-level key hints at capabilities, so the nested cap survives.
        let hook = AssignHook::new(Arc::new(NativeObject), Arc::new(Classifier::default()));
        let target = ObjectRef::new();
        let src = from_json(&json!({"limits": {"maxHeight": 1080}}));
        let merged = hook.assign(&target, &[src]).unwrap();
        assert_json_eq!(
            to_json(&HostValue::Object(merged)).unwrap(),
            json!({"limits": {"maxHeight": 1080}})
        );
    }
}
