//! Decode hook: patch decoded manifests and playback configs before the
//! caller sees them.

use crate::capability::classifier::{has_marker_key, DECODE_MARKERS};
use crate::capability::Classifier;
use crate::error::HostResult;
use crate::host::{HostValue, ObjectRef};
use crate::intercept::StructuredDecoder;
use std::sync::Arc;
use tracing::debug;

pub struct ParseHook {
    original: Arc<dyn StructuredDecoder>,
    classifier: Arc<Classifier>,
}

impl ParseHook {
    pub fn new(original: Arc<dyn StructuredDecoder>, classifier: Arc<Classifier>) -> Self {
        Self {
            original,
            classifier,
        }
    }

    /// Replace a truthy top-level `maxResolution` with the target resolution.
    fn force_max_resolution(&self, obj: &ObjectRef) -> HostResult<bool> {
        match obj.get("maxResolution")? {
            Some(current) if current.is_truthy() => {
                let targets = self.classifier.targets();
                obj.set(
                    "maxResolution",
                    HostValue::object([
                        ("width", HostValue::Number(targets.max_width)),
                        ("height", HostValue::Number(targets.max_height)),
                    ]),
                )?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

impl StructuredDecoder for ParseHook {
    fn parse(&self, text: &str) -> HostResult<HostValue> {
        let value = self.original.parse(text)?;
        let Some(obj) = value.as_object() else {
            return Ok(value);
        };

        let keys = obj.keys().unwrap_or_default();
        if has_marker_key(&keys, DECODE_MARKERS) {
            let report = self.classifier.patch(&value);
            if report.changed() {
                debug!(corrections = report.corrections, "patched decoded object");
            }
        }
        if let Err(e) = self.force_max_resolution(obj) {
            debug!("maxResolution left unpatched: {e}");
        }
        Ok(value)
    }
}
