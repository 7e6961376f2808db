//! Property-definition hooks (single and bulk).

use crate::capability::Classifier;
use crate::error::HostResult;
use crate::host::ObjectRef;
use crate::intercept::{BulkPropertyDefiner, PropertyDefiner, PropertyDescriptor};
use std::sync::Arc;
use tracing::debug;

/// Correct a descriptor's literal value in place. Returns true if it changed.
fn correct_descriptor(classifier: &Classifier, key: &str, descriptor: &mut PropertyDescriptor) -> bool {
    let Some(value) = descriptor.value.as_ref() else {
        return false;
    };
    let Some(verdict) = classifier.classify(key, value) else {
        return false;
    };
    let rule = verdict.rule;
    match verdict.apply() {
        Ok(Some(corrected)) => {
            debug!(key, rule, "corrected property descriptor");
            descriptor.value = Some(corrected);
            true
        }
        Ok(None) => {
            debug!(key, rule, "raised descriptor sub-fields");
            true
        }
        Err(e) => {
            debug!(key, rule, "descriptor left unpatched: {e}");
            false
        }
    }
}

pub struct DefinePropertyHook {
    original: Arc<dyn PropertyDefiner>,
    classifier: Arc<Classifier>,
}

impl DefinePropertyHook {
    pub fn new(original: Arc<dyn PropertyDefiner>, classifier: Arc<Classifier>) -> Self {
        Self {
            original,
            classifier,
        }
    }
}

impl PropertyDefiner for DefinePropertyHook {
    fn define_property(
        &self,
        target: &ObjectRef,
        key: &str,
        mut descriptor: PropertyDescriptor,
    ) -> HostResult<ObjectRef> {
        correct_descriptor(&self.classifier, key, &mut descriptor);
        self.original.define_property(target, key, descriptor)
    }
}

pub struct DefinePropertiesHook {
    original: Arc<dyn BulkPropertyDefiner>,
    classifier: Arc<Classifier>,
}

impl DefinePropertiesHook {
    pub fn new(original: Arc<dyn BulkPropertyDefiner>, classifier: Arc<Classifier>) -> Self {
        Self {
            original,
            classifier,
        }
    }
}

impl BulkPropertyDefiner for DefinePropertiesHook {
    fn define_properties(
        &self,
        target: &ObjectRef,
        mut descriptors: Vec<(String, PropertyDescriptor)>,
    ) -> HostResult<ObjectRef> {
        for (key, descriptor) in descriptors.iter_mut() {
            correct_descriptor(&self.classifier, key, descriptor);
        }
        self.original.define_properties(target, descriptors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;
    use crate::host::HostValue;
    use crate::intercept::native::NativeObject;

    fn hook() -> DefinePropertyHook {
        DefinePropertyHook::new(Arc::new(NativeObject), Arc::new(Classifier::default()))
    }

    #[test]
    fn test_descriptor_value_corrected() {
        let target = ObjectRef::new();
        hook()
            .define_property(&target, "maxBitrate", PropertyDescriptor::data(3000))
            .unwrap();
        assert_eq!(target.get("maxBitrate").unwrap(), Some(HostValue::Number(16000.0)));
    }

    #[test]
    fn test_accessor_descriptor_untouched() {
        let target = ObjectRef::new();
        hook()
            .define_property(&target, "maxBitrate", PropertyDescriptor::default())
            .unwrap();
        assert_eq!(target.get("maxBitrate").unwrap(), Some(HostValue::Null));
    }

    #[test]
    fn test_frozen_target_error_is_the_originals() {
        let target = ObjectRef::new();
        target.freeze().unwrap();
        let err = hook()
            .define_property(&target, "maxHeight", PropertyDescriptor::data(1080))
            .unwrap_err();
        assert_eq!(err, HostError::Frozen("maxHeight".into()));
    }

    #[test]
    fn test_bulk_per_entry() {
        let hook = DefinePropertiesHook::new(Arc::new(NativeObject), Arc::new(Classifier::default()));
        let target = ObjectRef::new();
        hook.define_properties(
            &target,
            vec![
                ("maxHeight".into(), PropertyDescriptor::data(1080)),
                ("audioBitrate".into(), PropertyDescriptor::data(96)),
                ("title".into(), PropertyDescriptor::data("x")),
            ],
        )
        .unwrap();
        assert_eq!(target.get("maxHeight").unwrap(), Some(HostValue::Number(2160.0)));
        assert_eq!(target.get("audioBitrate").unwrap(), Some(HostValue::Number(96.0)));
        assert_eq!(target.get("title").unwrap(), Some(HostValue::from("x")));
    }
}
