//! In-process implementations of the host primitives.
//!
//! These are the unwrapped originals used by the CLI, simulations and tests.

use crate::error::{HostError, HostResult};
use crate::host::json::{from_json, to_json};
use crate::host::{Deferred, HostValue, ObjectRef};
use crate::intercept::{
    drm, BulkPropertyDefiner, DecodingInfo, HdcpPolicy, KeySystemAccess, ObjectMerger,
    PropertyDefiner, PropertyDescriptor, StructuredDecoder, StructuredEncoder, TextEncoder,
    TypeSupport,
};
use serde::Serialize;

/// Property definition and shallow merge over [`ObjectRef`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeObject;

impl PropertyDefiner for NativeObject {
    fn define_property(
        &self,
        target: &ObjectRef,
        key: &str,
        descriptor: PropertyDescriptor,
    ) -> HostResult<ObjectRef> {
        target.set(key, descriptor.value.unwrap_or(HostValue::Null))?;
        Ok(target.clone())
    }
}

impl BulkPropertyDefiner for NativeObject {
    fn define_properties(
        &self,
        target: &ObjectRef,
        descriptors: Vec<(String, PropertyDescriptor)>,
    ) -> HostResult<ObjectRef> {
        for (key, descriptor) in descriptors {
            target.set(&key, descriptor.value.unwrap_or(HostValue::Null))?;
        }
        Ok(target.clone())
    }
}

impl ObjectMerger for NativeObject {
    fn assign(&self, target: &ObjectRef, sources: &[HostValue]) -> HostResult<ObjectRef> {
        // Primitive sources carry no own enumerable properties.
        for src in sources.iter().filter_map(HostValue::as_object) {
            for (key, value) in src.entries()? {
                target.set(&key, value)?;
            }
        }
        Ok(target.clone())
    }
}

/// Structured encode/decode backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeJson;

impl StructuredEncoder for NativeJson {
    fn stringify(&self, value: &HostValue, indent: Option<usize>) -> HostResult<String> {
        let json = to_json(value)?;
        match indent {
            Some(width) if width > 0 => {
                let pad = vec![b' '; width.min(10)];
                let formatter = serde_json::ser::PrettyFormatter::with_indent(&pad);
                let mut out = Vec::new();
                let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
                json.serialize(&mut ser)
                    .map_err(|e| HostError::Type(e.to_string()))?;
                String::from_utf8(out).map_err(|e| HostError::Type(e.to_string()))
            }
            _ => serde_json::to_string(&json).map_err(|e| HostError::Type(e.to_string())),
        }
    }
}

impl StructuredDecoder for NativeJson {
    fn parse(&self, text: &str) -> HostResult<HostValue> {
        let json: serde_json::Value =
            serde_json::from_str(text).map_err(|e| HostError::Syntax(e.to_string()))?;
        Ok(from_json(&json))
    }
}

/// UTF-8 text encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8TextEncoder;

impl TextEncoder for Utf8TextEncoder {
    fn encode(&self, input: &str) -> Vec<u8> {
        input.as_bytes().to_vec()
    }
}

/// Media support of a software-decoding environment capped at 1080p, with
/// software-only DRM robustness and HDCP 1.4.
#[derive(Debug, Clone)]
pub struct SoftwareMedia {
    codecs: Vec<String>,
    max_width: f64,
    robustness: Vec<String>,
    hdcp: String,
}

impl Default for SoftwareMedia {
    fn default() -> Self {
        Self {
            codecs: ["avc1", "mp4a", "opus", "ec-3"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            max_width: 1920.0,
            robustness: ["", "SW_SECURE_CRYPTO", "SW_SECURE_DECODE"]
                .iter()
                .map(|r| r.to_string())
                .collect(),
            hdcp: "hdcp-1.4".to_string(),
        }
    }
}

impl SoftwareMedia {
    fn supports(&self, mime: &str) -> bool {
        let lower = mime.to_lowercase();
        self.codecs.iter().any(|c| lower.contains(c.as_str()))
    }

    /// True if every video capability asks for a robustness level this
    /// environment provides. A missing robustness counts as the empty level.
    fn satisfies(&self, config: &HostValue) -> bool {
        let Some(obj) = config.as_object() else {
            return false;
        };
        let caps = match obj.get("videoCapabilities") {
            Ok(Some(HostValue::Array(caps))) => caps,
            Ok(_) => return true,
            Err(_) => return false,
        };
        caps.iter().all(|cap| {
            let level = cap
                .as_object()
                .and_then(|c| c.get("robustness").ok().flatten())
                .and_then(|r| r.as_str().map(str::to_string))
                .unwrap_or_default();
            self.robustness.contains(&level)
        })
    }
}

impl TypeSupport for SoftwareMedia {
    fn is_type_supported(&self, mime: &str) -> bool {
        self.supports(mime)
    }
}

impl DecodingInfo for SoftwareMedia {
    fn decoding_info(&self, config: &HostValue) -> Deferred {
        let video = config
            .as_object()
            .and_then(|c| c.get("video").ok().flatten());
        let Some(video) = video.as_ref().and_then(HostValue::as_object) else {
            return Deferred::rejected(HostError::Type("decoding config has no video".into()));
        };
        let content_type = video
            .get("contentType")
            .ok()
            .flatten()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        let width = video
            .get("width")
            .ok()
            .flatten()
            .and_then(|v| v.as_number())
            .unwrap_or(0.0);

        let supported = self.supports(&content_type) && width <= self.max_width;
        Deferred::resolved(HostValue::object([
            ("supported", HostValue::Bool(supported)),
            ("smooth", HostValue::Bool(supported)),
            ("powerEfficient", HostValue::Bool(false)),
        ]))
    }
}

impl KeySystemAccess for SoftwareMedia {
    fn request_access(&self, key_system: &str, configs: &[HostValue]) -> Deferred {
        match configs.iter().find(|c| self.satisfies(c)) {
            Some(config) => Deferred::resolved(HostValue::object([
                ("keySystem", HostValue::from(key_system)),
                ("configuration", config.clone()),
            ])),
            None => Deferred::rejected(drm::not_supported(key_system)),
        }
    }
}

impl HdcpPolicy for SoftwareMedia {
    fn check(&self) -> Deferred {
        Deferred::resolved(HostValue::object([("hdcp", HostValue::from(self.hdcp.as_str()))]))
    }
}
