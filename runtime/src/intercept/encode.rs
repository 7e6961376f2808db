//! Encode hooks: structured encode and the pre-encryption text encoder.
//!
//! Both inspect text that has already been produced, so they catch manifest
//! requests regardless of which serializer built them.

use crate::capability::catalog::PROFILE_MARKERS;
use crate::capability::manifest::rewrite_request;
use crate::capability::Classifier;
use crate::error::HostResult;
use crate::host::json::{from_json, to_json};
use crate::host::HostValue;
use crate::intercept::envelope::{self, looks_like_envelope};
use crate::intercept::{StructuredEncoder, TextEncoder};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Field names that identify a manifest request in encoded output.
const MANIFEST_FIELD_MARKERS: &[&str] = &["viewableId", "lookupType", "\"method\":\"manifest\""];

/// Plain payload markers for the text encoder.
const TEXT_MARKERS: &[&str] = &["\"profiles\"", "\"viewableIds\"", "\"lookupType\""];

/// Plain text payloads at or below this many characters are never inspected.
const TEXT_LENGTH_GATE: usize = 100;

fn mentions_manifest(encoded: &str) -> bool {
    PROFILE_MARKERS.iter().any(|m| encoded.contains(m))
        || MANIFEST_FIELD_MARKERS.iter().any(|m| encoded.contains(m))
}

pub struct StringifyHook {
    original: Arc<dyn StructuredEncoder>,
    classifier: Arc<Classifier>,
}

impl StringifyHook {
    pub fn new(original: Arc<dyn StructuredEncoder>, classifier: Arc<Classifier>) -> Self {
        Self {
            original,
            classifier,
        }
    }

    /// Re-encode a patched copy of `encoded`, or `None` if nothing changed.
    fn rewrite(&self, encoded: &str, indent: Option<usize>) -> Option<String> {
        let parsed: Value = match serde_json::from_str(encoded) {
            Ok(v) => v,
            Err(e) => {
                debug!("encoded output not re-parseable: {e}");
                return None;
            }
        };
        let copy = from_json(&parsed);
        if !rewrite_request(&self.classifier, &copy) {
            return None;
        }
        match self.original.stringify(&copy, indent) {
            Ok(text) => Some(text),
            Err(e) => {
                debug!("re-encode failed, keeping original output: {e}");
                None
            }
        }
    }
}

impl StructuredEncoder for StringifyHook {
    fn stringify(&self, value: &HostValue, indent: Option<usize>) -> HostResult<String> {
        let encoded = self.original.stringify(value, indent)?;
        if !matches!(value, HostValue::Object(_) | HostValue::Array(_)) || !mentions_manifest(&encoded) {
            return Ok(encoded);
        }
        match self.rewrite(&encoded, indent) {
            Some(rewritten) => {
                info!("manifest request rewritten during structured encode");
                Ok(rewritten)
            }
            None => Ok(encoded),
        }
    }
}

pub struct TextEncodeHook {
    original: Arc<dyn TextEncoder>,
    classifier: Arc<Classifier>,
}

impl TextEncodeHook {
    pub fn new(original: Arc<dyn TextEncoder>, classifier: Arc<Classifier>) -> Self {
        Self {
            original,
            classifier,
        }
    }

    /// The text that should actually be encoded, if it differs from `input`.
    pub fn rewrite(&self, input: &str) -> Option<String> {
        let envelope_like = looks_like_envelope(input);
        let plain_manifest =
            input.chars().count() > TEXT_LENGTH_GATE && TEXT_MARKERS.iter().any(|m| input.contains(m));
        if !envelope_like && !plain_manifest {
            return None;
        }

        match serde_json::from_str::<Value>(input) {
            Ok(mut parsed) if envelope::is_envelope(&parsed) => {
                if !envelope::patch_envelope(&mut parsed, &self.classifier) {
                    return None;
                }
                serde_json::to_string(&parsed).ok()
            }
            Ok(parsed) if plain_manifest => {
                let host = from_json(&parsed);
                if !rewrite_request(&self.classifier, &host) {
                    return None;
                }
                info!("manifest request rewritten before encryption");
                serde_json::to_string(&to_json(&host).ok()?).ok()
            }
            Ok(_) => None,
            Err(_) if envelope_like => envelope::patch_stream(input, &self.classifier),
            Err(e) => {
                debug!("text payload not parseable: {e}");
                None
            }
        }
    }
}

impl TextEncoder for TextEncodeHook {
    fn encode(&self, input: &str) -> Vec<u8> {
        match self.rewrite(input) {
            Some(rewritten) => self.original.encode(&rewritten),
            None => self.original.encode(input),
        }
    }
}
