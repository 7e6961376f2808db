//! Transport envelopes: `{"sequencenumber"|"messageid": .., "data": base64(json)}`.
//!
//! A message may arrive as one envelope object or as a stream of concatenated
//! JSON objects (a header followed by payload chunks). Only chunks whose
//! decoded payload mentions manifest fields are rewritten; everything else is
//! re-emitted as it was.

use crate::capability::manifest::rewrite_request;
use crate::capability::Classifier;
use crate::host::json::{from_json, to_json};
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde_json::Value;
use tracing::{debug, info};

/// Payload substrings that mark a decoded chunk as a manifest request.
const PAYLOAD_MARKERS: &[&str] = &["\"profiles\"", "\"viewableIds\""];

/// Standard alphabet, padded on encode, padding optional on decode.
const TRANSPORT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Cheap textual pre-check before any parsing.
pub fn looks_like_envelope(text: &str) -> bool {
    text.contains("\"data\"")
        && (text.contains("\"sequencenumber\"") || text.contains("\"messageid\""))
}

/// True for an object carrying a string `data` field and a sequencing key.
pub fn is_envelope(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    matches!(obj.get("data"), Some(Value::String(_)))
        && (obj.contains_key("sequencenumber") || obj.contains_key("messageid"))
}

/// Rewrite the base64 payload of one envelope in place. Returns true if the
/// `data` field was replaced.
pub fn patch_envelope(envelope: &mut Value, classifier: &Classifier) -> bool {
    if !is_envelope(envelope) {
        return false;
    }
    let Some(Value::String(data)) = envelope.get("data") else {
        return false;
    };
    let Some(rewritten) = rewrite_payload(data, classifier) else {
        return false;
    };
    envelope["data"] = Value::String(rewritten);
    info!("rewrote manifest request inside transport envelope");
    true
}

/// Patch every envelope in a stream of concatenated JSON objects.
///
/// Returns the re-serialized stream, or `None` if the text is not a valid
/// stream or nothing changed.
pub fn patch_stream(text: &str, classifier: &Classifier) -> Option<String> {
    let mut chunks = Vec::new();
    for chunk in serde_json::Deserializer::from_str(text).into_iter::<Value>() {
        match chunk {
            Ok(value) => chunks.push(value),
            Err(e) => {
                debug!("envelope stream abandoned: {e}");
                return None;
            }
        }
    }

    let mut changed = false;
    for chunk in chunks.iter_mut() {
        changed |= patch_envelope(chunk, classifier);
    }
    if !changed {
        return None;
    }

    let mut out = String::with_capacity(text.len());
    for chunk in &chunks {
        out.push_str(&serde_json::to_string(chunk).ok()?);
    }
    Some(out)
}

fn rewrite_payload(data: &str, classifier: &Classifier) -> Option<String> {
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = TRANSPORT.decode(compact).ok()?;
    let inner = String::from_utf8(bytes).ok()?;
    if !PAYLOAD_MARKERS.iter().any(|m| inner.contains(m)) {
        return None;
    }

    let parsed: Value = serde_json::from_str(&inner).ok()?;
    let host = from_json(&parsed);
    if !rewrite_request(classifier, &host) {
        return None;
    }
    let encoded = serde_json::to_string(&to_json(&host).ok()?).ok()?;
    Some(TRANSPORT.encode(encoded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
    use serde_json::json;

    fn envelope(payload: &Value) -> Value {
        json!({
            "sequencenumber": 1,
            "data": STANDARD.encode(payload.to_string()),
        })
    }

    fn decode_data(envelope: &Value) -> Value {
        let data = envelope["data"].as_str().unwrap();
        serde_json::from_slice(&STANDARD.decode(data).unwrap()).unwrap()
    }

    #[test]
    fn test_envelope_profiles_injected() {
        let classifier = Classifier::default();
        let mut env = envelope(&json!({"profiles": [], "viewableIds": [81234]}));
        assert!(patch_envelope(&mut env, &classifier));

        let inner = decode_data(&env);
        let profiles: Vec<&str> = inner["profiles"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(profiles, crate::capability::catalog::builtin_profiles());
        assert_eq!(env["sequencenumber"], json!(1));
    }

    #[test]
    fn test_non_manifest_payload_untouched() {
        let classifier = Classifier::default();
        let original = envelope(&json!({"event": "heartbeat"}));
        let mut env = original.clone();
        assert!(!patch_envelope(&mut env, &classifier));
        assert_eq!(env, original);
    }

    #[test]
    fn test_unpadded_and_wrapped_payloads_decoded() {
        let classifier = Classifier::default();
        let payload = json!({"profiles": ["ab"]}).to_string();
        let unpadded = STANDARD_NO_PAD.encode(&payload);
        assert_ne!(unpadded, STANDARD.encode(&payload));

        let mut env = json!({"sequencenumber": 2, "data": unpadded});
        assert!(patch_envelope(&mut env, &classifier));

        let padded = STANDARD.encode(&payload);
        let (head, tail) = padded.split_at(8);
        let mut env = json!({"sequencenumber": 3, "data": format!("{head}\n  {tail}\r\n")});
        assert!(patch_envelope(&mut env, &classifier));
        assert!(!decode_data(&env)["profiles"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_base64_untouched() {
        let classifier = Classifier::default();
        let mut env = json!({"messageid": 7, "data": "%%%not-base64%%%"});
        assert!(!patch_envelope(&mut env, &classifier));
    }

    #[test]
    fn test_stream_of_chunks() {
        let classifier = Classifier::default();
        let header = json!({"headerdata": "abc", "signature": "sig"});
        let chunk = envelope(&json!({"profiles": ["custom-x"]}));
        let text = format!("{header}{chunk}");
        assert!(looks_like_envelope(&text));

        let out = patch_stream(&text, &classifier).unwrap();
        let values: Vec<Value> = serde_json::Deserializer::from_str(&out)
            .into_iter::<Value>()
            .map(Result::unwrap)
            .collect();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0], header);
        let inner = decode_data(&values[1]);
        assert_eq!(inner["profiles"].as_array().unwrap().last(), Some(&json!("custom-x")));
    }

    #[test]
    fn test_broken_stream_abandoned() {
        let classifier = Classifier::default();
        assert!(patch_stream(r#"{"data":"x","messageid":1} {"#, &classifier).is_none());
    }
}
