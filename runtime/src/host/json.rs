//! Conversion between host values and `serde_json::Value`.
//!
//! Follows structured-encode semantics: functions and deferreds are dropped
//! from objects and become `null` inside arrays, non-finite numbers encode as
//! `null`, and a cycle is an error instead of unbounded recursion.

use crate::error::{HostError, HostResult};
use crate::host::value::{HostValue, ObjectRef};
use serde_json::{Map, Number, Value};

/// Build a fresh host graph from decoded JSON.
pub fn from_json(value: &Value) -> HostValue {
    match value {
        Value::Null => HostValue::Null,
        Value::Bool(b) => HostValue::Bool(*b),
        Value::Number(n) => HostValue::Number(n.as_f64().unwrap_or(f64::NAN)),
        Value::String(s) => HostValue::String(s.clone()),
        Value::Array(items) => HostValue::Array(items.iter().map(from_json).collect()),
        Value::Object(map) => HostValue::Object(ObjectRef::from_entries(
            map.iter().map(|(k, v)| (k.clone(), from_json(v))),
        )),
    }
}

/// Encode a host value. Top-level functions and deferreds encode as `null`.
pub fn to_json(value: &HostValue) -> HostResult<Value> {
    let mut ancestors = Vec::new();
    Ok(encode(value, &mut ancestors)?.unwrap_or(Value::Null))
}

fn encode(value: &HostValue, ancestors: &mut Vec<usize>) -> HostResult<Option<Value>> {
    let encoded = match value {
        HostValue::Null => Value::Null,
        HostValue::Bool(b) => Value::Bool(*b),
        HostValue::Number(n) => number(*n),
        HostValue::String(s) => Value::String(s.clone()),
        HostValue::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(encode(item, ancestors)?.unwrap_or(Value::Null));
            }
            Value::Array(out)
        }
        HostValue::Object(obj) => {
            let id = obj.id();
            if ancestors.contains(&id) {
                return Err(HostError::Circular);
            }
            ancestors.push(id);
            let mut map = Map::new();
            for (key, child) in obj.entries()? {
                if let Some(v) = encode(&child, ancestors)? {
                    map.insert(key, v);
                }
            }
            ancestors.pop();
            Value::Object(map)
        }
        HostValue::Function(_) | HostValue::Deferred(_) => return Ok(None),
    };
    Ok(Some(encoded))
}

/// 2^63: integral values below this in magnitude fit an `i64` exactly.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;
/// 2^64.
const U64_BOUND: f64 = 18_446_744_073_709_551_616.0;

/// Integral values encode as digits without a fractional part, the way the
/// host prints them, as far as a 64-bit integer reaches.
fn number(n: f64) -> Value {
    if !n.is_finite() {
        return Value::Null;
    }
    if n.fract() == 0.0 {
        if n.abs() < I64_BOUND {
            return Value::Number(Number::from(n as i64));
        }
        if n > 0.0 && n < U64_BOUND {
            return Value::Number(Number::from(n as u64));
        }
    }
    Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::value::HostFunction;
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    #[test]
    fn test_round_trip_keeps_key_order() {
        let input = json!({"z": 1, "a": [1, 2.5, "x"], "m": {"k": null}});
        let host = from_json(&input);
        let out = to_json(&host).unwrap();
        assert_eq!(
            serde_json::to_string(&out).unwrap(),
            r#"{"z":1,"a":[1,2.5,"x"],"m":{"k":null}}"#
        );
    }

    #[test]
    fn test_functions_are_skipped() {
        let f = HostFunction::new("noop", |_| Ok(HostValue::Null));
        let host = HostValue::object([
            ("keep", HostValue::from(1)),
            ("method", HostValue::Function(f.clone())),
            ("list", HostValue::Array(vec![HostValue::Function(f)])),
        ]);
        assert_json_eq!(to_json(&host).unwrap(), json!({"keep": 1, "list": [null]}));
    }

    #[test]
    fn test_cycle_is_an_error() {
        let obj = ObjectRef::new();
        obj.set("self", HostValue::Object(obj.clone())).unwrap();
        assert_eq!(to_json(&HostValue::Object(obj)), Err(HostError::Circular));
    }

    #[test]
    fn test_shared_but_acyclic_is_fine() {
        let shared = ObjectRef::from_entries([("v", HostValue::from(1))]);
        let host = HostValue::object([
            ("a", HostValue::Object(shared.clone())),
            ("b", HostValue::Object(shared)),
        ]);
        assert_json_eq!(to_json(&host).unwrap(), json!({"a": {"v": 1}, "b": {"v": 1}}));
    }

    #[test]
    fn test_large_integers_print_as_digits() {
        let host = from_json(&json!({"id": 81234567890123456u64, "big": 10_000_000_000_000_000_000u64}));
        assert_eq!(
            serde_json::to_string(&to_json(&host).unwrap()).unwrap(),
            r#"{"id":81234567890123456,"big":10000000000000000000}"#
        );
        assert_eq!(
            to_json(&HostValue::Number(-(2f64.powi(60)))).unwrap(),
            json!(-1_152_921_504_606_846_976i64)
        );
    }

    #[test]
    fn test_non_finite_numbers_encode_as_null() {
        assert_eq!(to_json(&HostValue::Number(f64::NAN)).unwrap(), Value::Null);
        assert_eq!(to_json(&HostValue::Number(16000.0)).unwrap(), json!(16000));
    }
}
