//! Form processing

use crate::logging::trace;
use crate::Error;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// Parse URL-encoded form data
pub fn parse_form<T: DeserializeOwned>(body: &[u8]) -> Result<T, Error> {
    serde_urlencoded::from_bytes(body)
        .map_err(|e| Error::Deserialization(format!("Failed to parse form data: {}", e)))
}

/// Parse URL-encoded form data into ordered pairs
pub fn parse_form_pairs(body: &[u8]) -> Result<Vec<(String, String)>, Error> {
    serde_urlencoded::from_bytes(body)
        .map_err(|e| Error::Deserialization(format!("Failed to parse form data: {}", e)))
}

/// Decode a form body onto `T::default()`, one field at a time.
///
/// Each form field that names a field of `T` is converted to the JSON shape
/// of that field's current value; the assignment is kept only if `T` still
/// decodes afterwards. Unknown and unconvertible fields are dropped.
pub fn decode_lenient<T>(body: &[u8]) -> Result<T, Error>
where
    T: DeserializeOwned + Serialize + Default,
{
    let pairs = parse_form_pairs(body)?;
    let seed = serde_json::to_value(T::default())
        .map_err(|e| Error::Serialization(e.to_string()))?;

    let Value::Object(mut fields) = seed else {
        return parse_form(body);
    };

    for (key, raw) in pairs {
        let Some(current) = fields.get(&key).cloned() else {
            trace!(field = %key, "Skipping unmatched form field");
            continue;
        };

        let accepted = candidates(&current, &raw).into_iter().find_map(|candidate| {
            let mut trial = fields.clone();
            trial.insert(key.clone(), candidate);
            decodes::<T>(&trial).then_some(trial)
        });

        match accepted {
            Some(trial) => fields = trial,
            None => trace!(field = %key, "Skipping unconvertible form field"),
        }
    }

    serde_json::from_value(Value::Object(fields))
        .map_err(|e| Error::Deserialization(e.to_string()))
}

fn decodes<T: DeserializeOwned>(fields: &Map<String, Value>) -> bool {
    serde_json::from_value::<T>(Value::Object(fields.clone())).is_ok()
}

/// JSON shapes worth trying for a raw form value, given the field's current value
fn candidates(current: &Value, raw: &str) -> Vec<Value> {
    let number = || -> Option<Value> {
        raw.parse::<i64>()
            .map(Value::from)
            .or_else(|_| raw.parse::<u64>().map(Value::from))
            .ok()
            .or_else(|| raw.parse::<f64>().ok().and_then(|f| serde_json::Number::from_f64(f).map(Value::Number)))
    };
    let boolean = || -> Option<Value> {
        match raw.to_ascii_lowercase().as_str() {
            "true" | "on" | "1" => Some(Value::Bool(true)),
            "false" | "off" | "0" => Some(Value::Bool(false)),
            _ => None,
        }
    };

    match current {
        Value::Number(_) => number().into_iter().collect(),
        Value::Bool(_) => boolean().into_iter().collect(),
        Value::String(_) => vec![Value::String(raw.to_string())],
        Value::Null => number()
            .into_iter()
            .chain(boolean())
            .chain(std::iter::once(Value::String(raw.to_string())))
            .collect(),
        Value::Array(_) | Value::Object(_) => serde_json::from_str(raw).into_iter().collect(),
    }
}
