//! Safe JSON decoding of response text
//!
//! Decoding never fails in the default mode: text that does not look like
//! JSON, or that fails to parse, is handed back as a string value. Object keys
//! that could poison a JavaScript consumer of the decoded value (`__proto__`,
//! and `constructor` objects carrying a `prototype`) are dropped.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::DecodeError;

/// Matches `"__proto__":`, including `\u00XX`-escaped spellings
static SUSPECT_PROTO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#""(?:_|\\u0{2}5[Ff]){2}(?:p|\\u0{2}70)(?:r|\\u0{2}72)(?:o|\\u0{2}6[Ff])(?:t|\\u0{2}74)(?:o|\\u0{2}6[Ff])(?:_|\\u0{2}5[Ff]){2}"\s*:"#,
    )
    .expect("valid proto regex")
});

/// Matches `"constructor":`, including `\u00XX`-escaped spellings
static SUSPECT_CONSTRUCTOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#""(?:c|\\u0063)(?:o|\\u006[Ff])(?:n|\\u006[Ee])(?:s|\\u0073)(?:t|\\u0074)(?:r|\\u0072)(?:u|\\u0075)(?:c|\\u0063)(?:t|\\u0074)(?:o|\\u006[Ff])(?:r|\\u0072)"\s*:"#,
    )
    .expect("valid constructor regex")
});

/// Cheap check that the text could be a JSON document
static JSON_SIGNATURE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*["\[{]|^\s*-?[0-9]{1,16}(\.[0-9]{1,17})?([Ee][+-]?[0-9]+)?\s*$"#)
        .expect("valid json signature regex")
});

/// Result of decoding response text
///
/// JSON has no representation for `undefined` or non-finite numbers, so
/// those literals get their own variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// `undefined`
    Undefined,
    /// `NaN`
    NaN,
    /// `Infinity`
    Infinity,
    /// `-Infinity`
    NegInfinity,
    /// Any JSON value, including raw text that was not decoded
    Value(Value),
}

impl Decoded {
    /// The JSON value, if this is one
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Decoded::Value(value) => Some(value),
            _ => None,
        }
    }

    /// The string, if the decoded value is one
    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    /// Convert into a JSON value; `undefined` and non-finite numbers become `null`
    pub fn into_value(self) -> Value {
        match self {
            Decoded::Value(value) => value,
            _ => Value::Null,
        }
    }

    /// Same as [`Decoded::into_value`] without consuming
    pub fn to_value(&self) -> Value {
        self.clone().into_value()
    }

    /// As a float, for the non-finite literals and JSON numbers
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Decoded::NaN => Some(f64::NAN),
            Decoded::Infinity => Some(f64::INFINITY),
            Decoded::NegInfinity => Some(f64::NEG_INFINITY),
            Decoded::Value(value) => value.as_f64(),
            Decoded::Undefined => None,
        }
    }
}

impl From<Value> for Decoded {
    fn from(value: Value) -> Self {
        Decoded::Value(value)
    }
}

/// Decode `text`, falling back to the raw text on anything that is not JSON
pub fn decode(text: &str) -> Decoded {
    match decode_inner(text, false) {
        Ok(decoded) => decoded,
        Err(_) => raw(text),
    }
}

/// Decode `text`, reporting non-JSON input and suspicious keys as errors
pub fn decode_strict(text: &str) -> Result<Decoded, DecodeError> {
    decode_inner(text, true)
}

/// Decode an already-structured value
///
/// Only string values are decoded; anything else is returned as-is.
pub fn decode_value(value: Value) -> Decoded {
    match value {
        Value::String(text) => decode(&text),
        other => Decoded::Value(other),
    }
}

fn raw(text: &str) -> Decoded {
    Decoded::Value(Value::String(text.to_string()))
}

fn decode_inner(text: &str, strict: bool) -> Result<Decoded, DecodeError> {
    let trimmed = text.trim();

    if text.starts_with('"') && text.ends_with('"') && !text.contains('\\') {
        let unquoted = trimmed
            .get(1..trimmed.len().saturating_sub(1))
            .unwrap_or_default();
        return Ok(Decoded::Value(Value::String(unquoted.to_string())));
    }

    if trimmed.chars().count() <= 9 {
        match trimmed.to_lowercase().as_str() {
            "true" => return Ok(Decoded::Value(Value::Bool(true))),
            "false" => return Ok(Decoded::Value(Value::Bool(false))),
            "undefined" => return Ok(Decoded::Undefined),
            "null" => return Ok(Decoded::Value(Value::Null)),
            "nan" => return Ok(Decoded::NaN),
            "infinity" => return Ok(Decoded::Infinity),
            "-infinity" => return Ok(Decoded::NegInfinity),
            _ => {}
        }
    }

    if !JSON_SIGNATURE_RE.is_match(text) {
        if strict {
            return Err(DecodeError::InvalidJson);
        }
        return Ok(raw(text));
    }

    if SUSPECT_PROTO_RE.is_match(text) || SUSPECT_CONSTRUCTOR_RE.is_match(text) {
        if strict {
            return Err(DecodeError::PrototypePollution);
        }
        let value: Value = serde_json::from_str(text)?;
        return Ok(Decoded::Value(strip_dangerous_keys(value)));
    }

    Ok(Decoded::Value(serde_json::from_str(text)?))
}

/// Remove poisoning keys, innermost values first
fn strip_dangerous_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut clean = Map::with_capacity(map.len());
            for (key, value) in map {
                let value = strip_dangerous_keys(value);
                if is_dangerous(&key, &value) {
                    tracing::warn!("Dropping \"{}\" key to prevent prototype pollution", key);
                    continue;
                }
                clean.insert(key, value);
            }
            Value::Object(clean)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(strip_dangerous_keys).collect()),
        other => other,
    }
}

fn is_dangerous(key: &str, value: &Value) -> bool {
    match key {
        "__proto__" => true,
        "constructor" => value
            .as_object()
            .is_some_and(|object| object.contains_key("prototype")),
        _ => false,
    }
}
