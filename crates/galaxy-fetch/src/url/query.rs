//! Query string values, encoding and decoding

use std::borrow::Cow;
use std::fmt;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use serde_json::{Number, Value};

/// Characters escaped in a query value.
///
/// Starts from the set escaped in whole URLs and additionally escapes the
/// characters that carry meaning inside a query string (`+`, `#`, `&`, `/`).
/// Pipe, backtick and caret are kept as-is.
const QUERY_VALUE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'{')
    .add(b'}')
    .add(b'+')
    .add(b'#')
    .add(b'&')
    .add(b'/');

/// Query keys additionally escape `=`
const QUERY_KEY_SET: &AsciiSet = &QUERY_VALUE_SET.add(b'=');

/// Keys never accepted from a parsed query string
const FORBIDDEN_KEYS: [&str; 2] = ["__proto__", "constructor"];

/// A single query parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    /// Key is present but has no value; dropped when the query is stringified
    Undefined,
    /// Null, rendered as a bare key
    Null,
    /// Boolean; `false` renders as a bare key
    Bool(bool),
    /// Number; zero renders as a bare key
    Number(Number),
    /// String
    String(String),
    /// Repeated key
    List(Vec<QueryValue>),
    /// Structured value, rendered as its JSON text
    Json(Value),
}

impl QueryValue {
    /// Text of this value when it is a list element or a structured value
    fn json_text(&self) -> String {
        match self {
            QueryValue::Undefined => "undefined".to_string(),
            QueryValue::Null => "null".to_string(),
            QueryValue::Bool(b) => b.to_string(),
            QueryValue::Number(n) => number_text(n),
            QueryValue::String(s) => s.clone(),
            QueryValue::List(items) => {
                let items: Vec<Value> = items.iter().map(QueryValue::to_json).collect();
                Value::Array(items).to_string()
            }
            QueryValue::Json(v) => v.to_string(),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            QueryValue::Undefined | QueryValue::Null => Value::Null,
            QueryValue::Bool(b) => Value::Bool(*b),
            QueryValue::Number(n) => Value::Number(n.clone()),
            QueryValue::String(s) => Value::String(s.clone()),
            QueryValue::List(items) => Value::Array(items.iter().map(QueryValue::to_json).collect()),
            QueryValue::Json(v) => v.clone(),
        }
    }

    /// The value as a string slice, if it is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            QueryValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Integral floats render without a fractional part
fn number_text(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e21 => format!("{}", f as i64),
        _ => n.to_string(),
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::String(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::String(value)
    }
}

impl From<&String> for QueryValue {
    fn from(value: &String) -> Self {
        QueryValue::String(value.clone())
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        QueryValue::Bool(value)
    }
}

macro_rules! impl_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for QueryValue {
                fn from(value: $t) -> Self {
                    QueryValue::Number(Number::from(value))
                }
            }
        )*
    };
}

impl_from_integer!(i32, i64, u16, u32, u64, usize);

impl From<f64> for QueryValue {
    fn from(value: f64) -> Self {
        match Number::from_f64(value) {
            Some(n) => QueryValue::Number(n),
            None if value.is_nan() => QueryValue::String("NaN".to_string()),
            None if value > 0.0 => QueryValue::String("Infinity".to_string()),
            None => QueryValue::String("-Infinity".to_string()),
        }
    }
}

impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(QueryValue::Undefined)
    }
}

impl<T: Into<QueryValue>> From<Vec<T>> for QueryValue {
    fn from(values: Vec<T>) -> Self {
        QueryValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl From<Value> for QueryValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => QueryValue::Null,
            Value::Bool(b) => QueryValue::Bool(b),
            Value::Number(n) => QueryValue::Number(n),
            Value::String(s) => QueryValue::String(s),
            Value::Array(items) => QueryValue::List(items.into_iter().map(Into::into).collect()),
            object @ Value::Object(_) => QueryValue::Json(object),
        }
    }
}

/// Ordered query parameter mapping
///
/// Inserting a key that already exists replaces its value in place, so the
/// key keeps its original position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query(Vec<(String, QueryValue)>);

impl Query {
    /// Empty query
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing any previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    /// Builder form of [`Query::insert`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Value of `key`
    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Whether `key` is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Shallow merge: keys of `other` win
    pub fn merge(&mut self, other: &Query) {
        for (key, value) in other.iter() {
            self.insert(key.clone(), value.clone());
        }
    }

    /// Iterate over entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &(String, QueryValue)> {
        self.0.iter()
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no keys
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Query
where
    K: Into<String>,
    V: Into<QueryValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut query = Query::new();
        for (key, value) in iter {
            query.insert(key, value);
        }
        query
    }
}

impl IntoIterator for Query {
    type Item = (String, QueryValue);
    type IntoIter = std::vec::IntoIter<(String, QueryValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&stringify_query(self))
    }
}

/// Encode a query value
pub fn encode_query_value(text: &str) -> String {
    utf8_percent_encode(text, QUERY_VALUE_SET)
        .to_string()
        .replace("%20", "+")
}

/// Encode a query key
pub fn encode_query_key(text: &str) -> String {
    utf8_percent_encode(text, QUERY_KEY_SET)
        .to_string()
        .replace("%20", "+")
}

/// Percent-decode `text`, returning it unchanged when it is malformed
pub fn decode(text: &str) -> String {
    if has_malformed_escape(text) {
        return text.to_string();
    }
    percent_decode_str(text)
        .decode_utf8()
        .map(Cow::into_owned)
        .unwrap_or_else(|_| text.to_string())
}

fn has_malformed_escape(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.iter().enumerate().any(|(i, b)| {
        *b == b'%'
            && !(bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
                && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit))
    })
}

/// Decode a query key or value (`+` is a space)
pub fn decode_query_component(text: &str) -> String {
    decode(&text.replace('+', " "))
}

/// Parse a query string (with or without the leading `?`)
///
/// Values may contain `=`; repeated keys accumulate into a list.
pub fn parse_query(input: &str) -> Query {
    let input = input.strip_prefix('?').unwrap_or(input);
    let mut query = Query::new();

    for parameter in input.split('&') {
        let parameter = parameter.trim_start_matches('=');
        if parameter.is_empty() {
            continue;
        }
        let (key, value) = parameter.split_once('=').unwrap_or((parameter, ""));
        let key = decode_query_component(key);
        if FORBIDDEN_KEYS.contains(&key.as_str()) {
            continue;
        }
        let value = QueryValue::String(decode_query_component(value));

        match query.0.iter_mut().find(|(k, _)| *k == key) {
            None => query.0.push((key, value)),
            Some((_, QueryValue::List(items))) => items.push(value),
            Some((_, existing)) => {
                let first = std::mem::replace(existing, QueryValue::Undefined);
                *existing = QueryValue::List(vec![first, value]);
            }
        }
    }

    query
}

/// Encode one `key=value` item; an empty string means nothing to render
pub fn encode_query_item(key: &str, value: &QueryValue) -> String {
    let encoded_key = encode_query_key(key);
    match value {
        QueryValue::Undefined | QueryValue::Null => encoded_key,
        QueryValue::String(s) if s.is_empty() => encoded_key,
        QueryValue::Bool(false) => encoded_key,
        QueryValue::Number(n) if n.as_f64() == Some(0.0) => encoded_key,
        QueryValue::String(s) => format!("{}={}", encoded_key, encode_query_value(s)),
        QueryValue::Bool(_) | QueryValue::Number(_) | QueryValue::Json(_) => {
            format!("{}={}", encoded_key, encode_query_value(&value.json_text()))
        }
        QueryValue::List(items) => items
            .iter()
            .map(|item| format!("{}={}", encoded_key, encode_query_value(&item.json_text())))
            .collect::<Vec<_>>()
            .join("&"),
    }
}

/// Render a query mapping, dropping undefined values
pub fn stringify_query(query: &Query) -> String {
    query
        .iter()
        .filter(|(_, value)| !matches!(value, QueryValue::Undefined))
        .map(|(key, value)| encode_query_item(key, value))
        .filter(|item| !item.is_empty())
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_encode_query_value_escapes() {
        assert_eq!(encode_query_value("a b"), "a+b");
        assert_eq!(encode_query_value("1+1"), "1%2B1");
        assert_eq!(encode_query_value("a#b"), "a%23b");
        assert_eq!(encode_query_value("a&b"), "a%26b");
        assert_eq!(encode_query_value("a/b"), "a%2Fb");
        assert_eq!(encode_query_value("a|b`c^d"), "a|b`c^d");
        assert_eq!(encode_query_value("a=b"), "a=b");
        assert_eq!(encode_query_value("é"), "%C3%A9");
    }

    #[test]
    fn test_encode_query_key_escapes_equal() {
        assert_eq!(encode_query_key("a=b"), "a%3Db");
    }

    #[test]
    fn test_stringify_scalars() {
        let query = Query::new()
            .with("a", "x")
            .with("b", 1)
            .with("c", true)
            .with("d", false)
            .with("e", "")
            .with("f", QueryValue::Null)
            .with("g", QueryValue::Undefined)
            .with("h", 0);
        assert_eq!(stringify_query(&query), "a=x&b=1&c=true&d&e&f&h");
    }

    #[test]
    fn test_stringify_list_and_object() {
        let query = Query::new()
            .with("tag", vec!["x", "y"])
            .with("empty", Vec::<String>::new())
            .with("obj", json!({"k": 1}));
        assert_eq!(
            stringify_query(&query),
            "tag=x&tag=y&obj=%7B%22k%22:1%7D"
        );
    }

    #[test]
    fn test_float_renders_like_integer() {
        let query = Query::new().with("n", 2.0).with("m", 2.5);
        assert_eq!(stringify_query(&query), "n=2&m=2.5");
    }

    #[test]
    fn test_parse_query_basic() {
        let query = parse_query("?a=1&b=x%20y&c=a+b&d");
        assert_eq!(query.get("a"), Some(&QueryValue::from("1")));
        assert_eq!(query.get("b"), Some(&QueryValue::from("x y")));
        assert_eq!(query.get("c"), Some(&QueryValue::from("a b")));
        assert_eq!(query.get("d"), Some(&QueryValue::from("")));
    }

    #[test]
    fn test_parse_query_value_keeps_equals() {
        let query = parse_query("token=abc==");
        assert_eq!(query.get("token"), Some(&QueryValue::from("abc==")));
    }

    #[test]
    fn test_parse_query_repeated_keys() {
        let query = parse_query("a=1&a=2&a=3");
        assert_eq!(query.get("a"), Some(&QueryValue::from(vec!["1", "2", "3"])));
    }

    #[test]
    fn test_parse_query_drops_dangerous_keys() {
        let query = parse_query("__proto__=1&constructor=2&ok=3");
        assert_eq!(query.len(), 1);
        assert!(query.contains_key("ok"));
    }

    #[test]
    fn test_parse_query_malformed_escape() {
        let query = parse_query("a=%zz");
        assert_eq!(query.get("a"), Some(&QueryValue::from("%zz")));
    }

    #[test]
    fn test_insert_keeps_position() {
        let mut query = Query::new().with("a", 1).with("b", 2);
        query.insert("a", 3);
        assert_eq!(stringify_query(&query), "a=3&b=2");
    }
}
