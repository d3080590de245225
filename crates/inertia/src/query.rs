//! Folding GET payloads into the query string.

use crate::visit::Method;
use core::str::FromStr;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

/// How arrays are spelled in query strings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrayFormat {
    /// `tags[]=a&tags[]=b`
    #[default]
    Brackets,
    /// `tags[0]=a&tags[1]=b`
    Indices,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown array format `{0}` (expected `brackets` or `indices`)")]
pub struct ParseArrayFormatError(String);

impl FromStr for ArrayFormat {
    type Err = ParseArrayFormatError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "brackets" => Ok(Self::Brackets),
            "indices" => Ok(Self::Indices),
            other => Err(ParseArrayFormatError(other.to_owned())),
        }
    }
}

/// Merge `data` into the query of `url` for GET visits.
///
/// Returns the target URL and whatever data is left for the body. The
/// existing query is parsed into nested values and `data` is deep-merged into
/// it: objects merge key by key, anything else in the payload overwrites.
/// Non-GET visits and empty payloads pass through untouched.
pub fn merge_data_into_query_string(
    method: Method,
    url: &Url,
    data: Map<String, Value>,
    format: ArrayFormat,
) -> (Url, Map<String, Value>) {
    if !method.is_get() || data.is_empty() {
        return (url.clone(), data);
    }

    let mut query = parse_query(url.query().unwrap_or_default());
    deep_merge(&mut query, data);

    let mut merged = url.clone();
    if query.is_empty() {
        merged.set_query(None);
    } else {
        merged.set_query(Some(&to_query_string(&query, format)));
    }
    (merged, Map::new())
}

/// Serialize `data` as `key=value` pairs joined by `&`.
pub fn to_query_string(data: &Map<String, Value>, format: ArrayFormat) -> String {
    encode_pairs(data, format).join("&")
}

/// Parse `a[b][]=c` style pairs into nested values.
pub fn parse_query(query: &str) -> Map<String, Value> {
    let mut root = Value::Object(Map::new());
    for segment in query.split('&').filter(|segment| !segment.is_empty()) {
        let (raw_key, raw_value) = segment.split_once('=').unwrap_or((segment, ""));
        let key = decode(raw_key);
        if key.is_empty() {
            continue;
        }
        assign(&mut root, &key_path(&key), Value::String(decode(raw_value)));
    }
    match root {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced).map_or_else(|_| spaced.clone(), |cow| cow.into_owned())
}

/// `filter[kind][]` becomes `["filter", "kind", ""]`.
fn key_path(key: &str) -> Vec<String> {
    let (root, mut rest) = key.split_once('[').unwrap_or((key, ""));
    let mut path = vec![root.to_owned()];
    while let Some((segment, after)) = rest.split_once(']') {
        path.push(segment.to_owned());
        rest = after.strip_prefix('[').unwrap_or_default();
    }
    path
}

fn is_index(segment: &str) -> bool {
    segment.is_empty() || segment.bytes().all(|byte| byte.is_ascii_digit())
}

fn assign(target: &mut Value, path: &[String], value: Value) {
    let Some((segment, rest)) = path.split_first() else {
        *target = value;
        return;
    };
    if !target.is_object() && !target.is_array() {
        *target = if is_index(segment) {
            Value::Array(Vec::new())
        } else {
            Value::Object(Map::new())
        };
    }
    if let Value::Array(items) = target {
        if segment.is_empty() {
            items.push(Value::Null);
            if let Some(last) = items.last_mut() {
                assign(last, rest, value);
            }
            return;
        }
        if let Ok(index) = segment.parse::<usize>() {
            if items.len() <= index {
                items.resize(index + 1, Value::Null);
            }
            if let Some(slot) = items.get_mut(index) {
                assign(slot, rest, value);
            }
            return;
        }
        let keyed = items
            .drain(..)
            .enumerate()
            .map(|(index, item)| (index.to_string(), item))
            .collect();
        *target = Value::Object(keyed);
    }
    if let Value::Object(entries) = target {
        let child = entries.entry(segment.clone()).or_insert(Value::Null);
        assign(child, rest, value);
    }
}

fn deep_merge(target: &mut Map<String, Value>, incoming: Map<String, Value>) {
    for (key, value) in incoming {
        match value {
            Value::Object(nested) if target.get(&key).is_some_and(Value::is_object) => {
                if let Some(Value::Object(existing)) = target.get_mut(&key) {
                    deep_merge(existing, nested);
                }
            }
            other => {
                target.insert(key, other);
            }
        }
    }
}

fn encode_pairs(data: &Map<String, Value>, format: ArrayFormat) -> Vec<String> {
    let mut pairs = Vec::new();
    for (key, value) in data {
        push_pairs(&mut pairs, key, value, format);
    }
    pairs
}

fn push_pairs(pairs: &mut Vec<String>, prefix: &str, value: &Value, format: ArrayFormat) {
    match value {
        Value::Object(entries) => {
            for (key, nested) in entries {
                push_pairs(pairs, &format!("{prefix}[{key}]"), nested, format);
            }
        }
        Value::Array(items) => {
            for (index, nested) in items.iter().enumerate() {
                let key = match format {
                    ArrayFormat::Brackets => format!("{prefix}[]"),
                    ArrayFormat::Indices => format!("{prefix}[{index}]"),
                };
                push_pairs(pairs, &key, nested, format);
            }
        }
        Value::Null => pairs.push(format!("{prefix}=")),
        Value::String(text) => pairs.push(format!("{prefix}={}", urlencoding::encode(text))),
        Value::Bool(flag) => pairs.push(format!("{prefix}={flag}")),
        Value::Number(number) => pairs.push(format!("{prefix}={number}")),
    }
}
