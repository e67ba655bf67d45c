//! Text extraction from the payload shapes chat endpoints emit.
//!
//! Streaming events and single-shot bodies both go through here. Endpoints in
//! the wild answer with plain text, Ollama-style `{"response": ..}` objects,
//! `{"message": {"content": ..}}`, or OpenAI-style `choices[].delta.content`,
//! so extraction probes the known fields in a fixed priority order.

use serde_json::{Map, Value};

/// Fields holding the fragment directly, in priority order.
const TEXT_FIELDS: [&str; 4] = ["response", "content", "text", "chunk"];

/// Borrowed view of a decoded payload.
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    Text(&'a str),
    Object(&'a Map<String, Value>),
    Array(&'a [Value]),
    /// Numbers, booleans and null never carry a fragment.
    Scalar,
}

impl<'a> From<&'a Value> for Payload<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::String(text) => Payload::Text(text),
            Value::Object(map) => Payload::Object(map),
            Value::Array(items) => Payload::Array(items),
            Value::Null | Value::Bool(_) | Value::Number(_) => Payload::Scalar,
        }
    }
}

impl Payload<'_> {
    /// Returns the first non-empty fragment found in this payload.
    pub fn probe(&self) -> Option<String> {
        match self {
            Payload::Text(text) => non_empty(text),
            Payload::Object(map) => probe_object(map),
            Payload::Array(items) => probe_all(items),
            Payload::Scalar => None,
        }
    }
}

/// Extracts a fragment from a raw payload string.
///
/// The string is decoded as JSON first. Text that is not JSON, or decodes to
/// a bare scalar, is returned literally.
pub fn extract_fragment(raw: &str) -> Option<String> {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => match Payload::from(&value) {
            Payload::Scalar => non_empty(raw),
            payload => payload.probe(),
        },
        Err(e) => {
            log::trace!("payload is not JSON ({e}), using it as text");
            non_empty(raw)
        }
    }
}

/// Extracts a fragment from an already decoded payload.
pub fn extract_text(value: &Value) -> Option<String> {
    Payload::from(value).probe()
}

fn probe_object(map: &Map<String, Value>) -> Option<String> {
    for field in TEXT_FIELDS {
        if let Some(text) = string_field(map, field) {
            return Some(text);
        }
    }

    if let Some(text) = map
        .get("message")
        .and_then(Value::as_object)
        .and_then(|message| string_field(message, "content"))
    {
        return Some(text);
    }

    let delta = match map.get("delta") {
        Some(Value::String(text)) => non_empty(text),
        Some(Value::Object(delta)) => {
            string_field(delta, "content").or_else(|| string_field(delta, "text"))
        }
        _ => None,
    };
    if delta.is_some() {
        return delta;
    }

    match map.get("choices") {
        Some(Value::Array(choices)) => probe_all(choices),
        _ => None,
    }
}

fn probe_all(items: &[Value]) -> Option<String> {
    items.iter().find_map(|item| Payload::from(item).probe())
}

fn string_field(map: &Map<String, Value>, field: &str) -> Option<String> {
    map.get(field).and_then(Value::as_str).and_then(non_empty)
}

fn non_empty(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
