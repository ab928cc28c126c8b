//! Request fingerprints.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::merge::deep_merge;

/// A deterministic key identifying a request by location and options.
///
/// Two requests with the same fingerprint are the same request as far as the
/// cache and deduplication are concerned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint of a location and already-merged options.
    ///
    /// The text is canonical JSON of `{"options": .., "url": ..}` with object
    /// keys sorted at every depth.
    pub fn compute(location: &str, effective_options: Option<&JsonValue>) -> Self {
        let mut out = String::with_capacity(location.len() + 32);
        out.push_str("{\"options\":");
        match effective_options {
            Some(options) => write_canonical(options, &mut out),
            None => out.push_str("null"),
        }
        out.push_str(",\"url\":");
        write_canonical(&JsonValue::String(location.to_string()), &mut out);
        out.push('}');
        Self(out)
    }

    /// Wrap an existing key, e.g. one read back from a serialized cache.
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the key string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Options made available by an ambient request context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ambient<'a> {
    /// No context is present.
    Absent,
    /// A context is present, optionally carrying default options.
    Present(Option<&'a JsonValue>),
}

impl<'a> Ambient<'a> {
    /// Context with default options.
    pub fn with_options(options: &'a JsonValue) -> Self {
        Ambient::Present(Some(options))
    }

    /// Check if a context is present.
    pub fn is_present(&self) -> bool {
        matches!(self, Ambient::Present(_))
    }
}

/// Compute the options a request is actually sent with.
///
/// Instance options are used alone when `ignore_ambient` is set or there are
/// no ambient options; otherwise they are deep-merged over the ambient ones.
pub fn effective_options(
    instance_options: Option<&JsonValue>,
    ambient: Ambient<'_>,
    ignore_ambient: bool,
) -> Option<JsonValue> {
    match ambient {
        Ambient::Present(Some(ambient_options)) if !ignore_ambient => {
            let empty = JsonValue::Object(Default::default());
            Some(deep_merge(ambient_options, instance_options.unwrap_or(&empty)))
        }
        _ => instance_options.cloned(),
    }
}

/// Fingerprint a request.
///
/// Returns `None` when no ambient context is present: such requests are
/// neither cached nor deduplicated.
pub fn fingerprint(
    location: &str,
    instance_options: Option<&JsonValue>,
    ambient: Ambient<'_>,
    ignore_ambient: bool,
) -> Option<Fingerprint> {
    if !ambient.is_present() {
        return None;
    }
    let options = effective_options(instance_options, ambient, ignore_ambient);
    Some(Fingerprint::compute(location, options.as_ref()))
}

fn write_canonical(value: &JsonValue, out: &mut String) {
    match value {
        JsonValue::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        JsonValue::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&JsonValue::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
