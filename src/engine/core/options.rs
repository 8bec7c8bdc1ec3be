//! Encoder options in the three shapes callers hand us.
//!
//! A caller either builds an [`EncodingOptions`] mapping, passes a key/value
//! collection that gets normalized into one, or passes a literal option
//! string that is forwarded untouched. [`OptionSet`] is the tagged union of
//! the mapping and literal forms; anything else is rejected when the set is
//! constructed, never when the command is built.

use super::error::EncodeError;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

/// Keys rendered ahead of everything else so codec selection precedes
/// codec-specific flags on the command line.
const CODEC_KEYS: &[&str] = &["video_codec", "audio_codec"];

/// A single option value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl OptionValue {
    /// Numeric view of the value; text is parsed leniently.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for OptionValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Insertion-ordered mapping of encoder option names to values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodingOptions {
    entries: Vec<(String, OptionValue)>,
}

impl EncodingOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing an existing entry in place so its position is kept.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &str) -> Option<OptionValue> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Requested output duration in seconds.
    pub fn duration(&self) -> Option<f64> {
        self.get("duration").and_then(OptionValue::as_f64)
    }

    /// `(width, height)` parsed from a `WxH` resolution entry.
    pub fn resolution(&self) -> Option<(u32, u32)> {
        let value = self.get("resolution")?.to_string();
        let (w, h) = value.trim().split_once(['x', 'X'])?;
        Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
    }

    pub fn width(&self) -> Option<u32> {
        self.resolution().map(|(w, _)| w)
    }

    pub fn height(&self) -> Option<u32> {
        self.resolution().map(|(_, h)| h)
    }

    /// Render the mapping as one space-joined ffmpeg option string.
    pub fn to_option_string(&self) -> String {
        self.rendered_entries().join(" ")
    }

    /// Argv entries, split one rendered entry at a time so a malformed
    /// `custom` value cannot disturb the quoting of its neighbours.
    pub fn to_args(&self) -> Vec<String> {
        self.rendered_entries()
            .iter()
            .flat_map(|entry| split_args(entry))
            .collect()
    }

    /// Each entry's option text, codecs first.
    fn rendered_entries(&self) -> Vec<String> {
        let codecs = self
            .entries
            .iter()
            .filter(|(k, _)| CODEC_KEYS.contains(&k.as_str()));
        let rest = self
            .entries
            .iter()
            .filter(|(k, _)| !CODEC_KEYS.contains(&k.as_str()));

        codecs
            .chain(rest)
            .filter_map(|(k, v)| render_entry(k, v))
            .collect()
    }
}

impl fmt::Display for EncodingOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_option_string())
    }
}

impl<K, V> FromIterator<(K, V)> for EncodingOptions
where
    K: Into<String>,
    V: Into<OptionValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut options = Self::new();
        for (k, v) in iter {
            options.set(k, v);
        }
        options
    }
}

fn render_entry(key: &str, value: &OptionValue) -> Option<String> {
    let raw = value.to_string();
    if key == "custom" {
        let trimmed = raw.trim();
        return (!trimmed.is_empty()).then(|| trimmed.to_string());
    }

    let rendered = match key {
        "video_codec" => format!("-vcodec {}", quote_value(&raw)),
        "audio_codec" => format!("-acodec {}", quote_value(&raw)),
        "resolution" => format!("-s {}", quote_value(&raw)),
        "frame_rate" => format!("-r {}", quote_value(&raw)),
        "video_bitrate" => format!("-b:v {}", quote_value(&with_kilo_suffix(&raw))),
        "audio_bitrate" => format!("-b:a {}", quote_value(&with_kilo_suffix(&raw))),
        "audio_sample_rate" => format!("-ar {}", quote_value(&raw)),
        "audio_channels" => format!("-ac {}", quote_value(&raw)),
        "duration" => format!("-t {}", quote_value(&raw)),
        "threads" => format!("-threads {}", quote_value(&raw)),
        "aspect" => format!("-aspect {}", quote_value(&raw)),
        "pixel_format" => format!("-pix_fmt {}", quote_value(&raw)),
        other => format!("-{} {}", other, quote_value(&raw)),
    };
    Some(rendered)
}

fn with_kilo_suffix(raw: &str) -> String {
    if raw.ends_with(['k', 'K']) {
        raw.to_string()
    } else {
        format!("{}k", raw)
    }
}

/// Shell-style split; unbalanced quotes fall back to whitespace splitting.
fn split_args(rendered: &str) -> Vec<String> {
    shlex::split(rendered)
        .unwrap_or_else(|| rendered.split_whitespace().map(str::to_string).collect())
}

/// Quote a value so `shlex::split` gives it back as a single argument.
fn quote_value(raw: &str) -> Cow<'_, str> {
    shlex::try_quote(raw).unwrap_or(Cow::Borrowed(raw))
}

/// Canonical encoder options: a keyed mapping or an opaque literal string.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionSet {
    Encoding(EncodingOptions),
    Literal(String),
}

impl Default for OptionSet {
    fn default() -> Self {
        Self::Encoding(EncodingOptions::new())
    }
}

impl OptionSet {
    pub fn literal(raw: impl Into<String>) -> Self {
        Self::Literal(raw.into())
    }

    /// Build from ordered key/value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<OptionValue>,
    {
        Self::Encoding(pairs.into_iter().collect())
    }

    /// Build from a dynamically typed value, e.g. options read from a JSON
    /// job description. Strings become literal sets, objects become
    /// mappings, and every other shape is rejected.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, EncodeError> {
        use serde_json::Value;

        match value {
            Value::String(s) => Ok(Self::Literal(s.clone())),
            Value::Object(map) => {
                let mut options = EncodingOptions::new();
                for (key, v) in map {
                    let value = match v {
                        Value::String(s) => OptionValue::Text(s.clone()),
                        Value::Number(n) => match n.as_i64() {
                            Some(i) => OptionValue::Int(i),
                            None => OptionValue::Float(n.as_f64().unwrap_or_default()),
                        },
                        Value::Bool(b) => OptionValue::Text(b.to_string()),
                        other => {
                            return Err(EncodeError::InvalidOptionsFormat {
                                found: format!("{} in option '{}'", json_kind(other), key),
                            });
                        }
                    };
                    options.set(key.clone(), value);
                }
                Ok(Self::Encoding(options))
            }
            other => Err(EncodeError::InvalidOptionsFormat {
                found: json_kind(other).to_string(),
            }),
        }
    }

    /// Same as [`OptionSet::from_json`] for values read from TOML.
    pub fn from_toml(value: &toml::Value) -> Result<Self, EncodeError> {
        let json = serde_json::to_value(value).map_err(|_| EncodeError::InvalidOptionsFormat {
            found: value.type_str().to_string(),
        })?;
        Self::from_json(&json)
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    /// Keyed access; always `None` for the literal form.
    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        match self {
            Self::Encoding(options) => options.get(key),
            Self::Literal(_) => None,
        }
    }

    /// Keyed override. Returns `false` when the set is literal and the
    /// write was dropped.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> bool {
        match self {
            Self::Encoding(options) => {
                options.set(key, value);
                true
            }
            Self::Literal(_) => false,
        }
    }

    pub fn as_encoding(&self) -> Option<&EncodingOptions> {
        match self {
            Self::Encoding(options) => Some(options),
            Self::Literal(_) => None,
        }
    }

    pub fn duration(&self) -> Option<f64> {
        self.as_encoding().and_then(EncodingOptions::duration)
    }

    pub fn to_option_string(&self) -> String {
        match self {
            Self::Encoding(options) => options.to_option_string(),
            Self::Literal(raw) => raw.clone(),
        }
    }

    /// Split the rendered options into argv entries.
    /// Uses shell-style parsing so quoted values with spaces survive.
    pub fn to_args(&self) -> Vec<String> {
        match self {
            Self::Encoding(options) => options.to_args(),
            Self::Literal(raw) => split_args(raw),
        }
    }
}

impl fmt::Display for OptionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_option_string())
    }
}

impl From<EncodingOptions> for OptionSet {
    fn from(options: EncodingOptions) -> Self {
        Self::Encoding(options)
    }
}

impl From<String> for OptionSet {
    fn from(raw: String) -> Self {
        Self::Literal(raw)
    }
}

impl From<&str> for OptionSet {
    fn from(raw: &str) -> Self {
        Self::Literal(raw.to_string())
    }
}

/// Hash maps have no stable order, so keys are sorted to keep rendering
/// deterministic.
impl<V: Into<OptionValue>> From<HashMap<String, V>> for OptionSet {
    fn from(map: HashMap<String, V>) -> Self {
        let mut pairs: Vec<_> = map.into_iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        Self::from_pairs(pairs)
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    use serde_json::Value;

    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
