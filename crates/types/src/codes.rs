//! Compute resource declarations for named codes.
//!
//! A resource tab declares a [`CodeConfig`] per code name. Users may override
//! any field except the option list; overrides arrive as [`CodeOverride`]
//! values where every field is optional. Node and CPU counts are coerced on
//! the way in: anything that does not parse to a positive integer becomes
//! [`DEFAULT_COUNT`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Count substituted for non-numeric or non-positive node/CPU input.
pub const DEFAULT_COUNT: u32 = 1;

/// Fully specified resource selection for one code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeConfig {
    /// Selected code label (for example `qe-7.2-pw@localhost`).
    #[serde(default)]
    pub label: String,
    #[serde(default = "default_count", deserialize_with = "deserialize_count")]
    pub nodes: u32,
    #[serde(default = "default_count", deserialize_with = "deserialize_count")]
    pub cpus: u32,
    /// Labels the user may choose from. Never taken from user overrides.
    #[serde(rename = "codeOptions", default)]
    pub code_options: Vec<String>,
    /// AiiDA input plugin the code must provide.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_plugin: Option<String>,
}

impl CodeConfig {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            nodes: DEFAULT_COUNT,
            cpus: DEFAULT_COUNT,
            code_options: Vec::new(),
            input_plugin: None,
        }
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.code_options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_input_plugin(mut self, plugin: impl Into<String>) -> Self {
        self.input_plugin = Some(plugin.into());
        self
    }
}

/// Partial resource selection entered by the user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_count", skip_serializing_if = "Option::is_none")]
    pub nodes: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_optional_count", skip_serializing_if = "Option::is_none")]
    pub cpus: Option<u32>,
    #[serde(rename = "codeOptions", default, skip_serializing_if = "Option::is_none")]
    pub code_options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_plugin: Option<String>,
}

impl CodeOverride {
    /// Applies the override on top of `defaults`. The option list always comes
    /// from `defaults`.
    pub fn apply_to(&self, defaults: &CodeConfig) -> CodeConfig {
        CodeConfig {
            label: self.label.clone().unwrap_or_else(|| defaults.label.clone()),
            nodes: self.nodes.unwrap_or(defaults.nodes),
            cpus: self.cpus.unwrap_or(defaults.cpus),
            code_options: defaults.code_options.clone(),
            input_plugin: self.input_plugin.clone().or_else(|| defaults.input_plugin.clone()),
        }
    }

    /// Materialises an override that has no declared default.
    pub fn into_config(self) -> CodeConfig {
        CodeConfig {
            label: self.label.unwrap_or_default(),
            nodes: self.nodes.unwrap_or(DEFAULT_COUNT),
            cpus: self.cpus.unwrap_or(DEFAULT_COUNT),
            code_options: self.code_options.unwrap_or_default(),
            input_plugin: self.input_plugin,
        }
    }
}

impl From<CodeConfig> for CodeOverride {
    fn from(config: CodeConfig) -> Self {
        Self {
            label: Some(config.label),
            nodes: Some(config.nodes),
            cpus: Some(config.cpus),
            code_options: Some(config.code_options),
            input_plugin: config.input_plugin,
        }
    }
}

/// Coerces user input into a positive node/CPU count.
///
/// Strings are read like `parseInt(value, 10)`: leading whitespace and an
/// optional sign are accepted, then the leading run of digits is used.
/// Numbers are truncated. Anything else, zero, or a negative value yields
/// [`DEFAULT_COUNT`].
///
/// ```rust
/// use qeapp_types::coerce_count;
/// use serde_json::json;
///
/// assert_eq!(coerce_count(&json!("3")), 3);
/// assert_eq!(coerce_count(&json!("12 cores")), 12);
/// assert_eq!(coerce_count(&json!(4.9)), 4);
/// assert_eq!(coerce_count(&json!("-1")), 1);
/// assert_eq!(coerce_count(&json!("abc")), 1);
/// assert_eq!(coerce_count(&json!("")), 1);
/// ```
pub fn coerce_count(value: &Value) -> u32 {
    let parsed = match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|float| float.is_finite()).map(|float| float.trunc() as i64)),
        Value::String(text) => parse_int_prefix(text),
        _ => None,
    };

    match parsed {
        Some(count) if count > 0 => u32::try_from(count).unwrap_or(u32::MAX),
        _ => DEFAULT_COUNT,
    }
}

fn parse_int_prefix(text: &str) -> Option<i64> {
    let trimmed = text.trim_start();
    let (negative, unsigned) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let digit_count = unsigned.bytes().take_while(u8::is_ascii_digit).count();
    if digit_count == 0 {
        return None;
    }

    let magnitude = unsigned[..digit_count].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

fn default_count() -> u32 {
    DEFAULT_COUNT
}

fn deserialize_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_count(&value))
}

fn deserialize_optional_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => None,
        other => Some(coerce_count(&other)),
    })
}
