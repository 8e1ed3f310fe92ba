//! Merging of declared code defaults with user overrides.
//!
//! Resource tabs store their selection under the `codes` key of their payload.
//! A render first merges the declared defaults with whatever is stored and
//! publishes only when the merge changes something, so repeated renders
//! converge after a single write.

use indexmap::IndexMap;
use qeapp_types::{CodeConfig, CodeOverride, TabData, coerce_count};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Payload key holding the per-code selection.
pub const CODES_KEY: &str = "codes";

/// Merges `overrides` over `defaults`.
///
/// Default keys come first in declaration order, followed by override-only
/// keys. The option list of a declared code is never taken from an override.
pub fn merge_codes(
    defaults: &IndexMap<String, CodeConfig>,
    overrides: &IndexMap<String, CodeOverride>,
) -> IndexMap<String, CodeConfig> {
    let mut merged: IndexMap<String, CodeConfig> = defaults
        .iter()
        .map(|(name, default)| {
            let config = match overrides.get(name) {
                Some(user) => user.apply_to(default),
                None => default.clone(),
            };
            (name.clone(), config)
        })
        .collect();

    for (name, user) in overrides {
        if !merged.contains_key(name) {
            merged.insert(name.clone(), user.clone().into_config());
        }
    }
    merged
}

/// Reads stored overrides from a payload's `codes` value.
///
/// Entries that are not objects are skipped with a warning rather than failing
/// the whole tab.
pub fn overrides_from_value(value: Option<&Value>) -> IndexMap<String, CodeOverride> {
    let Some(Value::Object(entries)) = value else {
        return IndexMap::new();
    };

    let mut overrides = IndexMap::new();
    for (name, entry) in entries {
        match serde_json::from_value::<CodeOverride>(entry.clone()) {
            Ok(user) => {
                overrides.insert(name.clone(), user);
            }
            Err(error) => warn!(code = %name, %error, "ignoring unreadable code override"),
        }
    }
    overrides
}

fn codes_to_value(codes: &IndexMap<String, CodeConfig>) -> Value {
    let entries = codes
        .iter()
        .map(|(name, config)| (name.clone(), serde_json::to_value(config).unwrap_or(Value::Null)))
        .collect();
    Value::Object(entries)
}

/// Returns the payload to publish after merging defaults into `data`, or
/// `None` when the stored `codes` already equal the merge.
pub fn initialize(data: &TabData, defaults: &IndexMap<String, CodeConfig>) -> Option<TabData> {
    let stored = data.get(CODES_KEY);
    let merged = codes_to_value(&merge_codes(defaults, &overrides_from_value(stored)));
    if stored == Some(&merged) {
        return None;
    }

    let mut next = data.clone();
    next.insert(CODES_KEY.to_string(), merged);
    Some(next)
}

/// Editable fields of a code selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeField {
    Label,
    Nodes,
    Cpus,
}

impl CodeField {
    pub fn key(self) -> &'static str {
        match self {
            CodeField::Label => "label",
            CodeField::Nodes => "nodes",
            CodeField::Cpus => "cpus",
        }
    }

    fn coerce(self, raw: &Value) -> Value {
        match self {
            CodeField::Label => match raw {
                Value::String(label) => Value::String(label.clone()),
                Value::Null => Value::String(String::new()),
                other => Value::String(other.to_string()),
            },
            CodeField::Nodes | CodeField::Cpus => Value::from(coerce_count(raw)),
        }
    }
}

/// Returns a new payload with one field of one code replaced. Counts are
/// coerced to a positive integer.
pub fn set_code_field(data: &TabData, code: &str, field: CodeField, raw: &Value) -> TabData {
    let mut codes = data.get(CODES_KEY).and_then(Value::as_object).cloned().unwrap_or_default();
    let mut entry = codes.get(code).and_then(Value::as_object).cloned().unwrap_or_default();
    entry.insert(field.key().to_string(), field.coerce(raw));
    codes.insert(code.to_string(), Value::Object(entry));

    let mut next = data.clone();
    next.insert(CODES_KEY.to_string(), Value::Object(codes));
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::indexmap;
    use serde_json::json;

    fn defaults() -> IndexMap<String, CodeConfig> {
        indexmap! {
            "pw".to_string() => CodeConfig::new("qe-7.2-pw@localhost")
                .with_options(["qe-7.2-pw@localhost", "qe-7.1-pw@remote"]),
            "dos".to_string() => CodeConfig::new("qe-7.2-dos@localhost"),
        }
    }

    #[test]
    fn empty_overrides_yield_defaults() {
        assert_eq!(merge_codes(&defaults(), &IndexMap::new()), defaults());
    }

    #[test]
    fn overrides_apply_field_wise_but_keep_code_options() {
        let overrides = overrides_from_value(Some(&json!({
            "pw": {"cpus": "4", "codeOptions": ["evil@host"]},
        })));
        let merged = merge_codes(&defaults(), &overrides);

        let pw = &merged["pw"];
        assert_eq!(pw.cpus, 4);
        assert_eq!(pw.nodes, 1);
        assert_eq!(pw.label, "qe-7.2-pw@localhost");
        assert_eq!(pw.code_options, defaults()["pw"].code_options);
    }

    #[test]
    fn override_only_codes_follow_declared_ones() {
        let overrides = overrides_from_value(Some(&json!({
            "extra": {"label": "custom@host", "nodes": "-3"},
            "pw": {"nodes": 2},
        })));
        let merged = merge_codes(&defaults(), &overrides);

        let names: Vec<&str> = merged.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["pw", "dos", "extra"]);
        assert_eq!(merged["extra"].nodes, 1);
        assert_eq!(merged["extra"].cpus, 1);
        assert_eq!(merged["extra"].label, "custom@host");
    }

    #[test]
    fn merge_is_idempotent() {
        let overrides = overrides_from_value(Some(&json!({"dos": {"cpus": 8}})));
        let once = merge_codes(&defaults(), &overrides);
        let stored: IndexMap<String, CodeOverride> =
            once.iter().map(|(name, config)| (name.clone(), CodeOverride::from(config.clone()))).collect();
        let again = merge_codes(&defaults(), &stored);
        assert_eq!(once, again);
    }

    #[test]
    fn initialize_publishes_once() {
        let first = initialize(&TabData::new(), &defaults()).expect("first render publishes");
        assert_eq!(first["codes"]["pw"]["label"], json!("qe-7.2-pw@localhost"));
        assert_eq!(initialize(&first, &defaults()), None);
    }

    #[test]
    fn set_code_field_coerces_counts() {
        let data = initialize(&TabData::new(), &defaults()).expect("seed");

        let updated = set_code_field(&data, "pw", CodeField::Cpus, &json!("3"));
        assert_eq!(updated["codes"]["pw"]["cpus"], json!(3));
        assert_eq!(updated["codes"]["pw"]["nodes"], json!(1));

        for raw in [json!("-1"), json!("abc"), json!("")] {
            let updated = set_code_field(&data, "pw", CodeField::Nodes, &raw);
            assert_eq!(updated["codes"]["pw"]["nodes"], json!(1), "input {raw}");
        }

        // The source payload is never mutated.
        assert_eq!(data["codes"]["pw"]["cpus"], json!(1));
    }

    #[test]
    fn parses_field_names() {
        assert_eq!(serde_json::from_value::<CodeField>(json!("cpus")).ok(), Some(CodeField::Cpus));
        assert!(serde_json::from_value::<CodeField>(json!("memory")).is_err());
    }
}
