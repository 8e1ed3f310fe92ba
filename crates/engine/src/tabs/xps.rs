//! XPS core-level settings.

use qeapp_types::{TabData, XpsSupport};
use serde_json::{Map as JsonMap, Value, json};

use super::apply_defaults;

pub const CORE_LEVELS_KEY: &str = "coreLevels";
pub const CORRECTION_ENERGIES_KEY: &str = "correctionEnergies";

pub(crate) fn defaults() -> TabData {
    let defaults = json!({
        "structureType": "crystal",
        "pseudoGroup": "pseudo_demo_pbe",
        "coreLevels": {},
    });
    match defaults {
        Value::Object(map) => map,
        _ => TabData::new(),
    }
}

/// Applies defaults and records the correction energies of a completed lookup.
pub(crate) fn prepare(data: &TabData, support: Option<&XpsSupport>) -> Option<TabData> {
    let mut next = apply_defaults(data, &defaults()).unwrap_or_else(|| data.clone());

    if let Some(support) = support {
        let energies = Value::Object(support.correction_energies());
        if next.get(CORRECTION_ENERGIES_KEY) != Some(&energies) {
            next.insert(CORRECTION_ENERGIES_KEY.to_string(), energies);
        }
    }

    (next != *data).then_some(next)
}

/// Returns a new payload with one core level toggled.
pub fn set_core_level(data: &TabData, level: &str, enabled: bool) -> TabData {
    let mut levels: JsonMap<String, Value> = data
        .get(CORE_LEVELS_KEY)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    levels.insert(level.to_string(), Value::Bool(enabled));

    let mut next = data.clone();
    next.insert(CORE_LEVELS_KEY.to_string(), Value::Object(levels));
    next
}

/// Core levels currently selected, in lookup order.
pub fn selected_core_levels(data: &TabData, support: &XpsSupport) -> Vec<String> {
    let levels = data.get(CORE_LEVELS_KEY).and_then(Value::as_object);
    support
        .supported_elements
        .iter()
        .filter(|level| {
            levels
                .and_then(|levels| levels.get(level.as_str()))
                .and_then(Value::as_bool)
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}
