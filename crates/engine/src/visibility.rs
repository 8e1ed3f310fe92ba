//! Tab visibility and active-tab selection.
//!
//! A tab is shown when it has no `id`, when its `id` is not a key of the
//! enabled-properties map, or when the mapped value is truthy. The filter
//! preserves declaration order.

use qeapp_types::TabSpec;
use serde_json::{Map as JsonMap, Value};

/// Text shown in place of the tab strip when every tab is filtered out.
pub const NO_TABS_PLACEHOLDER: &str = "No available tabs based on the selected properties.";

/// Truthiness as the settings form records it: `null`, `false`, `0`, and `""` are false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|float| float != 0.0 && !float.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub fn is_visible(tab: &TabSpec, properties: &JsonMap<String, Value>) -> bool {
    match tab.id.as_deref().and_then(|id| properties.get(id)) {
        Some(enabled) => is_truthy(enabled),
        None => true,
    }
}

/// Indices of the visible tabs, in declaration order.
pub fn visible_indices(tabs: &[TabSpec], properties: &JsonMap<String, Value>) -> Vec<usize> {
    tabs.iter()
        .enumerate()
        .filter(|(_, tab)| is_visible(tab, properties))
        .map(|(index, _)| index)
        .collect()
}

pub fn visible_tabs<'a>(tabs: &'a [TabSpec], properties: &JsonMap<String, Value>) -> Vec<&'a TabSpec> {
    tabs.iter().filter(|tab| is_visible(tab, properties)).collect()
}

/// Active tab of one step, kept valid against the current visible set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabSelection {
    active: Option<String>,
    visible: Vec<String>,
}

impl TabSelection {
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Titles the selection was last validated against.
    pub fn visible(&self) -> &[String] {
        &self.visible
    }

    /// Re-validates against a new visible set. An active title that is no
    /// longer visible falls back to the first visible title, or to nothing.
    /// Returns `true` when the active title changed.
    pub fn revalidate<S: AsRef<str>>(&mut self, visible: &[S]) -> bool {
        self.visible = visible.iter().map(|title| title.as_ref().to_string()).collect();

        let still_valid = self
            .active
            .as_deref()
            .is_some_and(|active| self.visible.iter().any(|title| title == active));
        if still_valid {
            return false;
        }

        let next = self.visible.first().cloned();
        let changed = next != self.active;
        self.active = next;
        changed
    }

    /// Selects a visible tab. Titles outside the visible set are ignored.
    pub fn select(&mut self, title: &str) -> bool {
        if !self.visible.iter().any(|visible| visible == title) {
            return false;
        }
        self.active = Some(title.to_string());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qeapp_types::TabKind;
    use serde_json::json;

    fn tabs() -> Vec<TabSpec> {
        vec![
            TabSpec::new("A", TabKind::Form),
            TabSpec::new("B", TabKind::Form).with_id("dos"),
        ]
    }

    fn titles(properties: Value) -> Vec<String> {
        let properties = properties.as_object().cloned().expect("object");
        let tabs = tabs();
        visible_tabs(&tabs, &properties).iter().map(|tab| tab.title.clone()).collect()
    }

    #[test]
    fn filters_by_enabled_properties() {
        assert_eq!(titles(json!({"dos": false})), vec!["A"]);
        assert_eq!(titles(json!({"dos": true})), vec!["A", "B"]);
        assert_eq!(titles(json!({})), vec!["A", "B"]);
        assert_eq!(titles(json!({"dos": null})), vec!["A"]);
        assert_eq!(titles(json!({"dos": 0})), vec!["A"]);
        assert_eq!(titles(json!({"dos": "yes"})), vec!["A", "B"]);
    }

    #[test]
    fn initial_selection_is_first_visible_tab() {
        let mut selection = TabSelection::default();
        assert!(selection.revalidate(&["A", "B"]));
        assert_eq!(selection.active(), Some("A"));
    }

    #[test]
    fn resets_when_active_tab_disappears() {
        let mut selection = TabSelection::default();
        selection.revalidate(&["A", "B"]);
        assert!(selection.select("B"));

        assert!(selection.revalidate(&["A"]));
        assert_eq!(selection.active(), Some("A"));

        let empty: [&str; 0] = [];
        assert!(selection.revalidate(&empty));
        assert_eq!(selection.active(), None);
    }

    #[test]
    fn keeps_selection_while_visible() {
        let mut selection = TabSelection::default();
        selection.revalidate(&["A", "B"]);
        selection.select("B");
        assert!(!selection.revalidate(&["B", "C"]));
        assert_eq!(selection.active(), Some("B"));
        assert!(!selection.select("Z"));
        assert_eq!(selection.active(), Some("B"));
    }
}
