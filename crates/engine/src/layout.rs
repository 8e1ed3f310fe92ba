//! Built-in five-step QE app layout.
//!
//! Cross-step reads rely on the step indices and tab titles declared here; a
//! custom layout file must keep them for the shared context to resolve.

use indexmap::{IndexMap, indexmap};
use qeapp_types::{CodeConfig, Step, TabKind, TabSpec, WizardLayout};

pub const STRUCTURE_STEP: usize = 0;
pub const STRUCTURE_TAB: &str = "Structure Selection";

pub const SETTINGS_STEP: usize = 1;
pub const SETTINGS_TAB: &str = "Basic workflow settings";
pub const XPS_TAB: &str = "XPS";

pub const RESOURCES_STEP: usize = 2;
pub const GLOBAL_RESOURCES_TAB: &str = "Global resources";
pub const BANDS_RESOURCES_TAB: &str = "Bands Resource Settings";
pub const PDOS_RESOURCES_TAB: &str = "PDOS Resource Settings";

pub const SUBMIT_STEP: usize = 3;
pub const SUBMIT_TAB: &str = "Label and Submit";

pub const STATUS_STEP: usize = 4;
pub const STATUS_TAB: &str = "Job status";
pub const FINAL_STRUCTURE_TAB: &str = "Final Structure";

/// Builds the default layout. `code_overrides` replaces declared code defaults
/// per resource tab title and code name.
pub fn standard_layout(code_overrides: &IndexMap<String, IndexMap<String, CodeConfig>>) -> WizardLayout {
    let codes = |tab: &str, mut defaults: IndexMap<String, CodeConfig>| {
        if let Some(overrides) = code_overrides.get(tab) {
            for (name, config) in overrides {
                defaults.insert(name.clone(), config.clone());
            }
        }
        TabKind::CodeResources { codes: defaults }
    };

    let steps = vec![
        Step::new("Structure", vec![TabSpec::new(STRUCTURE_TAB, TabKind::StructureSelection)]),
        Step::new(
            "Workflow settings",
            vec![
                TabSpec::new(SETTINGS_TAB, TabKind::WorkflowSettings),
                TabSpec::new(XPS_TAB, TabKind::Xps).with_id("xps"),
                TabSpec::new("Bands", TabKind::Form).with_id("bands"),
                TabSpec::new("PDOS", TabKind::Form).with_id("pdos"),
            ],
        ),
        Step::new(
            "Computational resources",
            vec![
                TabSpec::new(
                    GLOBAL_RESOURCES_TAB,
                    codes(
                        GLOBAL_RESOURCES_TAB,
                        indexmap! {
                            "pw".to_string() => CodeConfig::new("qe-7.2-pw@localhost")
                                .with_options(["qe-7.2-pw@localhost", "qe-7.1-pw@remote"]),
                        },
                    ),
                ),
                TabSpec::new(
                    BANDS_RESOURCES_TAB,
                    codes(
                        BANDS_RESOURCES_TAB,
                        indexmap! {
                            "projwfc_bands".to_string() => CodeConfig::new("qe-7.2-projwfc@localhost")
                                .with_input_plugin("quantumespresso.pw"),
                        },
                    ),
                )
                .with_id("bands"),
                TabSpec::new(
                    PDOS_RESOURCES_TAB,
                    codes(
                        PDOS_RESOURCES_TAB,
                        indexmap! {
                            "projwfc".to_string() => CodeConfig::new("qe-7.2-projwfc@localhost")
                                .with_input_plugin("quantumespresso.projwfc"),
                            "dos".to_string() => CodeConfig::new("qe-7.2-dos@localhost")
                                .with_input_plugin("quantumespresso.dos"),
                        },
                    ),
                )
                .with_id("pdos"),
            ],
        ),
        Step::new("Review and submit", vec![TabSpec::new(SUBMIT_TAB, TabKind::Submit)]),
        Step::new(
            "Status & results",
            vec![
                TabSpec::new(STATUS_TAB, TabKind::JobStatus),
                TabSpec::new(FINAL_STRUCTURE_TAB, TabKind::FinalStructure),
            ],
        ),
    ];

    WizardLayout { steps }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declares_cross_step_tabs_at_expected_indices() {
        let layout = standard_layout(&IndexMap::new());
        assert_eq!(layout.steps.len(), 5);
        assert!(layout.steps[STRUCTURE_STEP].tab(STRUCTURE_TAB).is_some());
        assert!(layout.steps[SETTINGS_STEP].tab(SETTINGS_TAB).is_some());
        assert!(layout.steps[SUBMIT_STEP].tab(SUBMIT_TAB).is_some());
        assert!(layout.steps[STATUS_STEP].tab(STATUS_TAB).is_some());
    }

    #[test]
    fn config_overrides_replace_code_defaults() {
        let overrides = indexmap! {
            GLOBAL_RESOURCES_TAB.to_string() => indexmap! {
                "pw".to_string() => CodeConfig::new("qe-7.3-pw@cluster"),
            },
        };
        let layout = standard_layout(&overrides);
        let tab = layout.steps[RESOURCES_STEP].tab(GLOBAL_RESOURCES_TAB).expect("resources tab");
        match &tab.kind {
            TabKind::CodeResources { codes } => assert_eq!(codes["pw"].label, "qe-7.3-pw@cluster"),
            other => panic!("unexpected kind {other:?}"),
        }
    }
}
