//! Tab registry.
//!
//! A [`TabSpec`] is static; its [`TabRuntime`] is the live counterpart created
//! when the wizard mounts and holding any bridge the tab needs. Rendering a
//! tab produces a serialisable [`TabView`] plus, when the tab wants to seed
//! or reconcile its payload, the replacement data to publish.

pub mod xps;

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use qeapp_types::{CanonicalStructure, CodeConfig, TabData, TabKind, TabSpec, XpsSupport};
use serde::Serialize;
use serde_json::{Map as JsonMap, Value, json};

use crate::backend::QeBackend;
use crate::bridge::{CodeCatalog, FetchState, JobStatusBridge, StructureBridge, XpsSupportBridge};
use crate::context::{DEFAULT_PROTOCOL, SharedContext};
use crate::resources::{self, CODES_KEY};
use crate::visibility::is_truthy;

/// Relaxation assumed until the settings tab stores one.
pub const DEFAULT_RELAX_TYPE: &str = "positions_cell";

/// Rendered content of one tab.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TabView {
    StructureSelection {
        selected_structure: Option<Value>,
    },
    WorkflowSettings {
        protocol: String,
        relax_type: String,
        properties: JsonMap<String, Value>,
    },
    CodeResources {
        codes: IndexMap<String, CodeConfig>,
        available_codes: FetchState<Vec<String>>,
    },
    Xps {
        structure_selected: bool,
        structure_type: Option<String>,
        pseudo_group: Option<String>,
        support: FetchState<XpsSupport>,
        selected_core_levels: Vec<String>,
    },
    Submit {
        label: Option<String>,
        job_id: Option<String>,
        protocol: String,
        properties: Vec<String>,
    },
    JobStatus {
        job_id: Option<String>,
        job_status: Option<String>,
        process_status: FetchState<String>,
    },
    FinalStructure {
        job_id: Option<String>,
        structure: FetchState<CanonicalStructure>,
    },
    Form {
        data: TabData,
    },
}

/// Output of a render pass.
#[derive(Debug, Clone, PartialEq)]
pub struct TabRender {
    pub view: TabView,
    /// Replacement payload, when the tab changed its own data.
    pub updated: Option<TabData>,
}

impl TabRender {
    fn view(view: TabView) -> Self {
        Self { view, updated: None }
    }
}

/// Live state of a mounted tab.
pub enum TabRuntime {
    /// Tabs rendered purely from their payload and the shared context.
    Static,
    CodeResources { catalog: CodeCatalog },
    Xps { support: XpsSupportBridge },
    JobStatus { status: JobStatusBridge },
    FinalStructure { structure: StructureBridge },
}

impl TabRuntime {
    pub fn for_tab(spec: &TabSpec, backend: &Arc<dyn QeBackend>, timeout: Duration) -> Self {
        let backend = Arc::clone(backend);
        match spec.kind {
            TabKind::CodeResources { .. } => TabRuntime::CodeResources {
                catalog: CodeCatalog::new(backend, timeout),
            },
            TabKind::Xps => TabRuntime::Xps {
                support: XpsSupportBridge::new(backend, timeout),
            },
            TabKind::JobStatus => TabRuntime::JobStatus {
                status: JobStatusBridge::process_status(backend, timeout),
            },
            TabKind::FinalStructure => TabRuntime::FinalStructure {
                structure: StructureBridge::structure(backend, timeout),
            },
            TabKind::StructureSelection | TabKind::WorkflowSettings | TabKind::Submit | TabKind::Form => {
                TabRuntime::Static
            }
        }
    }

    /// Renders the tab and drives its bridges from the shared context.
    pub fn render(&mut self, spec: &TabSpec, data: &TabData, context: &SharedContext) -> TabRender {
        match (&spec.kind, self) {
            (TabKind::StructureSelection, _) => TabRender::view(TabView::StructureSelection {
                selected_structure: data.get("selectedStructure").filter(|value| is_truthy(value)).cloned(),
            }),
            (TabKind::WorkflowSettings, _) => render_settings(data),
            (TabKind::CodeResources { codes }, TabRuntime::CodeResources { catalog }) => {
                catalog.load();
                let updated = resources::initialize(data, codes);
                let effective = updated.as_ref().unwrap_or(data);
                let merged = resources::merge_codes(codes, &resources::overrides_from_value(effective.get(CODES_KEY)));
                let available_codes = catalog.state().map(|codes| {
                    codes
                        .iter()
                        .filter_map(|code| code.display_label().map(str::to_string))
                        .collect()
                });
                TabRender {
                    view: TabView::CodeResources {
                        codes: merged,
                        available_codes,
                    },
                    updated,
                }
            }
            (TabKind::Xps, TabRuntime::Xps { support }) => {
                support.sync_structure(context.structure.as_ref());
                let state = support.state();
                let updated = xps::prepare(data, state.value());
                let effective = updated.as_ref().unwrap_or(data);
                let text = |key: &str| effective.get(key).and_then(Value::as_str).map(str::to_string);
                let selected_core_levels = state
                    .value()
                    .map(|support| xps::selected_core_levels(effective, support))
                    .unwrap_or_default();
                TabRender {
                    view: TabView::Xps {
                        structure_selected: context.structure.is_some(),
                        structure_type: text("structureType"),
                        pseudo_group: text("pseudoGroup"),
                        support: state,
                        selected_core_levels,
                    },
                    updated,
                }
            }
            (TabKind::Submit, _) => TabRender::view(TabView::Submit {
                label: data.get("label").and_then(Value::as_str).map(str::to_string),
                job_id: context.job_id.clone(),
                protocol: context.protocol.clone(),
                properties: context
                    .properties
                    .iter()
                    .filter(|(_, enabled)| is_truthy(enabled))
                    .map(|(name, _)| name.clone())
                    .collect(),
            }),
            (TabKind::JobStatus, TabRuntime::JobStatus { status }) => {
                status.sync_job(context.job_id.as_deref());
                TabRender::view(TabView::JobStatus {
                    job_id: context.job_id.clone(),
                    job_status: context.job_status.clone(),
                    process_status: status.state(),
                })
            }
            (TabKind::FinalStructure, TabRuntime::FinalStructure { structure }) => {
                structure.sync_job(context.job_id.as_deref());
                TabRender::view(TabView::FinalStructure {
                    job_id: context.job_id.clone(),
                    structure: structure.state(),
                })
            }
            _ => TabRender::view(TabView::Form { data: data.clone() }),
        }
    }

    /// Cancels outstanding fetches. Called when the tab leaves the visible
    /// set or the wizard shuts down.
    pub fn teardown(&mut self) {
        match self {
            TabRuntime::Static => {}
            TabRuntime::CodeResources { catalog } => catalog.teardown(),
            TabRuntime::Xps { support } => support.teardown(),
            TabRuntime::JobStatus { status } => status.teardown(),
            TabRuntime::FinalStructure { structure } => structure.teardown(),
        }
    }
}

fn render_settings(data: &TabData) -> TabRender {
    let defaults = match json!({
        "protocol": DEFAULT_PROTOCOL,
        "properties": {},
        "relax_type": DEFAULT_RELAX_TYPE,
    }) {
        Value::Object(map) => map,
        _ => TabData::new(),
    };
    let updated = apply_defaults(data, &defaults);
    let effective = updated.as_ref().unwrap_or(data);

    TabRender {
        view: TabView::WorkflowSettings {
            protocol: effective
                .get("protocol")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_PROTOCOL)
                .to_string(),
            relax_type: effective
                .get("relax_type")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_RELAX_TYPE)
                .to_string(),
            properties: effective
                .get("properties")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        },
        updated,
    }
}

/// Overlays `data` on `defaults`. Returns the result only when it adds keys.
pub fn apply_defaults(data: &TabData, defaults: &TabData) -> Option<TabData> {
    let mut merged = defaults.clone();
    merged.extend(data.iter().map(|(key, value)| (key.clone(), value.clone())));
    (merged != *data).then_some(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBackend, TIMEOUT, settled, silicon, silicon_job};
    use qeapp_types::CodeDescriptor;

    fn spec(kind: TabKind) -> TabSpec {
        TabSpec::new("tab", kind)
    }

    #[test]
    fn settings_seed_defaults_once() {
        let backend: Arc<dyn QeBackend> = Arc::new(MockBackend::default());
        let spec = spec(TabKind::WorkflowSettings);
        let mut runtime = TabRuntime::for_tab(&spec, &backend, TIMEOUT);
        let context = SharedContext::default();

        let first = runtime.render(&spec, &TabData::new(), &context);
        let seeded = first.updated.expect("defaults published");
        assert_eq!(seeded["protocol"], json!("moderate"));
        assert_eq!(seeded["relax_type"], json!("positions_cell"));

        let second = runtime.render(&spec, &seeded, &context);
        assert_eq!(second.updated, None);
    }

    #[test]
    fn apply_defaults_keeps_user_values() {
        let defaults = json!({"protocol": "moderate"}).as_object().cloned().expect("object");
        let data = json!({"protocol": "fast"}).as_object().cloned().expect("object");
        assert_eq!(apply_defaults(&data, &defaults), None);
    }

    #[tokio::test]
    async fn code_resources_merge_and_list_catalogue() {
        let code: CodeDescriptor = serde_json::from_value(json!({"label": "qe-7.2-pw@localhost"})).expect("code");
        let mock = Arc::new(MockBackend::default().with_codes(Ok(vec![code])));
        let backend: Arc<dyn QeBackend> = mock.clone();
        let codes: IndexMap<String, CodeConfig> =
            [("pw".to_string(), CodeConfig::new("qe-7.2-pw@localhost"))].into_iter().collect();
        let spec = spec(TabKind::CodeResources { codes });
        let mut runtime = TabRuntime::for_tab(&spec, &backend, TIMEOUT);
        let context = SharedContext::default();

        let first = runtime.render(&spec, &TabData::new(), &context);
        let data = first.updated.expect("defaults merged");
        if let TabRuntime::CodeResources { catalog } = &runtime {
            settled(&mut catalog.subscribe()).await;
        }

        let second = runtime.render(&spec, &data, &context);
        assert_eq!(second.updated, None);
        match second.view {
            TabView::CodeResources { codes, available_codes } => {
                assert_eq!(codes["pw"].nodes, 1);
                assert_eq!(available_codes, FetchState::Ready(vec!["qe-7.2-pw@localhost".to_string()]));
            }
            other => panic!("unexpected view {other:?}"),
        }
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn final_structure_follows_job_id() {
        let mock = Arc::new(MockBackend::default().with_job("42", Ok(silicon_job())));
        let backend: Arc<dyn QeBackend> = mock.clone();
        let spec = spec(TabKind::FinalStructure);
        let mut runtime = TabRuntime::for_tab(&spec, &backend, TIMEOUT);

        let idle = runtime.render(&spec, &TabData::new(), &SharedContext::default());
        assert!(matches!(
            idle.view,
            TabView::FinalStructure {
                structure: FetchState::Idle,
                ..
            }
        ));
        assert_eq!(mock.call_count(), 0);

        let context = SharedContext {
            job_id: Some("42".into()),
            ..SharedContext::default()
        };
        runtime.render(&spec, &TabData::new(), &context);
        if let TabRuntime::FinalStructure { structure } = &runtime {
            settled(&mut structure.subscribe()).await;
        }

        match runtime.render(&spec, &TabData::new(), &context).view {
            TabView::FinalStructure {
                structure: FetchState::Ready(structure),
                job_id,
            } => {
                assert_eq!(job_id.as_deref(), Some("42"));
                assert_eq!(structure.site_count(), 2);
            }
            other => panic!("unexpected view {other:?}"),
        }
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn xps_records_correction_energies() {
        let support = XpsSupport {
            supported_elements: vec!["Si_2p".into()],
            not_supported_elements: Vec::new(),
            correction_energies: json!({"Si_2p": 0.5}).as_object().cloned(),
        };
        let mock = Arc::new(MockBackend::default().with_xps(Ok(support)));
        let backend: Arc<dyn QeBackend> = mock.clone();
        let spec = spec(TabKind::Xps);
        let mut runtime = TabRuntime::for_tab(&spec, &backend, TIMEOUT);
        let context = SharedContext {
            structure: Some(silicon()),
            ..SharedContext::default()
        };

        let first = runtime.render(&spec, &TabData::new(), &context);
        let data = first.updated.expect("defaults published");
        if let TabRuntime::Xps { support } = &runtime {
            settled(&mut support.subscribe()).await;
        }

        let second = runtime.render(&spec, &data, &context);
        let data = second.updated.expect("correction energies published");
        assert_eq!(data[xps::CORRECTION_ENERGIES_KEY]["Si_2p"], json!(0.5));
        assert_eq!(runtime.render(&spec, &data, &context).updated, None);
        assert_eq!(mock.call_count(), 1);
    }
}
