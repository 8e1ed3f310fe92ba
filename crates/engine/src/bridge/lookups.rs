//! Lookups keyed on wizard data rather than on a job: XPS core-level support
//! for the selected structure, and the backend's code catalogue.

use std::sync::Arc;
use std::time::Duration;

use qeapp_types::{CodeDescriptor, XpsSupport};
use serde_json::Value;
use tokio::sync::watch;

use super::{FetchState, RemoteResource};
use crate::backend::QeBackend;

/// Supported XPS core levels for the structure selected upstream.
pub struct XpsSupportBridge {
    backend: Arc<dyn QeBackend>,
    resource: RemoteResource<XpsSupport>,
    structure: Option<Value>,
}

impl XpsSupportBridge {
    pub fn new(backend: Arc<dyn QeBackend>, timeout: Duration) -> Self {
        Self {
            backend,
            resource: RemoteResource::new("xps core levels", timeout),
            structure: None,
        }
    }

    pub fn state(&self) -> FetchState<XpsSupport> {
        self.resource.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState<XpsSupport>> {
        self.resource.subscribe()
    }

    /// Re-queries when the structure changes. Without a structure the lookup
    /// goes idle and no request is made.
    pub fn sync_structure(&mut self, structure: Option<&Value>) {
        if self.structure.as_ref() == structure {
            return;
        }
        self.structure = structure.cloned();

        let Some(structure) = self.structure.clone() else {
            self.resource.reset();
            return;
        };
        let backend = Arc::clone(&self.backend);
        self.resource
            .start(async move { backend.supported_xps_core_levels(&structure).await });
    }

    pub fn teardown(&mut self) {
        self.resource.teardown();
        // Forget the structure so remounting queries again.
        self.structure = None;
    }
}

/// Codes registered on the backend, loaded once per mount.
pub struct CodeCatalog {
    backend: Arc<dyn QeBackend>,
    resource: RemoteResource<Vec<CodeDescriptor>>,
    requested: bool,
}

impl CodeCatalog {
    pub fn new(backend: Arc<dyn QeBackend>, timeout: Duration) -> Self {
        Self {
            backend,
            resource: RemoteResource::new("code catalogue", timeout),
            requested: false,
        }
    }

    pub fn state(&self) -> FetchState<Vec<CodeDescriptor>> {
        self.resource.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState<Vec<CodeDescriptor>>> {
        self.resource.subscribe()
    }

    /// Requests the catalogue unless a request was already made.
    pub fn load(&mut self) {
        if !self.requested {
            self.reload();
        }
    }

    pub fn reload(&mut self) {
        self.requested = true;
        let backend = Arc::clone(&self.backend);
        self.resource.start(async move { backend.list_codes().await });
    }

    pub fn teardown(&mut self) {
        self.resource.teardown();
        self.requested = false;
    }
}

#[cfg(test)]
mod tests {
    use qeapp_types::XpsSupport;
    use serde_json::json;

    use super::*;
    use crate::error::BridgeError;
    use crate::testing::{MockBackend, TIMEOUT, settled, silicon};

    fn support() -> XpsSupport {
        XpsSupport {
            supported_elements: vec!["Si_2p".into()],
            not_supported_elements: Vec::new(),
            correction_energies: Some(json!({"Si_2p": {"core": 0.1}}).as_object().cloned().expect("object")),
        }
    }

    #[tokio::test]
    async fn xps_lookup_follows_structure_changes() {
        let backend = Arc::new(MockBackend::default().with_xps(Ok(support())));
        let mut bridge = XpsSupportBridge::new(backend.clone(), TIMEOUT);
        let mut rx = bridge.subscribe();

        bridge.sync_structure(None);
        assert_eq!(bridge.state(), FetchState::Idle);
        assert_eq!(backend.call_count(), 0);

        let structure = silicon();
        bridge.sync_structure(Some(&structure));
        assert_eq!(settled(&mut rx).await, FetchState::Ready(support()));

        bridge.sync_structure(Some(&structure));
        assert_eq!(backend.call_count(), 1);

        bridge.sync_structure(None);
        assert_eq!(bridge.state(), FetchState::Idle);
    }

    #[tokio::test]
    async fn xps_lookup_failure_is_local() {
        let backend = Arc::new(MockBackend::default().with_xps(Err(BridgeError::unavailable("backend down"))));
        let mut bridge = XpsSupportBridge::new(backend, TIMEOUT);
        let mut rx = bridge.subscribe();

        bridge.sync_structure(Some(&silicon()));

        assert_eq!(
            settled(&mut rx).await,
            FetchState::Failed(BridgeError::unavailable("backend down"))
        );
    }

    #[tokio::test]
    async fn catalogue_loads_once_per_mount() {
        let codes = vec![serde_json::from_value(json!({"full_label": "qe-7.2-pw@localhost"})).expect("code")];
        let backend = Arc::new(MockBackend::default().with_codes(Ok(codes)));
        let mut catalog = CodeCatalog::new(backend.clone(), TIMEOUT);
        let mut rx = catalog.subscribe();

        catalog.load();
        let state = settled(&mut rx).await;
        assert_eq!(state.value().map(Vec::len), Some(1));

        catalog.load();
        assert_eq!(backend.call_count(), 1);

        catalog.teardown();
        catalog.load();
        settled(&mut rx).await;
        assert_eq!(backend.call_count(), 2);
    }
}
