//! Job-scoped bridges: output structure and process status.

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use qeapp_types::{BackendStructure, CanonicalStructure, JobData};
use serde_json::Value;
use tokio::sync::watch;

use super::{FetchState, RemoteResource};
use crate::backend::QeBackend;
use crate::error::BridgeError;

/// Converts the backend's structure attributes into the canonical form.
///
/// Each kind maps to the first of its symbols. A kind without symbols, or a
/// site naming an undeclared kind, is a malformed response.
pub fn convert_structure(raw: &BackendStructure) -> Result<CanonicalStructure, BridgeError> {
    let mut species = IndexMap::new();
    for kind in &raw.kinds {
        let element = kind
            .symbols
            .first()
            .ok_or_else(|| BridgeError::malformed(format!("kind '{}' has no symbols", kind.name)))?;
        species.insert(kind.name.clone(), element.clone());
    }

    let mut symbols = Vec::with_capacity(raw.sites.len());
    let mut positions = Vec::with_capacity(raw.sites.len());
    for (index, site) in raw.sites.iter().enumerate() {
        if !species.contains_key(&site.kind_name) {
            return Err(BridgeError::malformed(format!(
                "site {index} references unknown kind '{}'",
                site.kind_name
            )));
        }
        symbols.push(site.kind_name.clone());
        positions.push(site.position);
    }

    Ok(CanonicalStructure {
        cell: raw.cell,
        pbc: [raw.pbc1, raw.pbc2, raw.pbc3],
        species,
        symbols,
        positions,
    })
}

/// Decodes and converts a raw structure value.
pub fn to_canonical(structure: &Value) -> Result<CanonicalStructure, BridgeError> {
    let raw: BackendStructure = serde_json::from_value(structure.clone())
        .map_err(|error| BridgeError::malformed(format!("structure: {error}")))?;
    convert_structure(&raw)
}

fn structure_of(job: JobData) -> Result<CanonicalStructure, BridgeError> {
    let structure = job
        .structure
        .filter(|value| !value.is_null())
        .ok_or_else(|| BridgeError::malformed("job has no structure"))?;
    to_canonical(&structure)
}

/// A job without a rendered status yet reads as an empty status.
fn process_status_of(job: JobData) -> Result<String, BridgeError> {
    Ok(job.process_status.unwrap_or_default())
}

/// Fetches one projection of `GET /jobs-data/{id}` for the current job id.
///
/// No result is cached across ids: every call to [`JobBridge::resolve`]
/// restarts from scratch.
pub struct JobBridge<T> {
    backend: Arc<dyn QeBackend>,
    resource: RemoteResource<T>,
    job_id: Option<String>,
    project: fn(JobData) -> Result<T, BridgeError>,
}

/// Final relaxed structure of a job.
pub type StructureBridge = JobBridge<CanonicalStructure>;
/// Rendered process status of a job.
pub type JobStatusBridge = JobBridge<String>;

impl StructureBridge {
    pub fn structure(backend: Arc<dyn QeBackend>, timeout: Duration) -> Self {
        Self::with_projection(backend, "job structure", timeout, structure_of)
    }

    /// Fetches and converts the structure of `job_id`. `None` cancels any
    /// outstanding fetch and issues no request.
    pub fn resolve_structure(&mut self, job_id: Option<&str>) {
        self.resolve(job_id);
    }
}

impl JobStatusBridge {
    pub fn process_status(backend: Arc<dyn QeBackend>, timeout: Duration) -> Self {
        Self::with_projection(backend, "job status", timeout, process_status_of)
    }
}

impl<T> JobBridge<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn with_projection(
        backend: Arc<dyn QeBackend>,
        label: &'static str,
        timeout: Duration,
        project: fn(JobData) -> Result<T, BridgeError>,
    ) -> Self {
        Self {
            backend,
            resource: RemoteResource::new(label, timeout),
            job_id: None,
            project,
        }
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    pub fn state(&self) -> FetchState<T> {
        self.resource.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState<T>> {
        self.resource.subscribe()
    }

    /// Starts a fetch for `job_id`, cancelling any earlier one.
    pub fn resolve(&mut self, job_id: Option<&str>) {
        self.job_id = job_id.map(str::to_string);
        let Some(id) = self.job_id.clone() else {
            self.resource.reset();
            return;
        };

        let backend = Arc::clone(&self.backend);
        let project = self.project;
        self.resource.start(async move {
            let job = backend.job_data(&id).await?;
            project(job)
        });
    }

    /// Resolves only when `job_id` differs from the last request.
    pub fn sync_job(&mut self, job_id: Option<&str>) {
        if self.job_id.as_deref() != job_id {
            self.resolve(job_id);
        }
    }

    /// Cancels the fetch in flight. The job id is forgotten so the next
    /// [`JobBridge::sync_job`] after a remount fetches again.
    pub fn teardown(&mut self) {
        self.resource.teardown();
        self.job_id = None;
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::{task, time};

    use super::*;
    use crate::testing::{MockBackend, TIMEOUT, settled, silicon, silicon_job};

    #[test]
    fn converts_two_site_silicon() {
        let canonical = to_canonical(&silicon()).expect("convert");
        assert_eq!(canonical.pbc, [true, true, true]);
        assert_eq!(canonical.species.get("Si1").map(String::as_str), Some("Si"));
        assert_eq!(canonical.symbols, vec!["Si1", "Si1"]);
        assert_eq!(canonical.positions, vec![[0.0, 0.0, 0.0], [1.3575, 1.3575, 1.3575]]);
        assert_eq!(canonical.element_of(1), Some("Si"));
    }

    #[test]
    fn alloyed_kinds_collapse_to_first_symbol() {
        let mut raw = silicon();
        raw["kinds"] = json!([{"name": "Si1", "symbols": ["Si", "Ge"]}]);
        assert_eq!(to_canonical(&raw).expect("convert").species["Si1"], "Si");
    }

    #[test]
    fn rejects_inconsistent_structures() {
        let mut empty_kind = silicon();
        empty_kind["kinds"] = json!([{"name": "Si1", "symbols": []}]);
        assert!(matches!(to_canonical(&empty_kind), Err(BridgeError::MalformedResponse { .. })));

        let mut unknown = silicon();
        unknown["sites"][1]["kind_name"] = json!("Ge1");
        assert!(matches!(to_canonical(&unknown), Err(BridgeError::MalformedResponse { .. })));

        assert!(matches!(to_canonical(&json!({"cell": "nope"})), Err(BridgeError::MalformedResponse { .. })));
    }

    #[tokio::test]
    async fn absent_job_id_stays_idle_without_requests() {
        let backend = Arc::new(MockBackend::default());
        let mut bridge = StructureBridge::structure(backend.clone(), TIMEOUT);

        bridge.resolve_structure(None);

        assert_eq!(bridge.state(), FetchState::Idle);
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn resolves_structure_for_job() {
        let backend = Arc::new(MockBackend::default().with_job("42", Ok(silicon_job())));
        let mut bridge = StructureBridge::structure(backend.clone(), TIMEOUT);
        let mut rx = bridge.subscribe();

        bridge.resolve_structure(Some("42"));
        let state = settled(&mut rx).await;

        let structure = state.value().expect("ready");
        assert_eq!(structure.site_count(), 2);
        assert_eq!(structure.symbols, vec!["Si1", "Si1"]);
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn backend_failure_becomes_failed_state() {
        let backend = Arc::new(MockBackend::default());
        let mut bridge = StructureBridge::structure(backend.clone(), TIMEOUT);
        let mut rx = bridge.subscribe();

        bridge.resolve_structure(Some("missing"));

        assert!(matches!(
            settled(&mut rx).await,
            FetchState::Failed(BridgeError::BackendUnavailable { .. })
        ));
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn job_without_structure_is_malformed() {
        let job = JobData {
            structure: None,
            ..silicon_job()
        };
        let backend = Arc::new(MockBackend::default().with_job("7", Ok(job)));
        let mut bridge = StructureBridge::structure(backend, TIMEOUT);
        let mut rx = bridge.subscribe();

        bridge.resolve_structure(Some("7"));

        assert!(matches!(
            settled(&mut rx).await,
            FetchState::Failed(BridgeError::MalformedResponse { .. })
        ));
    }

    #[tokio::test]
    async fn teardown_discards_late_responses() {
        let backend = Arc::new(MockBackend::default().with_job("42", Ok(silicon_job())).gated());
        let mut bridge = StructureBridge::structure(backend.clone(), TIMEOUT);

        bridge.resolve_structure(Some("42"));
        let rx = bridge.subscribe();
        assert_eq!(bridge.state(), FetchState::Loading);

        // Let the fetch reach the backend so it answers after teardown.
        task::yield_now().await;
        assert_eq!(backend.call_count(), 1);

        bridge.teardown();
        backend.release.notify_one();
        time::sleep(Duration::from_millis(50)).await;

        assert!(!rx.has_changed().expect("sender alive"));
        assert_eq!(bridge.state(), FetchState::Loading);
    }

    #[tokio::test]
    async fn remount_after_teardown_fetches_again() {
        let backend = Arc::new(MockBackend::default().with_job("42", Ok(silicon_job())).gated());
        let mut bridge = StructureBridge::structure(backend.clone(), TIMEOUT);
        let mut rx = bridge.subscribe();

        bridge.sync_job(Some("42"));
        task::yield_now().await;
        bridge.teardown();
        assert_eq!(bridge.job_id(), None);
        backend.release.notify_one();

        bridge.sync_job(Some("42"));
        task::yield_now().await;
        assert_eq!(backend.call_count(), 2);
        backend.release.notify_one();

        let structure = settled(&mut rx).await;
        assert_eq!(structure.value().map(CanonicalStructure::site_count), Some(2));
    }

    #[tokio::test]
    async fn superseded_fetch_never_publishes() {
        let backend = Arc::new(
            MockBackend::default()
                .with_job("1", Ok(silicon_job()))
                .with_job("2", Err(BridgeError::unavailable("job 2 failed")))
                .gated(),
        );
        let mut bridge = StructureBridge::structure(backend.clone(), TIMEOUT);
        let mut rx = bridge.subscribe();

        bridge.resolve_structure(Some("1"));
        task::yield_now().await;
        assert_eq!(backend.call_count(), 1);

        bridge.resolve_structure(Some("2"));
        task::yield_now().await;
        assert_eq!(backend.call_count(), 2);

        // Only the fetch for job 2 is still live.
        backend.release.notify_waiters();

        assert_eq!(settled(&mut rx).await, FetchState::Failed(BridgeError::unavailable("job 2 failed")));
    }

    #[tokio::test]
    async fn reinvocation_refetches() {
        let backend = Arc::new(MockBackend::default().with_job("42", Ok(silicon_job())));
        let mut bridge = StructureBridge::structure(backend.clone(), TIMEOUT);
        let mut rx = bridge.subscribe();

        bridge.resolve_structure(Some("42"));
        settled(&mut rx).await;
        bridge.resolve_structure(Some("42"));
        settled(&mut rx).await;
        assert_eq!(backend.call_count(), 2);

        // Syncing to the same id is a no-op; clearing it returns to idle.
        bridge.sync_job(Some("42"));
        assert_eq!(backend.call_count(), 2);
        bridge.sync_job(None);
        assert_eq!(bridge.state(), FetchState::Idle);
    }

    #[tokio::test]
    async fn slow_backends_time_out() {
        let backend = Arc::new(MockBackend::default().with_job("42", Ok(silicon_job())).gated());
        let mut bridge = StructureBridge::structure(backend, Duration::from_millis(20));
        let mut rx = bridge.subscribe();

        bridge.resolve_structure(Some("42"));

        match settled(&mut rx).await {
            FetchState::Failed(BridgeError::BackendUnavailable { message }) => assert!(message.contains("timed out")),
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[tokio::test]
    async fn status_bridge_reads_process_status() {
        let backend = Arc::new(MockBackend::default().with_job("42", Ok(silicon_job())));
        let mut bridge = JobStatusBridge::process_status(backend.clone(), TIMEOUT);
        let mut rx = bridge.subscribe();

        bridge.sync_job(Some("42"));
        assert_eq!(settled(&mut rx).await, FetchState::Ready("finished".to_string()));

        bridge.resolve(Some("42"));
        settled(&mut rx).await;
        assert_eq!(backend.call_count(), 2);
    }
}
