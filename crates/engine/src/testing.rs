//! In-memory backend and fixtures shared by the engine's unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use qeapp_types::{CodeDescriptor, JobData, XpsSupport};
use serde_json::{Value, json};
use tokio::sync::{Notify, watch};
use tokio::time;

use crate::backend::QeBackend;
use crate::bridge::FetchState;
use crate::error::BridgeError;

pub(crate) const TIMEOUT: Duration = Duration::from_secs(5);

/// When gated, every call parks until `release` is notified.
#[derive(Default)]
pub(crate) struct MockBackend {
    pub calls: AtomicUsize,
    pub gated: bool,
    pub release: Notify,
    pub jobs: Mutex<HashMap<String, Result<JobData, BridgeError>>>,
    pub xps: Mutex<Option<Result<XpsSupport, BridgeError>>>,
    pub codes: Mutex<Option<Result<Vec<CodeDescriptor>, BridgeError>>>,
}

impl MockBackend {
    pub fn with_job(self, id: &str, job: Result<JobData, BridgeError>) -> Self {
        self.jobs.lock().expect("jobs lock").insert(id.to_string(), job);
        self
    }

    pub fn with_xps(self, support: Result<XpsSupport, BridgeError>) -> Self {
        *self.xps.lock().expect("xps lock") = Some(support);
        self
    }

    pub fn with_codes(self, codes: Result<Vec<CodeDescriptor>, BridgeError>) -> Self {
        *self.codes.lock().expect("codes lock") = Some(codes);
        self
    }

    pub fn gated(mut self) -> Self {
        self.gated = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.gated {
            self.release.notified().await;
        }
    }
}

#[async_trait]
impl QeBackend for MockBackend {
    async fn job_data(&self, job_id: &str) -> Result<JobData, BridgeError> {
        self.enter().await;
        self.jobs
            .lock()
            .expect("jobs lock")
            .get(job_id)
            .cloned()
            .unwrap_or_else(|| Err(BridgeError::unavailable(format!("job {job_id} not found"))))
    }

    async fn supported_xps_core_levels(&self, _structure: &Value) -> Result<XpsSupport, BridgeError> {
        self.enter().await;
        self.xps
            .lock()
            .expect("xps lock")
            .clone()
            .unwrap_or_else(|| Err(BridgeError::unavailable("no xps data")))
    }

    async fn list_codes(&self) -> Result<Vec<CodeDescriptor>, BridgeError> {
        self.enter().await;
        self.codes.lock().expect("codes lock").clone().unwrap_or_else(|| Ok(Vec::new()))
    }
}

pub(crate) fn silicon() -> Value {
    json!({
        "cell": [[5.43, 0.0, 0.0], [0.0, 5.43, 0.0], [0.0, 0.0, 5.43]],
        "pbc1": true,
        "pbc2": true,
        "pbc3": true,
        "kinds": [{"name": "Si1", "symbols": ["Si"]}],
        "sites": [
            {"kind_name": "Si1", "position": [0.0, 0.0, 0.0]},
            {"kind_name": "Si1", "position": [1.3575, 1.3575, 1.3575]}
        ]
    })
}

pub(crate) fn silicon_job() -> JobData {
    JobData {
        structure: Some(silicon()),
        steps_data: None,
        process_status: Some("finished".into()),
    }
}

/// Waits until the state leaves `Loading`.
pub(crate) async fn settled<T: Clone>(rx: &mut watch::Receiver<FetchState<T>>) -> FetchState<T> {
    let state = time::timeout(TIMEOUT, rx.wait_for(|state| !state.is_loading()))
        .await
        .expect("fetch settles")
        .expect("sender alive");
    state.clone()
}
