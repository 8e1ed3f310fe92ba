//! Seam between the engine and the QE app backend.

use async_trait::async_trait;
use qeapp_api::QeAppClient;
use qeapp_types::{CodeDescriptor, JobData, XpsSupport};
use serde_json::Value;

use crate::error::BridgeError;

/// Backend operations the wizard depends on.
///
/// Implemented for [`QeAppClient`]; tests substitute an in-memory backend.
#[async_trait]
pub trait QeBackend: Send + Sync {
    async fn job_data(&self, job_id: &str) -> Result<JobData, BridgeError>;

    async fn supported_xps_core_levels(&self, structure: &Value) -> Result<XpsSupport, BridgeError>;

    async fn list_codes(&self) -> Result<Vec<CodeDescriptor>, BridgeError>;
}

#[async_trait]
impl QeBackend for QeAppClient {
    async fn job_data(&self, job_id: &str) -> Result<JobData, BridgeError> {
        Ok(QeAppClient::job_data(self, job_id).await?)
    }

    async fn supported_xps_core_levels(&self, structure: &Value) -> Result<XpsSupport, BridgeError> {
        Ok(QeAppClient::supported_xps_core_levels(self, structure).await?)
    }

    async fn list_codes(&self) -> Result<Vec<CodeDescriptor>, BridgeError> {
        Ok(QeAppClient::list_codes(self).await?)
    }
}
