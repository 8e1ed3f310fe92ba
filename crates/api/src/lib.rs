//! QE app backend client.
//!
//! This crate provides a lightweight client for the FastAPI backend that stores
//! jobs, inspects structures, and lists the configured codes. It focuses on:
//!
//! - Constructing an HTTP client with sensible defaults (JSON accept header, timeout)
//! - Validating the configured base URL for safety
//! - Mapping transport, status, and decoding failures onto [`ApiError`]
//!
//! The primary entry point is [`QeAppClient`].
//!
//! # Example
//!
//! ```ignore
//! use qeapp_api::QeAppClient;
//! use std::time::Duration;
//!
//! async fn show(job_id: &str) -> Result<(), qeapp_api::ApiError> {
//!     let client = QeAppClient::new("http://localhost:8000/api", Duration::from_secs(30))?;
//!     let job = client.job_data(job_id).await?;
//!     println!("status: {:?}", job.process_status);
//!     Ok(())
//! }
//! ```

use std::env;
use std::time::Duration;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use qeapp_types::{CodeDescriptor, DeleteJobOutcome, JobData, JobsPage, XpsSupport};
use reqwest::{Client, Method, RequestBuilder, Response, header};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Environment variable overriding the backend base URL.
pub const API_BASE_ENV: &str = "QEAPP_API_BASE";
/// Base URL used when nothing else is configured.
pub const DEFAULT_API_BASE: &str = "http://localhost:8000/api";
/// Request timeout applied when the caller does not choose one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Hostnames allowed to use plain HTTP.
const LOCALHOST_DOMAINS: &[&str] = &["localhost", "127.0.0.1"];

/// Characters escaped when a job identifier is placed in a path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'#').add(b'%').add(b'/').add(b'?').add(b'<').add(b'>');

/// Failures surfaced by [`QeAppClient`].
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid backend URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
/// Thin wrapper around a configured `reqwest::Client` for backend access.
pub struct QeAppClient {
    pub base_url: String,
    pub http: Client,
    pub user_agent: String,
}

impl QeAppClient {
    /// Builds a client for `base_url` with the given request timeout.
    ///
    /// `localhost` and `127.0.0.1` may use any scheme; every other host must
    /// use HTTPS.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        validate_base_url(base_url)?;

        let mut default_headers = header::HeaderMap::new();
        default_headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(default_headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            user_agent: format!("qeapp/0.1; {}", env::consts::OS),
        })
    }

    /// Build a `reqwest::RequestBuilder` for a method and API-relative path.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "building request");

        self.http
            .request(method, url)
            .header(header::USER_AGENT, &self.user_agent)
    }

    /// Fetches the stored wizard payload, process status, and output structure of a job.
    pub async fn job_data(&self, job_id: &str) -> Result<JobData, ApiError> {
        let response = self.request(Method::GET, &job_path(job_id)).send().await?;
        read_json(response).await
    }

    /// Lists submitted jobs, newest first.
    pub async fn list_jobs(&self) -> Result<JobsPage, ApiError> {
        let response = self.request(Method::GET, "/jobs-data").send().await?;
        read_json(response).await
    }

    /// Deletes a job and its provenance. `dry_run` reports without deleting.
    pub async fn delete_job(&self, job_id: &str, dry_run: bool) -> Result<DeleteJobOutcome, ApiError> {
        let response = self
            .request(Method::DELETE, &job_path(job_id))
            .query(&[("dry_run", dry_run)])
            .send()
            .await?;
        read_json(response).await
    }

    /// Asks which elements of `structure` have XPS core-level support.
    pub async fn supported_xps_core_levels(&self, structure: &Value) -> Result<XpsSupport, ApiError> {
        let response = self
            .request(Method::POST, "/calculation/get_supported_xps_core_level/")
            .json(&json!({ "structure": structure }))
            .send()
            .await?;
        read_json(response).await
    }

    /// Lists the codes registered on the backend.
    pub async fn list_codes(&self) -> Result<Vec<CodeDescriptor>, ApiError> {
        let response = self.request(Method::GET, "/codes").send().await?;
        read_json(response).await
    }
}

/// API-relative path of a single job.
pub fn job_path(job_id: &str) -> String {
    format!("/jobs-data/{}", utf8_percent_encode(job_id, PATH_SEGMENT))
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ApiError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(serde_json::from_str(&body)?)
}

/// Validate that a base URL is acceptable for use by the client.
///
/// Rules:
/// - `localhost` or `127.0.0.1`: any scheme is allowed
/// - otherwise: scheme must be HTTPS
fn validate_base_url(base: &str) -> Result<(), ApiError> {
    let invalid = |reason: String| ApiError::InvalidBaseUrl {
        url: base.to_string(),
        reason,
    };
    let parsed_base_url = Url::parse(base).map_err(|error| invalid(error.to_string()))?;

    let host_name = parsed_base_url
        .host_str()
        .ok_or_else(|| invalid("URL must include a host".into()))?;

    if LOCALHOST_DOMAINS
        .iter()
        .any(|&allowed| host_name.eq_ignore_ascii_case(allowed))
    {
        return Ok(());
    }

    if parsed_base_url.scheme() != "https" {
        return Err(invalid(format!(
            "non-localhost hosts must use https; got '{}://'",
            parsed_base_url.scheme()
        )));
    }

    Ok(())
}
