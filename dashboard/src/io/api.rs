//! Typed client for the orchestration server's REST surface.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::core::types::{Module, PackageSource, RunSession};

/// REST call failure.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport or protocol error before a response body was read.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// Non-success response; `detail` carries the server's reason when present.
    #[error("{detail}")]
    Rejected { status: StatusCode, detail: String },
}

/// One module reference inside a run submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestRef {
    pub name: String,
    pub path: String,
}

/// Body of a run-submission request.
///
/// Exactly one of `url` / `apk_name` is set, mirroring the `PackageSource`
/// enum; the server routes each to its own endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunRequest {
    pub tests_to_run: Vec<TestRef>,
    pub app_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apk_name: Option<String>,
}

impl RunRequest {
    /// Build the submission body from the session's selected modules and source.
    ///
    /// Returns `None` when no package source is set; the controller checks
    /// that precondition before calling.
    pub fn from_session(session: &RunSession) -> Option<Self> {
        let source = session.source.as_ref()?;
        let (url, apk_name) = match source {
            PackageSource::Url(url) => (Some(url.clone()), None),
            PackageSource::Staged(name) => (None, Some(name.clone())),
        };
        Some(Self {
            tests_to_run: session
                .selected_modules()
                .map(|module: &Module| TestRef {
                    name: module.name.clone(),
                    path: module.path.clone(),
                })
                .collect(),
            app_type: session.variant.clone(),
            url,
            apk_name,
        })
    }
}

/// Fields consumed from a successful run submission.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunAccepted {
    #[serde(default)]
    pub app_icon: Option<String>,
    #[serde(default)]
    pub app_name: Option<String>,
    pub apk_path: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeviceStatus {
    connected: bool,
}

#[derive(Debug, Deserialize)]
struct DriverStatus {
    status: String,
}

#[derive(Debug, Deserialize)]
struct ApkList {
    #[serde(default)]
    apks: Vec<String>,
}

/// Handle to the orchestration server. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Submit a run, routed by package source kind.
    pub async fn submit_run(&self, request: &RunRequest) -> Result<RunAccepted, ApiError> {
        let path = if request.apk_name.is_some() {
            "/start-test-existing"
        } else {
            "/start-test"
        };
        debug!(path, app_type = %request.app_type, "submitting run");
        let response = self.http.post(self.url(path)).json(request).send().await?;
        if !response.status().is_success() {
            return Err(rejected(response).await);
        }
        Ok(response.json().await?)
    }

    /// Request run cancellation. Best-effort; the body is logged, not validated.
    pub async fn stop_run(&self) -> Result<String, ApiError> {
        let response = self.http.post(self.url("/stop-test")).send().await?;
        Ok(response.text().await?)
    }

    /// Request generation of a (partial) report. Best-effort.
    pub async fn generate_report(&self) -> Result<(), ApiError> {
        let response = self.http.post(self.url("/generate-report")).send().await?;
        if !response.status().is_success() {
            return Err(rejected(response).await);
        }
        Ok(())
    }

    /// Poll device connectivity.
    pub async fn device_status(&self) -> Result<bool, ApiError> {
        let response = self.http.get(self.url("/device-status")).send().await?;
        if !response.status().is_success() {
            return Err(rejected(response).await);
        }
        let status: DeviceStatus = response.json().await?;
        Ok(status.connected)
    }

    /// Poll the automation driver's status string.
    pub async fn driver_status(&self) -> Result<String, ApiError> {
        let response = self.http.get(self.url("/driver-status")).send().await?;
        if !response.status().is_success() {
            return Err(rejected(response).await);
        }
        let status: DriverStatus = response.json().await?;
        Ok(status.status)
    }

    /// Ask the server to start the automation driver.
    pub async fn start_driver(&self) -> Result<String, ApiError> {
        let response = self.http.post(self.url("/driver/start")).send().await?;
        if !response.status().is_success() {
            return Err(rejected(response).await);
        }
        let status: DriverStatus = response.json().await?;
        Ok(status.status)
    }

    /// Ask the server to stop the automation driver.
    pub async fn stop_driver(&self) -> Result<String, ApiError> {
        let response = self.http.post(self.url("/driver/stop")).send().await?;
        if !response.status().is_success() {
            return Err(rejected(response).await);
        }
        let status: DriverStatus = response.json().await?;
        Ok(status.status)
    }

    /// List packages already staged on the server.
    pub async fn list_staged_packages(&self) -> Result<Vec<String>, ApiError> {
        let response = self.http.get(self.url("/api/apk-list")).send().await?;
        if !response.status().is_success() {
            return Err(rejected(response).await);
        }
        let list: ApkList = response.json().await?;
        Ok(list.apks)
    }
}

/// Turn a non-success response into `ApiError::Rejected`, preferring the
/// server's `detail` field over raw body text.
async fn rejected(response: reqwest::Response) -> ApiError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|parsed| parsed.detail)
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("server returned {status}")
            } else {
                body.trim().to_string()
            }
        });
    ApiError::Rejected { status, detail }
}
