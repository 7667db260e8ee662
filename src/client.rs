// Copyright 2025 Pipetrace Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Pipetrace Client
//!
//! Async client for the Pipetrace tracing and evaluation service.

use crate::config::ClientConfig;
use crate::error::{PipetraceError, Result};
use crate::types::*;
use reqwest::Client as HttpClient;
use serde_json::Value;
use tracing::debug;

/// Pipetrace client for Rust applications.
///
/// # Example
///
/// ```no_run
/// use pipetrace_client::{ClientConfig, PipetraceClient};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = ClientConfig::new("pt-api-key")
///         .with_base_path("http://localhost:8080");
///
///     let client = PipetraceClient::new(config);
///     let pipelines = client.get_pipelines(Default::default()).await?;
///     println!("{} pipelines", pipelines.len());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct PipetraceClient {
    config: ClientConfig,
    http_client: HttpClient,
}

impl PipetraceClient {
    /// Create a new Pipetrace client.
    pub fn new(config: ClientConfig) -> Self {
        let http_client = HttpClient::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(50)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            config,
            http_client,
        }
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Make an HTTP request to the Pipetrace service.
    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
        params: Option<&[(&str, String)]>,
    ) -> Result<T> {
        let url = format!("{}{}", self.config.base_path.trim_end_matches('/'), path);
        debug!(%url, "sending request");

        let mut request = self.http_client.request(method, &url);
        request = request
            .header("Content-Type", "application/json")
            .bearer_auth(&self.config.api_key);

        if let Some(params) = params {
            request = request.query(params);
        }

        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PipetraceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let result = response.json().await?;
        Ok(result)
    }

    /// Submit a serialized run to the ingestion endpoint.
    ///
    /// Most callers go through [`PipelineRun::submit`](crate::PipelineRun::submit);
    /// this is the raw wire call it bottoms out in.
    pub async fn ingest_run_value(&self, payload: &Value) -> Result<RunResponse> {
        self.request(
            reqwest::Method::POST,
            "/api/v1/runs",
            Some(payload.clone()),
            None,
        )
        .await
    }

    /// Submit a typed run payload to the ingestion endpoint.
    pub async fn ingest_run(&self, payload: &RunPayload) -> Result<RunResponse> {
        let body = serde_json::to_value(payload)?;
        self.ingest_run_value(&body).await
    }

    /// List pipelines, optionally filtered by label or slug.
    pub async fn get_pipelines(&self, filter: PipelineFilter) -> Result<Vec<Pipeline>> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(label) = filter.label {
            params.push(("label", label));
        }
        if let Some(slug) = filter.slug {
            params.push(("slug", slug));
        }

        let response: PipelineList = self
            .request(
                reqwest::Method::GET,
                "/api/v1/pipelines",
                None,
                if params.is_empty() {
                    None
                } else {
                    Some(&params)
                },
            )
            .await?;
        Ok(response.pipelines)
    }

    /// Fetch the test cases registered for a pipeline.
    pub async fn get_test_cases(&self, pipeline_slug: &str) -> Result<Vec<TestCase>> {
        let params = [("pipeline_slug", pipeline_slug.to_string())];
        let response: TestCaseList = self
            .request(
                reqwest::Method::GET,
                "/api/v1/test-cases",
                None,
                Some(&params),
            )
            .await?;
        Ok(response.test_cases)
    }

    /// Submit a test result: one outcome per test case.
    pub async fn submit_test_result(
        &self,
        request: &SubmitTestResultRequest,
    ) -> Result<TestResultResponse> {
        let body = serde_json::to_value(request)?;
        self.request(
            reqwest::Method::POST,
            "/api/v1/test-results",
            Some(body),
            None,
        )
        .await
    }

    /// Get the processing status of a submitted test result.
    pub async fn get_test_result_status(&self, result_id: &str) -> Result<TestResultStatus> {
        self.request(
            reqwest::Method::GET,
            &format!("/api/v1/test-results/{}/status", result_id),
            None,
            None,
        )
        .await
    }

    /// List historical test runs for a pipeline.
    pub async fn get_test_runs(&self, pipeline_slug: &str) -> Result<Vec<TestRun>> {
        let params = [("pipeline_slug", pipeline_slug.to_string())];
        let response: TestRunList = self
            .request(
                reqwest::Method::GET,
                "/api/v1/test-runs",
                None,
                Some(&params),
            )
            .await?;
        Ok(response.test_runs)
    }

    /// List datasets, optionally scoped to a pipeline.
    pub async fn get_datasets(&self, pipeline_slug: Option<&str>) -> Result<Vec<Dataset>> {
        let params: Vec<(&str, String)> = pipeline_slug
            .map(|slug| vec![("pipeline_slug", slug.to_string())])
            .unwrap_or_default();

        let response: DatasetList = self
            .request(
                reqwest::Method::GET,
                "/api/v1/datasets",
                None,
                if params.is_empty() {
                    None
                } else {
                    Some(&params)
                },
            )
            .await?;
        Ok(response.datasets)
    }

    /// Create a dataset.
    pub async fn create_dataset(&self, request: &CreateDatasetRequest) -> Result<Dataset> {
        let body = serde_json::to_value(request)?;
        self.request(reqwest::Method::POST, "/api/v1/datasets", Some(body), None)
            .await
    }

    /// List evaluators registered for a pipeline.
    pub async fn get_evaluators(&self, pipeline_slug: &str) -> Result<Vec<Evaluator>> {
        let params = [("pipeline_slug", pipeline_slug.to_string())];
        let response: EvaluatorList = self
            .request(
                reqwest::Method::GET,
                "/api/v1/evaluators",
                None,
                Some(&params),
            )
            .await?;
        Ok(response.evaluators)
    }

    /// Attach evaluations to runs in bulk.
    pub async fn bulk_create_evaluations(
        &self,
        request: &BulkEvaluationRequest,
    ) -> Result<BulkEvaluationResponse> {
        let body = serde_json::to_value(request)?;
        self.request(
            reqwest::Method::POST,
            "/api/v1/evaluations/bulk",
            Some(body),
            None,
        )
        .await
    }

    /// Upload a file and return its hosted URL.
    pub async fn upload_file(
        &self,
        bytes: Vec<u8>,
        file_name: impl Into<String>,
        mime_type: &str,
    ) -> Result<FileUploadResponse> {
        let url = format!(
            "{}/api/v1/files/upload",
            self.config.base_path.trim_end_matches('/')
        );

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.into())
            .mime_str(mime_type)?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PipetraceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let result = response.json().await?;
        Ok(result)
    }

    /// Check service health.
    pub async fn health(&self) -> Result<HealthResponse> {
        self.request(reqwest::Method::GET, "/api/v1/health", None, None)
            .await
    }
}
