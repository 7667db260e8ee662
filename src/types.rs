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

//! Pipetrace SDK Types
//!
//! Wire types exchanged with the Pipetrace service. All JSON bodies use
//! snake_case field names.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One recorded step of a pipeline run.
///
/// A step is immutable once appended to a run; redaction operates on the
/// serialized payload, never on the record itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// Provider that served the call (e.g. "openai", "pinecone")
    pub provider: String,
    /// Invocation label (e.g. "openai_chat_completion")
    pub invocation: String,
    /// RFC 3339 start timestamp
    pub start_time: String,
    /// RFC 3339 end timestamp
    pub end_time: String,
    /// Elapsed wall-clock time in milliseconds
    pub elapsed_ms: i64,
    /// Structured inputs of the call
    #[serde(default)]
    pub inputs: serde_json::Value,
    /// Model parameters, when the call had any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_params: Option<serde_json::Value>,
    /// Structured outputs of the call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<serde_json::Value>,
    /// Optional rendering/metadata context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<StepContext>,
}

/// Context attached to a recorded step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render: Option<RenderContext>,
}

/// Declares how a named output field should be interpreted by viewers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderContext {
    /// Render kind (currently only "html")
    pub kind: String,
    /// Output field the hint applies to
    pub key: String,
}

impl RenderContext {
    /// Declare that the named output field holds renderable HTML.
    pub fn html(key: impl Into<String>) -> Self {
        Self {
            kind: "html".into(),
            key: key.into(),
        }
    }
}

/// Run-level metadata value, tagged with its type on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum MetadataValue {
    String(String),
    Url(String),
    Json(serde_json::Value),
}

impl MetadataValue {
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    pub fn url(value: impl Into<String>) -> Self {
        Self::Url(value.into())
    }

    pub fn json(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

/// Serialized form of a pipeline run, as submitted to the ingestion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunPayload {
    /// Client-generated run identifier used for correlation
    pub run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_id: Option<String>,
    #[serde(default)]
    pub steps: Vec<StepRecord>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, MetadataValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response from run ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResponse {
    /// Server-assigned run identifier
    pub run_id: String,
}

/// A pipeline registered on the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<String>,
}

/// Filters for listing pipelines.
#[derive(Debug, Clone, Default)]
pub struct PipelineFilter {
    pub label: Option<String>,
    pub slug: Option<String>,
}

/// Response envelope for pipeline listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineList {
    pub pipelines: Vec<Pipeline>,
}

/// A test case belonging to a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub inputs: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_outputs: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<String>,
}

/// Response envelope for test-case listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCaseList {
    pub test_cases: Vec<TestCase>,
}

/// Outcome of running one test case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCaseResult {
    /// Test case this outcome belongs to
    pub case_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Request body for submitting a test result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitTestResultRequest {
    pub pipeline_slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_name: Option<String>,
    pub results: Vec<TestCaseResult>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, MetadataValue>,
}

/// Response from test-result submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResultResponse {
    /// Server-assigned test result identifier
    pub result_id: String,
}

/// Processing status of a submitted test result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResultStatus {
    pub result_id: String,
    /// One of "pending", "running", "done", "failed"
    pub status: String,
}

/// A historical test run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRun {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_result_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Response envelope for test-run listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRunList {
    pub test_runs: Vec<TestRun>,
}

/// A dataset of captured inputs/outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Response envelope for dataset listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetList {
    pub datasets: Vec<Dataset>,
}

/// Request body for creating a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDatasetRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_slug: Option<String>,
}

/// An evaluator registered for a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluator {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Response envelope for evaluator listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorList {
    pub evaluators: Vec<Evaluator>,
}

/// One evaluation attached to a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationInput {
    pub evaluator_id: String,
    pub run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Request body for bulk evaluation creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkEvaluationRequest {
    pub evaluations: Vec<EvaluationInput>,
}

/// Response from bulk evaluation creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkEvaluationResponse {
    /// Number of evaluations created
    pub count: i64,
}

/// Response from file upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileUploadResponse {
    /// Hosted URL of the uploaded file
    pub url: String,
}

/// Response from health check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_value_wire_shape() {
        let value = MetadataValue::string("hello");
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "string", "value": "hello" })
        );

        let value = MetadataValue::json(serde_json::json!({ "k": 1 }));
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "json", "value": { "k": 1 } })
        );
    }

    #[test]
    fn step_record_omits_absent_sections() {
        let step = StepRecord {
            provider: "openai".into(),
            invocation: "openai_chat_completion".into(),
            start_time: "2025-01-01T00:00:00Z".into(),
            end_time: "2025-01-01T00:00:01Z".into(),
            elapsed_ms: 1000,
            inputs: serde_json::json!({ "messages": [] }),
            model_params: None,
            outputs: None,
            context: None,
        };

        let json = serde_json::to_value(&step).unwrap();
        let obj = json.as_object().unwrap();
        assert!(obj.contains_key("inputs"));
        assert!(!obj.contains_key("model_params"));
        assert!(!obj.contains_key("outputs"));
        assert!(!obj.contains_key("context"));
    }

    #[test]
    fn run_payload_round_trips_without_optional_fields() {
        let json = serde_json::json!({
            "run_id": "abc123",
            "pipeline_slug": "summarize",
            "steps": [],
        });

        let payload: RunPayload = serde_json::from_value(json).unwrap();
        assert_eq!(payload.run_id, "abc123");
        assert!(payload.steps.is_empty());
        assert!(payload.metadata.is_empty());
        assert!(payload.error.is_none());
    }
}
