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

//! Pipeline run accumulation and submission.
//!
//! A [`PipelineRun`] collects an ordered sequence of [`StepRecord`]s and is
//! consumed by [`PipelineRun::submit`], so a run cannot be mutated after
//! submission. Errors raised inside measured closures propagate to the
//! caller; the accumulator records nothing for a failed step and never
//! retries. Callers that want partial telemetry on failure should catch the
//! error, call [`PipelineRun::set_error`], and still submit.

use crate::client::PipetraceClient;
use crate::error::{PipetraceError, Result};
use crate::redact::RedactionPolicy;
use crate::types::{MetadataValue, RunPayload, StepContext, StepRecord};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use tracing::{debug, error, info};

/// Pipeline to bind a run to, by slug or by server-assigned id.
#[derive(Debug, Clone)]
pub enum PipelineHandle {
    Slug(String),
    Id(String),
}

impl PipelineHandle {
    pub fn slug(slug: impl Into<String>) -> Self {
        Self::Slug(slug.into())
    }

    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }
}

/// Options for starting a run.
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    pub metadata: HashMap<String, MetadataValue>,
    pub user_id: Option<String>,
}

/// Options for a measured step.
#[derive(Debug, Clone, Default)]
pub struct MeasureOptions {
    /// Provider label; defaults to "custom"
    pub provider: Option<String>,
    /// Model parameters recorded alongside the inputs
    pub model_params: Option<Value>,
    /// Rendering/metadata context for the step
    pub context: Option<StepContext>,
}

/// Options for submitting a run.
#[derive(Debug, Clone)]
pub struct SubmitOptions {
    /// Block until the server acknowledges persistence (default), or spawn
    /// the POST and return immediately
    pub wait_for_server: bool,
    /// Redaction applied to the serialized payload before transmission
    pub redact: Option<RedactionPolicy>,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            wait_for_server: true,
            redact: None,
        }
    }
}

impl SubmitOptions {
    /// Spawn the submission onto the runtime instead of awaiting it.
    pub fn fire_and_forget() -> Self {
        Self {
            wait_for_server: false,
            redact: None,
        }
    }

    /// Apply a redaction policy to the serialized payload.
    pub fn with_redaction(mut self, policy: RedactionPolicy) -> Self {
        self.redact = Some(policy);
        self
    }
}

/// Handle to a submitted run.
#[derive(Debug, Clone)]
pub struct SubmittedRun {
    /// Run identifier: server-assigned when the submission was awaited,
    /// the client-generated id otherwise
    pub run_id: String,
}

/// Accumulates the steps of one logical pipeline run.
pub struct PipelineRun {
    client: PipetraceClient,
    run_id: String,
    pipeline: PipelineHandle,
    steps: Vec<StepRecord>,
    metadata: HashMap<String, MetadataValue>,
    user_id: Option<String>,
    error: Option<String>,
}

impl PipelineRun {
    /// Start an empty run bound to a pipeline.
    pub fn start(client: &PipetraceClient, pipeline: PipelineHandle, options: StartOptions) -> Self {
        let run_id = generate_run_id();
        debug!(%run_id, "started pipeline run");
        Self {
            client: client.clone(),
            run_id,
            pipeline,
            steps: Vec::new(),
            metadata: options.metadata,
            user_id: options.user_id,
            error: None,
        }
    }

    /// The client-generated run identifier.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Steps recorded so far, in call order.
    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// Invoke `f` with the inputs, timing the invocation and appending a
    /// step record carrying the inputs and the returned outputs.
    ///
    /// An error from `f` propagates untouched; nothing is appended and no
    /// retry occurs.
    pub async fn measure<F, Fut, T, E>(
        &mut self,
        invocation: &str,
        inputs: Value,
        options: MeasureOptions,
        f: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce(Value) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        T: serde::Serialize,
    {
        let start = Utc::now();
        let result = f(inputs.clone()).await;
        let end = Utc::now();

        let output = result?;
        let step = build_step(invocation, inputs, &output, options, start, end);
        debug!(invocation, index = self.steps.len(), "recorded step");
        self.steps.push(step);
        Ok(output)
    }

    /// Append a pre-built step record (used by the provider step builders).
    pub fn add_step(&mut self, step: StepRecord) {
        debug!(invocation = %step.invocation, index = self.steps.len(), "recorded step");
        self.steps.push(step);
    }

    /// Attach a metadata entry to the run.
    pub fn add_metadata(&mut self, key: impl Into<String>, value: MetadataValue) {
        self.metadata.insert(key.into(), value);
    }

    /// Associate the run with an end user.
    pub fn set_user(&mut self, user_id: impl Into<String>) {
        self.user_id = Some(user_id.into());
    }

    /// Record an error string on the run.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    /// Serialize the run into its wire payload.
    pub fn to_payload(&self) -> RunPayload {
        let (pipeline_slug, pipeline_id) = match &self.pipeline {
            PipelineHandle::Slug(slug) => (Some(slug.clone()), None),
            PipelineHandle::Id(id) => (None, Some(id.clone())),
        };

        RunPayload {
            run_id: self.run_id.clone(),
            pipeline_slug,
            pipeline_id,
            steps: self.steps.clone(),
            metadata: self.metadata.clone(),
            user_id: self.user_id.clone(),
            error: self.error.clone(),
        }
    }

    /// Serialize the run, apply any redaction, and transmit it.
    ///
    /// Consumes the run. Returns the server-assigned identifier when
    /// `wait_for_server` is set, the client-generated one otherwise.
    pub async fn submit(self, options: SubmitOptions) -> Result<SubmittedRun> {
        let payload = self.to_payload();
        let body = serde_json::to_value(&payload)?;
        transmit(self.client.clone(), payload.run_id, body, options).await
    }

    /// Submit an already-serialized run, applying the same validation,
    /// redaction, and transmission path as [`PipelineRun::submit`].
    pub async fn submit_from_json(
        client: &PipetraceClient,
        serialized: Value,
        options: SubmitOptions,
    ) -> Result<SubmittedRun> {
        // The parse is validation only; the caller's serialized form is what
        // goes over the wire.
        let payload: RunPayload = serde_json::from_value(serialized.clone())
            .map_err(|e| PipetraceError::Validation(e.to_string()))?;

        transmit(client.clone(), payload.run_id, serialized, options).await
    }
}

async fn transmit(
    client: PipetraceClient,
    run_id: String,
    body: Value,
    options: SubmitOptions,
) -> Result<SubmittedRun> {
    let body = match &options.redact {
        Some(policy) => policy.apply(&body),
        None => body,
    };

    if options.wait_for_server {
        info!(%run_id, "submitting run");
        let response = client.ingest_run_value(&body).await?;
        Ok(SubmittedRun {
            run_id: response.run_id,
        })
    } else {
        info!(%run_id, "submitting run in background");
        let log_run_id = run_id.clone();
        tokio::spawn(async move {
            if let Err(e) = client.ingest_run_value(&body).await {
                error!(%log_run_id, error = %e, "background run submission failed");
            }
        });
        Ok(SubmittedRun { run_id })
    }
}

/// Time a synchronous callable and return its output together with the step
/// record, without touching any run.
///
/// This is the explicit adapter form of [`PipelineRun::measure`] for callers
/// that accumulate steps out of band.
pub fn measure_sync<F, T, E>(
    invocation: &str,
    inputs: Value,
    options: MeasureOptions,
    f: F,
) -> std::result::Result<(T, StepRecord), E>
where
    F: FnOnce(&Value) -> std::result::Result<T, E>,
    T: serde::Serialize,
{
    let start = Utc::now();
    let result = f(&inputs);
    let end = Utc::now();

    let output = result?;
    let step = build_step(invocation, inputs, &output, options, start, end);
    Ok((output, step))
}

fn build_step<T: serde::Serialize>(
    invocation: &str,
    inputs: Value,
    output: &T,
    options: MeasureOptions,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> StepRecord {
    let outputs = serde_json::to_value(output).unwrap_or(Value::Null);
    StepRecord {
        provider: options.provider.unwrap_or_else(|| "custom".into()),
        invocation: invocation.to_string(),
        start_time: start.to_rfc3339_opts(SecondsFormat::Millis, true),
        end_time: end.to_rfc3339_opts(SecondsFormat::Millis, true),
        elapsed_ms: (end - start).num_milliseconds(),
        inputs,
        model_params: options.model_params,
        outputs: Some(outputs),
        context: options.context,
    }
}

/// Generate a client-side run identifier.
fn generate_run_id() -> String {
    use rand::Rng;
    let timestamp = chrono::Utc::now().timestamp_millis();
    let random_bits: u16 = rand::thread_rng().gen();
    let run_id = ((timestamp as u64) << 16) | (random_bits as u64);
    format!("{:x}", run_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use serde_json::json;

    fn test_client() -> PipetraceClient {
        PipetraceClient::new(ClientConfig::new("test-key"))
    }

    #[tokio::test]
    async fn measure_appends_steps_in_call_order() {
        let client = test_client();
        let mut run = PipelineRun::start(
            &client,
            PipelineHandle::slug("summarize"),
            StartOptions::default(),
        );

        for i in 0..4 {
            let label = format!("step_{}", i);
            run.measure(&label, json!({ "n": i }), MeasureOptions::default(), |inputs| async move {
                Ok::<_, PipetraceError>(json!({ "echo": inputs["n"] }))
            })
            .await
            .unwrap();
        }

        let payload = run.to_payload();
        assert_eq!(payload.steps.len(), 4);
        for (i, step) in payload.steps.iter().enumerate() {
            assert_eq!(step.invocation, format!("step_{}", i));
            assert_eq!(step.inputs, json!({ "n": i }));
            assert_eq!(step.outputs, Some(json!({ "echo": i })));
        }
    }

    #[tokio::test]
    async fn measure_error_propagates_and_records_nothing() {
        let client = test_client();
        let mut run = PipelineRun::start(
            &client,
            PipelineHandle::slug("summarize"),
            StartOptions::default(),
        );

        let result: std::result::Result<Value, PipetraceError> = run
            .measure(
                "failing_step",
                json!({}),
                MeasureOptions::default(),
                |_| async { Err(PipetraceError::Validation("boom".into())) },
            )
            .await;

        assert!(result.is_err());
        assert!(run.steps().is_empty());

        // The caller records the error and still submits in cleanup.
        run.set_error("boom");
        assert_eq!(run.to_payload().error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn run_metadata_and_user_flow_into_payload() {
        let client = test_client();
        let mut run = PipelineRun::start(
            &client,
            PipelineHandle::id("pl-42"),
            StartOptions::default(),
        );
        run.add_metadata("release", MetadataValue::string("v1.2.3"));
        run.set_user("user-7");

        let payload = run.to_payload();
        assert_eq!(payload.pipeline_id.as_deref(), Some("pl-42"));
        assert!(payload.pipeline_slug.is_none());
        assert_eq!(
            payload.metadata.get("release"),
            Some(&MetadataValue::string("v1.2.3"))
        );
        assert_eq!(payload.user_id.as_deref(), Some("user-7"));
    }

    #[test]
    fn measure_sync_returns_output_and_step() {
        let (output, step) = measure_sync(
            "tokenize",
            json!({ "text": "hello world" }),
            MeasureOptions {
                provider: Some("local".into()),
                ..Default::default()
            },
            |inputs| {
                let text = inputs["text"].as_str().unwrap_or_default();
                Ok::<_, PipetraceError>(text.split_whitespace().count())
            },
        )
        .unwrap();

        assert_eq!(output, 2);
        assert_eq!(step.provider, "local");
        assert_eq!(step.invocation, "tokenize");
        assert_eq!(step.outputs, Some(json!(2)));
        assert!(step.elapsed_ms >= 0);
    }

    #[test]
    fn run_ids_are_hex_and_distinct() {
        let a = generate_run_id();
        let b = generate_run_id();
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
