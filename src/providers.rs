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

//! Provider step builders.
//!
//! Typed constructors that turn a provider call's request and response into
//! a [`StepRecord`] ready for [`PipelineRun::add_step`](crate::PipelineRun::add_step).
//! The SDK does not wrap provider clients; callers invoke their provider SDK
//! directly, capture timing with [`StepTiming::around`], and hand the request
//! and response here.

use crate::types::{Message, StepContext, StepRecord};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use std::future::Future;

/// Wall-clock bounds of one provider call.
#[derive(Debug, Clone)]
pub struct StepTiming {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl StepTiming {
    /// Run a future and capture its wall-clock bounds.
    pub async fn around<F, Fut, T>(f: F) -> (T, StepTiming)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let start = Utc::now();
        let output = f().await;
        let end = Utc::now();
        (output, StepTiming { start, end })
    }

    fn into_stamps(self) -> (String, String, i64) {
        let elapsed_ms = (self.end - self.start).num_milliseconds();
        (
            self.start.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.end.to_rfc3339_opts(SecondsFormat::Millis, true),
            elapsed_ms,
        )
    }
}

fn build_step(
    provider: &str,
    invocation: &str,
    inputs: Value,
    model_params: Option<Value>,
    outputs: &Value,
    timing: StepTiming,
    context: Option<StepContext>,
) -> StepRecord {
    let (start_time, end_time, elapsed_ms) = timing.into_stamps();
    StepRecord {
        provider: provider.to_string(),
        invocation: invocation.to_string(),
        start_time,
        end_time,
        elapsed_ms,
        inputs,
        model_params,
        outputs: Some(outputs.clone()),
        context,
    }
}

/// Step builders for OpenAI-style chat, completion, and embedding calls.
pub mod openai {
    use super::*;

    const PROVIDER: &str = "openai";

    /// Parameters of a chat-completion call, split so that the prompt
    /// content lands in step inputs and the sampling knobs in model params.
    #[derive(Debug, Clone, Default)]
    pub struct ChatParams {
        pub model: String,
        pub messages: Vec<Message>,
        pub temperature: Option<f64>,
        pub top_p: Option<f64>,
        pub max_tokens: Option<u64>,
        /// Additional provider parameters merged into model params
        pub extra: Option<Value>,
    }

    /// Parameters of a text-completion call.
    #[derive(Debug, Clone, Default)]
    pub struct CompletionParams {
        pub model: String,
        pub prompt: Value,
        pub temperature: Option<f64>,
        pub max_tokens: Option<u64>,
        pub extra: Option<Value>,
    }

    /// Parameters of an embedding call.
    #[derive(Debug, Clone, Default)]
    pub struct EmbeddingParams {
        pub model: String,
        pub input: Value,
    }

    fn model_params(model: &str, knobs: &[(&str, Option<Value>)], extra: &Option<Value>) -> Value {
        let mut map = serde_json::Map::new();
        map.insert("model".into(), json!(model));
        for (key, value) in knobs {
            if let Some(value) = value {
                map.insert(key.to_string(), value.clone());
            }
        }
        if let Some(Value::Object(extra)) = extra {
            for (key, value) in extra {
                map.insert(key.clone(), value.clone());
            }
        }
        Value::Object(map)
    }

    /// Record a chat-completion call as a step.
    pub fn chat_completion_step(
        params: &ChatParams,
        response: &Value,
        timing: StepTiming,
        context: Option<StepContext>,
    ) -> StepRecord {
        let inputs = json!({ "messages": params.messages });
        let model_params = model_params(
            &params.model,
            &[
                ("temperature", params.temperature.map(|v| json!(v))),
                ("top_p", params.top_p.map(|v| json!(v))),
                ("max_tokens", params.max_tokens.map(|v| json!(v))),
            ],
            &params.extra,
        );

        build_step(
            PROVIDER,
            "openai_chat_completion",
            inputs,
            Some(model_params),
            response,
            timing,
            context,
        )
    }

    /// Record a text-completion call as a step.
    pub fn completion_step(
        params: &CompletionParams,
        response: &Value,
        timing: StepTiming,
        context: Option<StepContext>,
    ) -> StepRecord {
        let inputs = json!({ "prompt": params.prompt });
        let model_params = model_params(
            &params.model,
            &[
                ("temperature", params.temperature.map(|v| json!(v))),
                ("max_tokens", params.max_tokens.map(|v| json!(v))),
            ],
            &params.extra,
        );

        build_step(
            PROVIDER,
            "openai_completion",
            inputs,
            Some(model_params),
            response,
            timing,
            context,
        )
    }

    /// Record an embedding call as a step.
    pub fn embedding_step(
        params: &EmbeddingParams,
        response: &Value,
        timing: StepTiming,
        context: Option<StepContext>,
    ) -> StepRecord {
        let inputs = json!({ "input": params.input });
        let model_params = json!({ "model": params.model });

        build_step(
            PROVIDER,
            "openai_embedding",
            inputs,
            Some(model_params),
            response,
            timing,
            context,
        )
    }
}

/// Step builders for Pinecone-style vector index calls.
pub mod pinecone {
    use super::*;

    const PROVIDER: &str = "pinecone";

    fn index_step(
        invocation: &str,
        request: &Value,
        response: &Value,
        timing: StepTiming,
        context: Option<StepContext>,
    ) -> StepRecord {
        build_step(
            PROVIDER,
            invocation,
            request.clone(),
            None,
            response,
            timing,
            context,
        )
    }

    /// Record a vector upsert as a step.
    pub fn upsert_step(
        request: &Value,
        response: &Value,
        timing: StepTiming,
        context: Option<StepContext>,
    ) -> StepRecord {
        index_step("pinecone_upsert", request, response, timing, context)
    }

    /// Record a vector query as a step.
    pub fn query_step(
        request: &Value,
        response: &Value,
        timing: StepTiming,
        context: Option<StepContext>,
    ) -> StepRecord {
        index_step("pinecone_query", request, response, timing, context)
    }

    /// Record a vector fetch as a step.
    pub fn fetch_step(
        request: &Value,
        response: &Value,
        timing: StepTiming,
        context: Option<StepContext>,
    ) -> StepRecord {
        index_step("pinecone_fetch", request, response, timing, context)
    }

    /// Record a vector deletion as a step.
    pub fn delete_step(
        request: &Value,
        response: &Value,
        timing: StepTiming,
        context: Option<StepContext>,
    ) -> StepRecord {
        index_step("pinecone_delete", request, response, timing, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RenderContext;

    #[tokio::test]
    async fn chat_completion_step_splits_inputs_and_params() {
        let params = openai::ChatParams {
            model: "gpt-4o".into(),
            messages: vec![Message::user("What is the capital of France?")],
            temperature: Some(0.2),
            ..Default::default()
        };

        let (response, timing) =
            StepTiming::around(|| async { json!({ "content": "Paris" }) }).await;
        let step = openai::chat_completion_step(&params, &response, timing, None);

        assert_eq!(step.provider, "openai");
        assert_eq!(step.invocation, "openai_chat_completion");
        assert_eq!(
            step.inputs["messages"][0]["content"],
            json!("What is the capital of France?")
        );
        let model_params = step.model_params.unwrap();
        assert_eq!(model_params["model"], json!("gpt-4o"));
        assert_eq!(model_params["temperature"], json!(0.2));
        assert!(model_params.get("top_p").is_none());
        assert_eq!(step.outputs, Some(json!({ "content": "Paris" })));
        assert!(step.elapsed_ms >= 0);
    }

    #[tokio::test]
    async fn pinecone_query_step_records_request_and_response() {
        let request = json!({ "top_k": 3, "vector": [0.1, 0.2] });
        let (response, timing) =
            StepTiming::around(|| async { json!({ "matches": [] }) }).await;

        let context = StepContext {
            render: Some(RenderContext::html("summary")),
        };
        let step = pinecone::query_step(&request, &response, timing, Some(context));

        assert_eq!(step.provider, "pinecone");
        assert_eq!(step.invocation, "pinecone_query");
        assert_eq!(step.inputs, request);
        assert!(step.model_params.is_none());
        assert_eq!(step.context.unwrap().render.unwrap().key, "summary");
    }
}
