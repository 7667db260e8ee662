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

//! Pipetrace SDK Basic Example
//!
//! Records a small pipeline run with measured steps, provider step builders,
//! and redacted submission.

use pipetrace_client::providers::{openai, pinecone, StepTiming};
use pipetrace_client::{
    ClientConfig, MeasureOptions, Message, MetadataValue, PipelineHandle, PipelineRun,
    PipetraceClient, RedactionPolicy, SectionSelectors, StartOptions, StepSelector, SubmitOptions,
};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(_) => ClientConfig::new("demo-key").with_base_path("http://localhost:8080"),
    };
    let client = PipetraceClient::new(config);

    println!("Pipetrace Rust SDK Example\n");

    // 1. Start a run bound to a pipeline slug
    let mut run = PipelineRun::start(
        &client,
        PipelineHandle::slug("document-qa"),
        StartOptions::default(),
    );
    run.add_metadata("release", MetadataValue::string("v0.3.1"));
    run.set_user("user-123");
    println!("1. Started run {}", run.run_id());

    // 2. Measure an arbitrary step
    println!("2. Measuring a custom step...");
    let chunks = run
        .measure(
            "chunk_document",
            json!({ "document": "Paris is the capital of France." }),
            MeasureOptions::default(),
            |inputs| async move {
                let text = inputs["document"].as_str().unwrap_or_default().to_string();
                Ok::<_, pipetrace_client::PipetraceError>(json!({ "chunks": [text] }))
            },
        )
        .await?;
    println!("   Produced {} chunk(s)", chunks["chunks"].as_array().map(Vec::len).unwrap_or(0));

    // 3. Record a vector query via the Pinecone step builder
    println!("3. Recording a vector query step...");
    let request = json!({ "top_k": 3, "vector": [0.1, 0.2, 0.3] });
    let (response, timing) = StepTiming::around(|| async {
        // a real integration would call the Pinecone SDK here
        json!({ "matches": [{ "id": "doc-1", "score": 0.93 }] })
    })
    .await;
    run.add_step(pinecone::query_step(&request, &response, timing, None));

    // 4. Record a chat completion via the OpenAI step builder
    println!("4. Recording a chat completion step...");
    let params = openai::ChatParams {
        model: "gpt-4o".into(),
        messages: vec![
            Message::system("Answer from the retrieved context."),
            Message::user("What is the capital of France?"),
        ],
        temperature: Some(0.2),
        ..Default::default()
    };
    let (response, timing) = StepTiming::around(|| async {
        // a real integration would call the OpenAI SDK here
        json!({ "role": "assistant", "content": "The capital of France is Paris." })
    })
    .await;
    run.add_step(openai::chat_completion_step(&params, &response, timing, None));

    // 5. Submit with message contents redacted down to roles
    println!("5. Submitting run ({} steps)...", run.steps().len());
    let policy = RedactionPolicy::Uniform(
        SectionSelectors::keep_all()
            .with_inputs(StepSelector::from_json(&json!([["messages", 0, "role"]]))?),
    );

    match run
        .submit(SubmitOptions::default().with_redaction(policy))
        .await
    {
        Ok(submitted) => println!("   Submitted: {}\n", submitted.run_id),
        Err(e) => println!("   Warning: {}\n", e),
    }

    Ok(())
}
