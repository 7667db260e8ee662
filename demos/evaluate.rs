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

//! Pipetrace SDK Evaluation Example
//!
//! Fetches a pipeline's test cases, runs them with bounded parallelism, and
//! submits the outcomes as one test result. Partial telemetry is preserved
//! when a measured step fails.

use pipetrace_client::{
    evals, ClientConfig, MeasureOptions, PipelineHandle, PipelineRun, PipetraceClient,
    RunTestOptions, StartOptions, SubmitOptions,
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

    println!("Pipetrace Evaluation Example\n");

    // 1. Run every test case of a pipeline with 5 workers
    println!("1. Running test cases...");
    match evals::run_test(
        &client,
        "document-qa",
        RunTestOptions::default()
            .with_parallelism(5)
            .with_result_name("nightly"),
        |case| async move {
            // a real integration would drive the pipeline under test here
            Ok(json!({ "answer": case.inputs["question"] }))
        },
    )
    .await
    {
        Ok(result) => println!("   Submitted test result: {}\n", result.result_id),
        Err(e) => println!("   Warning: {}\n", e),
    }

    // 2. The cleanup pattern for failing measured steps: record the error
    //    and still submit, so partial telemetry is not lost.
    println!("2. Submitting a failed run with partial telemetry...");
    let mut run = PipelineRun::start(
        &client,
        PipelineHandle::slug("document-qa"),
        StartOptions::default(),
    );

    let outcome: Result<serde_json::Value, pipetrace_client::PipetraceError> = run
        .measure(
            "flaky_step",
            json!({ "question": "?" }),
            MeasureOptions::default(),
            |_| async { Err(pipetrace_client::PipetraceError::Validation("model refused".into())) },
        )
        .await;

    if let Err(e) = outcome {
        run.set_error(e.to_string());
    }

    match run.submit(SubmitOptions::default()).await {
        Ok(submitted) => println!("   Submitted: {}\n", submitted.run_id),
        Err(e) => println!("   Warning: {}\n", e),
    }

    Ok(())
}
