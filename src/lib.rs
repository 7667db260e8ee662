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

//! # Pipetrace SDK for Rust
//!
//! Client SDK for recording and evaluating LLM pipeline runs on the
//! Pipetrace platform.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pipetrace_client::{
//!     ClientConfig, MeasureOptions, PipelineHandle, PipelineRun, PipetraceClient,
//!     StartOptions, SubmitOptions,
//! };
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::from_env()?;
//!     let client = PipetraceClient::new(config);
//!
//!     let mut run = PipelineRun::start(
//!         &client,
//!         PipelineHandle::slug("summarize"),
//!         StartOptions::default(),
//!     );
//!
//!     run.measure(
//!         "summarize_document",
//!         json!({ "document": "..." }),
//!         MeasureOptions::default(),
//!         |_inputs| async move {
//!             // call your model here
//!             Ok::<_, pipetrace_client::PipetraceError>(json!({ "summary": "..." }))
//!         },
//!     )
//!     .await?;
//!
//!     let submitted = run.submit(SubmitOptions::default()).await?;
//!     println!("Submitted run: {}", submitted.run_id);
//!     Ok(())
//! }
//! ```
//!
//! ## Redacting fields before submission
//!
//! ```no_run
//! use pipetrace_client::{RedactionPolicy, SectionSelectors, StepSelector, SubmitOptions};
//!
//! # fn example() -> SubmitOptions {
//! // Drop model parameters from every step; keep only message roles.
//! let policy = RedactionPolicy::Uniform(
//!     SectionSelectors::keep_all()
//!         .with_model_params(StepSelector::DropAll)
//!         .with_inputs(StepSelector::from_json(
//!             &serde_json::json!([["messages", 0, "role"]]),
//!         ).unwrap()),
//! );
//!
//! SubmitOptions::default().with_redaction(policy)
//! # }
//! ```
//!
//! ## Running test cases
//!
//! ```no_run
//! use pipetrace_client::{evals, ClientConfig, PipetraceClient, RunTestOptions};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = PipetraceClient::new(ClientConfig::from_env()?);
//!
//! let result = evals::run_test(
//!     &client,
//!     "summarize",
//!     RunTestOptions::default().with_parallelism(5),
//!     |case| async move {
//!         // produce an output for this test case
//!         Ok(json!({ "summary": case.inputs["document"] }))
//!     },
//! )
//! .await?;
//!
//! println!("Submitted test result: {}", result.result_id);
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod redact;
mod run;
mod types;

pub mod evals;
pub mod providers;

pub use client::PipetraceClient;
pub use config::{ClientConfig, DEFAULT_BASE_PATH, ENV_API_KEY, ENV_BASE_PATH, ENV_RESULT_NAME};
pub use error::{PipetraceError, Result};
pub use evals::{run_cases_bounded, run_test, RunTestOptions};
pub use redact::{
    FieldPath, PathSegment, RedactionPolicy, SectionSelectors, StepSelector,
};
pub use run::{
    measure_sync, MeasureOptions, PipelineHandle, PipelineRun, StartOptions, SubmitOptions,
    SubmittedRun,
};
pub use types::*;
