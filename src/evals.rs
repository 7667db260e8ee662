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

//! Batch test-run helpers.
//!
//! Fetches a pipeline's test cases, applies a caller-supplied interaction
//! function to each (optionally with bounded parallelism), and submits the
//! outcomes as one test result. A failing case never halts its siblings and
//! is never retried; its error string lands in that case's result slot.

use crate::client::PipetraceClient;
use crate::error::{PipetraceError, Result};
use crate::types::{SubmitTestResultRequest, TestCase, TestCaseResult, TestResultResponse};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Options for [`run_test`].
#[derive(Debug, Clone)]
pub struct RunTestOptions {
    /// Number of concurrent workers; 1 runs cases sequentially
    pub parallelism: usize,
    /// Name for the submitted result; falls back to the configured default
    pub result_name: Option<String>,
    /// Surface the first case failure instead of submitting the rest
    pub fail_fast: bool,
}

impl Default for RunTestOptions {
    fn default() -> Self {
        Self {
            parallelism: 1,
            result_name: None,
            fail_fast: false,
        }
    }
}

impl RunTestOptions {
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn with_result_name(mut self, name: impl Into<String>) -> Self {
        self.result_name = Some(name.into());
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }
}

/// Fetch a pipeline's test cases, run `interaction` over each, and submit
/// the outcomes as a single test result.
///
/// Returns the server-assigned result identifier.
pub async fn run_test<F, Fut>(
    client: &PipetraceClient,
    pipeline_slug: &str,
    options: RunTestOptions,
    interaction: F,
) -> Result<TestResultResponse>
where
    F: Fn(TestCase) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    let cases = client.get_test_cases(pipeline_slug).await?;
    info!(
        pipeline_slug,
        cases = cases.len(),
        parallelism = options.parallelism,
        "running test cases"
    );

    let outcomes = if options.parallelism > 1 {
        run_cases_bounded(cases.clone(), options.parallelism, interaction).await
    } else {
        let mut outcomes = Vec::with_capacity(cases.len());
        for case in cases.clone() {
            outcomes.push(interaction(case).await);
        }
        outcomes
    };

    let mut results = Vec::with_capacity(cases.len());
    for (case, outcome) in cases.into_iter().zip(outcomes) {
        match outcome {
            Ok(outputs) => results.push(TestCaseResult {
                case_id: case.id,
                inputs: Some(case.inputs),
                outputs: Some(outputs),
                error: None,
            }),
            Err(e) if options.fail_fast => return Err(e),
            Err(e) => {
                warn!(case_id = %case.id, error = %e, "test case failed");
                results.push(TestCaseResult {
                    case_id: case.id,
                    inputs: Some(case.inputs),
                    outputs: None,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    let request = SubmitTestResultRequest {
        pipeline_slug: pipeline_slug.to_string(),
        result_name: options
            .result_name
            .or_else(|| client.config().result_name.clone()),
        results,
        metadata: HashMap::new(),
    };

    client.submit_test_result(&request).await
}

/// Run `f` over `items` with at most `width` concurrent workers.
///
/// The output vector is ordered by the original item index regardless of
/// completion order. A failing item occupies its own slot; siblings run to
/// completion and nothing is retried.
pub async fn run_cases_bounded<T, O, F, Fut>(
    items: Vec<T>,
    width: usize,
    f: F,
) -> Vec<Result<O>>
where
    T: Send + 'static,
    O: Send + 'static,
    F: Fn(T) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<O>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(width.max(1)));
    let mut tasks = Vec::with_capacity(items.len());

    for item in items {
        let semaphore = Arc::clone(&semaphore);
        let f = f.clone();
        tasks.push(tokio::spawn(async move {
            let _permit = semaphore.acquire().await.unwrap();
            f(item).await
        }));
    }

    // Awaiting the handles in spawn order writes each result back into the
    // slot of the item that produced it.
    let mut results = Vec::with_capacity(tasks.len());
    for task in tasks {
        match task.await {
            Ok(result) => results.push(result),
            Err(e) => results.push(Err(PipetraceError::Panic(e.to_string()))),
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn bounded_pool_preserves_input_order() {
        let items: Vec<usize> = (0..10).collect();

        // Later items finish first, so completion order inverts input order.
        let results = run_cases_bounded(items.clone(), 5, |i| async move {
            tokio::time::sleep(Duration::from_millis((10 - i as u64) * 5)).await;
            Ok(i * 2)
        })
        .await;

        assert_eq!(results.len(), 10);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(*result.as_ref().unwrap(), items[i] * 2);
        }
    }

    #[tokio::test]
    async fn bounded_pool_never_exceeds_width() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let in_flight_ref = Arc::clone(&in_flight);
        let peak_ref = Arc::clone(&peak);
        let results = run_cases_bounded((0..20).collect::<Vec<_>>(), 3, move |i| {
            let in_flight = Arc::clone(&in_flight_ref);
            let peak = Arc::clone(&peak_ref);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(i)
            }
        })
        .await;

        assert_eq!(results.len(), 20);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn one_failure_does_not_halt_siblings() {
        let results = run_cases_bounded((0..5).collect::<Vec<_>>(), 2, |i| async move {
            if i == 2 {
                Err(PipetraceError::Validation("bad case".into()))
            } else {
                Ok(json!({ "i": i }))
            }
        })
        .await;

        assert_eq!(results.len(), 5);
        assert!(results[2].is_err());
        for (i, result) in results.iter().enumerate() {
            if i != 2 {
                assert_eq!(*result.as_ref().unwrap(), json!({ "i": i }));
            }
        }
    }
}
