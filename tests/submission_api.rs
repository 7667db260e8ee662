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

//! Integration tests of the HTTP surface against a mocked Pipetrace service.

use mockito::Matcher;
use pipetrace_client::{
    evals, ClientConfig, MeasureOptions, PipelineFilter, PipelineHandle, PipelineRun,
    PipetraceError, PipetraceClient, RedactionPolicy, RunTestOptions, SectionSelectors,
    StartOptions, StepSelector, SubmitOptions,
};
use serde_json::json;

fn client_for(server: &mockito::ServerGuard) -> PipetraceClient {
    PipetraceClient::new(ClientConfig::new("test-key").with_base_path(server.url()))
}

fn sample_payload() -> serde_json::Value {
    json!({
        "run_id": "fixed-1",
        "pipeline_slug": "summarize",
        "steps": [{
            "provider": "openai",
            "invocation": "openai_chat_completion",
            "start_time": "2025-01-01T00:00:00.000Z",
            "end_time": "2025-01-01T00:00:01.000Z",
            "elapsed_ms": 1000,
            "inputs": { "messages": [{ "role": "user", "content": "hi" }] },
            "model_params": { "model": "gpt-4o" },
            "outputs": { "content": "hello" },
        }]
    })
}

#[tokio::test]
async fn empty_run_submits_and_returns_server_id() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/v1/runs")
        .match_header("authorization", "Bearer test-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"run_id":"srv-1"}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let run = PipelineRun::start(
        &client,
        PipelineHandle::slug("summarize"),
        StartOptions::default(),
    );

    let submitted = run.submit(SubmitOptions::default()).await.unwrap();
    assert_eq!(submitted.run_id, "srv-1");
    mock.assert_async().await;
}

#[tokio::test]
async fn measured_run_transmits_steps_in_order() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/v1/runs")
        .match_body(Matcher::PartialJson(json!({
            "pipeline_slug": "summarize",
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"run_id":"srv-2"}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let mut run = PipelineRun::start(
        &client,
        PipelineHandle::slug("summarize"),
        StartOptions::default(),
    );

    for i in 0..3 {
        let label = format!("step_{}", i);
        run.measure(&label, json!({ "n": i }), MeasureOptions::default(), |inputs| async move {
            Ok::<_, PipetraceError>(json!({ "echo": inputs["n"] }))
        })
        .await
        .unwrap();
    }
    assert_eq!(run.steps().len(), 3);

    let submitted = run.submit(SubmitOptions::default()).await.unwrap();
    assert_eq!(submitted.run_id, "srv-2");
    mock.assert_async().await;
}

#[tokio::test]
async fn submit_from_json_applies_redaction_before_transmission() {
    let payload = sample_payload();
    let mut expected = payload.clone();
    expected["steps"][0]
        .as_object_mut()
        .unwrap()
        .remove("inputs");

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/v1/runs")
        .match_body(Matcher::Json(expected))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"run_id":"srv-3"}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let policy =
        RedactionPolicy::Uniform(SectionSelectors::keep_all().with_inputs(StepSelector::DropAll));

    let submitted = PipelineRun::submit_from_json(
        &client,
        payload,
        SubmitOptions::default().with_redaction(policy),
    )
    .await
    .unwrap();

    assert_eq!(submitted.run_id, "srv-3");
    mock.assert_async().await;
}

#[tokio::test]
async fn reapplying_the_same_policy_is_idempotent() {
    let policy = RedactionPolicy::Uniform(
        SectionSelectors::keep_all()
            .with_inputs(
                StepSelector::from_json(&json!([["messages", 0, "role"]])).unwrap(),
            )
            .with_model_params(StepSelector::DropAll),
    );

    let once = policy.apply(&sample_payload());

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/v1/runs")
        // Submitting the already-redacted payload with the same policy must
        // transmit it unchanged.
        .match_body(Matcher::Json(once.clone()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"run_id":"srv-4"}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let submitted = PipelineRun::submit_from_json(
        &client,
        once,
        SubmitOptions::default().with_redaction(policy),
    )
    .await
    .unwrap();

    assert_eq!(submitted.run_id, "srv-4");
    mock.assert_async().await;
}

#[tokio::test]
async fn malformed_serialized_run_is_a_validation_error() {
    let server = mockito::Server::new_async().await;
    let client = client_for(&server);

    let result = PipelineRun::submit_from_json(
        &client,
        json!({ "steps": "not-an-array" }),
        SubmitOptions::default(),
    )
    .await;

    assert!(matches!(result, Err(PipetraceError::Validation(_))));
}

#[tokio::test]
async fn api_errors_are_surfaced_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/v1/runs")
        .with_status(500)
        .with_body("ingestion unavailable")
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server);
    let run = PipelineRun::start(
        &client,
        PipelineHandle::slug("summarize"),
        StartOptions::default(),
    );

    let result = run.submit(SubmitOptions::default()).await;
    match result {
        Err(PipetraceError::Api { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "ingestion unavailable");
        }
        other => panic!("expected API error, got {:?}", other.map(|r| r.run_id)),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn fire_and_forget_returns_client_id_and_posts_in_background() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/v1/runs")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"run_id":"srv-5"}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let run = PipelineRun::start(
        &client,
        PipelineHandle::slug("summarize"),
        StartOptions::default(),
    );
    let local_id = run.run_id().to_string();

    let submitted = run.submit(SubmitOptions::fire_and_forget()).await.unwrap();
    assert_eq!(submitted.run_id, local_id);

    // Give the spawned submission a moment to land.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    mock.assert_async().await;
}

#[tokio::test]
async fn run_test_fetches_cases_and_submits_outcomes() {
    let mut server = mockito::Server::new_async().await;
    let cases_mock = server
        .mock("GET", "/api/v1/test-cases")
        .match_query(Matcher::UrlEncoded(
            "pipeline_slug".into(),
            "summarize".into(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "test_cases": [
                    { "id": "tc-1", "name": "short doc", "inputs": { "document": "a" } },
                    { "id": "tc-2", "name": "long doc", "inputs": { "document": "b" } },
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let result_mock = server
        .mock("POST", "/api/v1/test-results")
        .match_body(Matcher::PartialJson(json!({
            "pipeline_slug": "summarize",
            "results": [
                { "case_id": "tc-1", "outputs": { "summary": "a" } },
                { "case_id": "tc-2", "outputs": { "summary": "b" } },
            ]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"result_id":"tr-9"}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let response = evals::run_test(
        &client,
        "summarize",
        RunTestOptions::default().with_parallelism(2),
        |case| async move { Ok(json!({ "summary": case.inputs["document"] })) },
    )
    .await
    .unwrap();

    assert_eq!(response.result_id, "tr-9");
    cases_mock.assert_async().await;
    result_mock.assert_async().await;
}

#[tokio::test]
async fn run_test_records_case_failures_without_halting() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/v1/test-cases")
        .match_query(Matcher::UrlEncoded(
            "pipeline_slug".into(),
            "summarize".into(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "test_cases": [
                    { "id": "tc-1", "name": "ok", "inputs": {} },
                    { "id": "tc-2", "name": "bad", "inputs": {} },
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let result_mock = server
        .mock("POST", "/api/v1/test-results")
        .match_body(Matcher::PartialJson(json!({
            "results": [
                { "case_id": "tc-1", "outputs": {} },
                { "case_id": "tc-2", "error": "invalid run payload: no output" },
            ]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"result_id":"tr-10"}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let response = evals::run_test(
        &client,
        "summarize",
        RunTestOptions::default(),
        |case| async move {
            if case.id == "tc-2" {
                Err(PipetraceError::Validation("no output".into()))
            } else {
                Ok(json!({}))
            }
        },
    )
    .await
    .unwrap();

    assert_eq!(response.result_id, "tr-10");
    result_mock.assert_async().await;
}

#[tokio::test]
async fn resource_listings_parse_typed_responses() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/v1/pipelines")
        .match_query(Matcher::UrlEncoded("slug".into(), "summarize".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "pipelines": [{ "id": "pl-1", "slug": "summarize", "display_name": "Summarize" }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    server
        .mock("GET", "/api/v1/test-results/tr-9/status")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"result_id":"tr-9","status":"done"}"#)
        .create_async()
        .await;

    let client = client_for(&server);

    let pipelines = client
        .get_pipelines(PipelineFilter {
            slug: Some("summarize".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(pipelines.len(), 1);
    assert_eq!(pipelines[0].slug, "summarize");

    let status = client.get_test_result_status("tr-9").await.unwrap();
    assert_eq!(status.status, "done");
}

#[tokio::test]
async fn upload_file_returns_hosted_url() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/v1/files/upload")
        .match_header("authorization", "Bearer test-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"url":"https://files.pipetrace.dev/hello.txt"}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let response = client
        .upload_file(b"hello".to_vec(), "hello.txt", "text/plain")
        .await
        .unwrap();

    assert_eq!(response.url, "https://files.pipetrace.dev/hello.txt");
    mock.assert_async().await;
}
