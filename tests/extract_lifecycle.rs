//! Behavior-driven tests for the extract job lifecycle.
//!
//! All timers run under tokio's paused clock, so poll intervals and
//! timeouts elapse instantly and deterministically.

use std::sync::Arc;
use std::time::Duration;

use vitalstat_core::{
    ExtractDefinition, ExtractJobController, ExtractState, HttpAuth, HttpMethod, HttpResponse,
    SourceErrorKind,
};
use vitalstat_tests::{gzip, ScriptedHttpClient};

fn definition() -> ExtractDefinition {
    ExtractDefinition {
        collection: String::from("nhis"),
        description: String::from("test extract"),
        samples: vec![String::from("ih2023")],
        variables: vec![String::from("AGE"), String::from("SEX")],
    }
}

fn controller(transport: Arc<ScriptedHttpClient>) -> ExtractJobController {
    ExtractJobController::new(
        transport,
        HttpAuth::Header {
            name: String::from("authorization"),
            value: String::from("test-key"),
        },
    )
    .with_base_url("https://extracts.example.test/")
    .with_poll_interval(Duration::from_secs(60))
    .with_timeout(Duration::from_secs(600))
}

#[tokio::test(start_paused = true)]
async fn scripted_completion_takes_one_submit_and_three_polls() {
    // Given: a submit acknowledgement and the status sequence
    // submitted -> polling -> polling -> completed
    let transport = Arc::new(ScriptedHttpClient::new(vec![
        Ok(HttpResponse::ok_json(r#"{"number": 42, "status": "submitted"}"#)),
        Ok(HttpResponse::ok_json(r#"{"status": "polling"}"#)),
        Ok(HttpResponse::ok_json(r#"{"status": "polling"}"#)),
        Ok(HttpResponse::ok_json(
            r#"{"status": "completed", "download_links": {"data": "https://extracts.example.test/42/data.csv.gz"}}"#,
        )),
    ]));
    let controller = controller(transport.clone());

    // When: the job is driven to a terminal state
    let mut job = controller.submit(&definition()).await.expect("submit accepted");
    assert_eq!(job.state, ExtractState::Submitted);
    assert_eq!(job.number, 42);

    let download_url = controller
        .poll_to_terminal(&mut job)
        .await
        .expect("job completes");

    // Then: exactly one submit and three polls happened, and the job
    // carries the download reference
    assert_eq!(
        job.state,
        ExtractState::Completed {
            download_url: download_url.clone()
        }
    );
    assert_eq!(download_url, "https://extracts.example.test/42/data.csv.gz");

    let requests = transport.recorded_requests();
    assert_eq!(requests.len(), 4);
    assert_eq!(requests[0].method, HttpMethod::Post);
    assert!(requests[0].url.ends_with("?collection=nhis"));
    assert!(requests[1..]
        .iter()
        .all(|r| r.method == HttpMethod::Get && r.url.contains("/42?collection=nhis")));
    assert_eq!(
        requests[0].headers.get("authorization").map(String::as_str),
        Some("test-key")
    );
}

#[tokio::test(start_paused = true)]
async fn endless_polling_times_out_once_the_wall_clock_budget_elapses() {
    // Given: a job that never leaves the in-progress state
    let transport = Arc::new(
        ScriptedHttpClient::new(vec![Ok(HttpResponse::ok_json(r#"{"number": 7}"#))])
            .with_fallback(Ok(HttpResponse::ok_json(r#"{"status": "polling"}"#))),
    );
    let controller = controller(transport.clone());

    // When: the poll loop runs past the configured timeout
    let mut job = controller.submit(&definition()).await.expect("submit accepted");
    let error = controller
        .poll_to_terminal(&mut job)
        .await
        .expect_err("must time out");

    // Then: the job is TimedOut with the distinct error kind,
    // regardless of how many polls occurred
    assert_eq!(job.state, ExtractState::TimedOut);
    assert_eq!(error.kind(), SourceErrorKind::JobTimedOut);
    // 600s budget at 60s per poll: the deadline check bounds the loop.
    assert!(transport.request_count() >= 2);
}

#[tokio::test(start_paused = true)]
async fn an_upstream_failed_status_is_a_job_failure() {
    let transport = Arc::new(ScriptedHttpClient::new(vec![
        Ok(HttpResponse::ok_json(r#"{"number": 9}"#)),
        Ok(HttpResponse::ok_json(r#"{"status": "failed"}"#)),
    ]));
    let controller = controller(transport);

    let mut job = controller.submit(&definition()).await.expect("submit accepted");
    let error = controller
        .poll_to_terminal(&mut job)
        .await
        .expect_err("upstream failure");

    assert_eq!(job.state, ExtractState::Failed);
    assert_eq!(error.kind(), SourceErrorKind::JobFailed);
}

#[tokio::test(start_paused = true)]
async fn a_completed_job_downloads_and_decodes_its_gzipped_payload() {
    let payload = gzip(b"AGE,SEX,PREGNOW\n34,F,1\n29,F,2\n");
    let transport = Arc::new(ScriptedHttpClient::new(vec![
        Ok(HttpResponse::ok_json(r#"{"number": 11}"#)),
        Ok(HttpResponse::ok_json(
            r#"{"status": "completed", "download_links": {"data": "https://extracts.example.test/11/data.csv.gz"}}"#,
        )),
        Ok(HttpResponse::with_status(200, payload)),
    ]));
    let controller = controller(transport);

    let table = controller.run(&definition()).await.expect("end-to-end extract");

    assert_eq!(table.headers, vec!["AGE", "SEX", "PREGNOW"]);
    assert_eq!(table.len(), 2);
    assert_eq!(table.rows[0], vec!["34", "F", "1"]);
}

#[tokio::test(start_paused = true)]
async fn a_corrupt_payload_is_a_protocol_error_not_a_job_failure() {
    // Given: a completed job whose payload is not valid gzip
    let transport = Arc::new(ScriptedHttpClient::new(vec![Ok(HttpResponse::with_status(
        200,
        b"definitely not gzip".to_vec(),
    ))]));
    let controller = controller(transport);

    // When: the download step decodes it
    let error = controller
        .download("https://extracts.example.test/13/data.csv.gz")
        .await
        .expect_err("corrupt payload");

    // Then: the failure kind is distinct from JobFailed
    assert_eq!(error.kind(), SourceErrorKind::Protocol);
}

#[tokio::test(start_paused = true)]
async fn a_completed_status_without_a_download_link_is_a_protocol_error() {
    let transport = Arc::new(ScriptedHttpClient::new(vec![
        Ok(HttpResponse::ok_json(r#"{"number": 21}"#)),
        Ok(HttpResponse::ok_json(r#"{"status": "completed"}"#)),
    ]));
    let controller = controller(transport);

    let mut job = controller.submit(&definition()).await.expect("submit accepted");
    let error = controller
        .poll_to_terminal(&mut job)
        .await
        .expect_err("no link to download");

    assert_eq!(error.kind(), SourceErrorKind::Protocol);
}
