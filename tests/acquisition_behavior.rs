//! Behavior-driven tests for the orchestrated acquisition cycle.
//!
//! These tests verify HOW the orchestrator isolates provider failures,
//! bounds slow providers, and always hands the calibrator a
//! well-formed bundle.

use std::sync::Arc;
use std::time::Duration;

use vitalstat_core::{ProviderId, ProviderOutcome, ProviderRecords, SourceErrorKind, Table};
use vitalstat_pipeline::{CycleStatus, JsonReportCalibrator, NatalityLoader, Orchestrator};
use vitalstat_tests::{FixedSource, HangingSource, PanickingSource};

fn success(rows: usize) -> ProviderOutcome {
    let table = Table::new(
        vec![String::from("State"), String::from("Births")],
        (0..rows)
            .map(|i| vec![format!("State-{i}"), String::from("1000")])
            .collect(),
    );
    ProviderOutcome::Success {
        records: ProviderRecords::Tabular(table),
    }
}

fn failure(kind: SourceErrorKind, message: &str) -> ProviderOutcome {
    ProviderOutcome::Failure {
        kind,
        message: String::from(message),
    }
}

fn calibrator_in(dir: &tempfile::TempDir) -> Box<JsonReportCalibrator> {
    Box::new(JsonReportCalibrator::new(
        dir.path().join("calibration_params.json"),
    ))
}

#[tokio::test]
async fn one_failing_provider_does_not_block_the_others() {
    // Given: provider A fails while B and C succeed
    let dir = tempfile::tempdir().expect("tempdir");
    let orchestrator = Orchestrator::new(calibrator_in(&dir))
        .with_source(Arc::new(FixedSource::new(
            ProviderId::Wonder,
            failure(SourceErrorKind::Transport, "connection refused"),
        )))
        .with_source(Arc::new(FixedSource::new(ProviderId::Ahr, success(3))))
        .with_source(Arc::new(FixedSource::new(ProviderId::Datafenix, success(1))));

    // When: a cycle runs
    let bundle = orchestrator.acquire().await;

    // Then: the bundle holds A as Failure and B, C as Success
    assert_eq!(bundle.status, CycleStatus::Partial);
    assert_eq!(
        bundle
            .outcome(ProviderId::Wonder)
            .and_then(ProviderOutcome::failure_kind),
        Some(SourceErrorKind::Transport)
    );
    assert!(bundle.outcome(ProviderId::Ahr).expect("present").is_success());
    assert!(bundle
        .outcome(ProviderId::Datafenix)
        .expect("present")
        .is_success());
}

#[tokio::test]
async fn total_provider_failure_still_produces_a_bundle_and_a_report() {
    // Given: every provider fails
    let dir = tempfile::tempdir().expect("tempdir");
    let report_path = dir.path().join("calibration_params.json");
    let orchestrator = Orchestrator::new(Box::new(JsonReportCalibrator::new(&report_path)))
        .with_source(Arc::new(FixedSource::new(
            ProviderId::Wonder,
            failure(SourceErrorKind::Transport, "down"),
        )))
        .with_source(Arc::new(FixedSource::new(
            ProviderId::Ahr,
            failure(SourceErrorKind::Protocol, "graphql error"),
        )));

    // When: a full cycle runs
    let report = orchestrator.run_cycle().await;

    // Then: the cycle completes, the bundle is all-failure, and the
    // calibration artifact still exists
    assert_eq!(report.bundle.status, CycleStatus::AllFailed);
    assert!(report.calibration_completed());
    let written = std::fs::read_to_string(&report_path).expect("report written");
    let parsed: serde_json::Value = serde_json::from_str(&written).expect("valid json");
    assert_eq!(parsed["sources"]["wonder"]["succeeded"], false);
    assert_eq!(parsed["sources"]["ahr"]["succeeded"], false);
}

#[tokio::test]
async fn a_panicking_provider_is_recorded_as_its_own_failure() {
    // Given: one provider panics mid-fetch
    let dir = tempfile::tempdir().expect("tempdir");
    let orchestrator = Orchestrator::new(calibrator_in(&dir))
        .with_source(Arc::new(PanickingSource {
            id: ProviderId::Wonder,
        }))
        .with_source(Arc::new(FixedSource::new(ProviderId::Ahr, success(2))));

    // When: a cycle runs
    let bundle = orchestrator.acquire().await;

    // Then: the panic is absorbed at the orchestration boundary
    assert_eq!(bundle.status, CycleStatus::Partial);
    assert_eq!(
        bundle
            .outcome(ProviderId::Wonder)
            .and_then(ProviderOutcome::failure_kind),
        Some(SourceErrorKind::Transport)
    );
    assert!(bundle.outcome(ProviderId::Ahr).expect("present").is_success());
}

#[tokio::test(start_paused = true)]
async fn a_hung_provider_is_bounded_by_the_cycle_deadline() {
    // Given: one provider that never returns and one that is instant
    let dir = tempfile::tempdir().expect("tempdir");
    let orchestrator = Orchestrator::new(calibrator_in(&dir))
        .with_cycle_timeout(Duration::from_secs(5))
        .with_source(Arc::new(HangingSource {
            id: ProviderId::Ipums,
            outcome: success(1),
        }))
        .with_source(Arc::new(FixedSource::new(ProviderId::Wonder, success(4))));

    // When: a cycle runs
    let bundle = orchestrator.acquire().await;

    // Then: the hung provider is a deadline failure, the fast one
    // completed, and the cycle did not stall
    assert_eq!(bundle.status, CycleStatus::Partial);
    let hung = bundle.outcome(ProviderId::Ipums).expect("present");
    assert!(!hung.is_success());
    assert!(bundle.outcome(ProviderId::Wonder).expect("present").is_success());
}

#[tokio::test]
async fn skipped_optional_providers_never_appear_in_the_bundle() {
    // Given: only the two always-on providers are configured
    let dir = tempfile::tempdir().expect("tempdir");
    let orchestrator = Orchestrator::new(calibrator_in(&dir))
        .with_source(Arc::new(FixedSource::new(ProviderId::Wonder, success(2))))
        .with_source(Arc::new(FixedSource::new(ProviderId::Ahr, success(2))));

    // When: a cycle runs
    let bundle = orchestrator.acquire().await;

    // Then: the optional providers are absent, not failed
    assert_eq!(bundle.outcomes.len(), 2);
    assert!(bundle.outcome(ProviderId::Ipums).is_none());
    assert!(bundle.outcome(ProviderId::Datafenix).is_none());
    assert_eq!(bundle.status, CycleStatus::AllSucceeded);
}

#[tokio::test]
async fn a_missing_microdata_file_does_not_abort_the_cycle() {
    // Given: a loader pointing at a file that does not exist
    let dir = tempfile::tempdir().expect("tempdir");
    let orchestrator = Orchestrator::new(calibrator_in(&dir))
        .with_microdata(Box::new(NatalityLoader::new(
            dir.path().join("missing.txt"),
            2023,
        )))
        .with_source(Arc::new(FixedSource::new(ProviderId::Wonder, success(1))));

    // When: a full cycle runs
    let report = orchestrator.run_cycle().await;

    // Then: calibration completed without microdata
    assert!(report.calibration_completed());
    let calibration = report.calibration.expect("completed");
    assert!(calibration.microdata_rows.is_none());
}

#[tokio::test]
async fn the_report_counts_microdata_rows_when_a_sample_loads() {
    use std::io::Write;

    // Given: a small natality export on disk
    let dir = tempfile::tempdir().expect("tempdir");
    let data_path = dir.path().join("natality2023.txt");
    let mut file = std::fs::File::create(&data_path).expect("create");
    for row in 0..6 {
        writeln!(file, "row-{row}").expect("write");
    }

    let orchestrator = Orchestrator::new(calibrator_in(&dir))
        .with_microdata(Box::new(NatalityLoader::new(&data_path, 2023)))
        .with_microdata_row_limit(4)
        .with_source(Arc::new(FixedSource::new(ProviderId::Wonder, success(1))));

    // When: a full cycle runs
    let report = orchestrator.run_cycle().await;

    // Then: the sampled row count is propagated, bounded by the limit
    let calibration = report.calibration.expect("completed");
    assert_eq!(calibration.microdata_rows, Some(4));
}

#[tokio::test]
async fn an_empty_source_list_yields_a_no_providers_bundle() {
    let dir = tempfile::tempdir().expect("tempdir");
    let orchestrator = Orchestrator::new(calibrator_in(&dir));

    let bundle = orchestrator.acquire().await;

    assert_eq!(bundle.status, CycleStatus::NoProviders);
    assert!(bundle.outcomes.is_empty());
}
