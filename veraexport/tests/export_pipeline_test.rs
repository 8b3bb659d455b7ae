//! End-to-end export against a mock Reporting API
//!
//! These tests validate that:
//! - A range longer than one window produces one report per window, in order
//! - A window whose report fails is recorded without losing the other windows
//! - The export file lands in the output directory with the expected name

#![allow(clippy::expect_used)]

use chrono::NaiveDate;
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;
use veracode_reporting::{RetryConfig, VeracodeClient, VeracodeConfig};
use veraexport::aggregate::FailureKind;
use veraexport::orchestrator::OrchestratorSettings;
use veraexport::poller::{FailedStatusPolicy, PollSettings};
use veraexport::{
    DateRange, FailurePolicy, VeracodeReportClient, WindowOrchestrator, WindowOutcome, output,
    window,
};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REPORT_PATH: &str = "/appsec/v1/analytics/report";

fn day(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, window::DATE_FORMAT).expect("valid test date")
}

fn fast_settings(failure_policy: FailurePolicy) -> OrchestratorSettings {
    OrchestratorSettings {
        inter_window_delay: Duration::ZERO,
        poll: PollSettings {
            poll_interval: Duration::from_millis(5),
            max_polls: 3,
            failed_status: FailedStatusPolicy::Terminal,
        },
        failure_policy,
    }
}

fn report_client(server: &MockServer) -> VeracodeReportClient {
    let config = VeracodeConfig::new("testid", "0123456789abcdef0123456789abcdef")
        .with_base_url(server.uri())
        .with_retry_config(RetryConfig::new().with_max_attempts(0));
    let client = VeracodeClient::new(config).expect("client should build");
    VeracodeReportClient::new(client.reporting_api())
}

async fn mount_window(server: &MockServer, start_date: &str, report_id: &str, status: &str) {
    Mock::given(method("POST"))
        .and(path(REPORT_PATH))
        .and(body_partial_json(json!({"start_date": start_date})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_embedded": {"id": report_id}
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{REPORT_PATH}/{report_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_embedded": {
                "id": report_id,
                "status": status,
                "audit_logs": [{"report": report_id, "action": "Login"}],
                "page_metadata": {"number": 0, "size": 50, "total_elements": 1, "total_pages": 1}
            }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn exports_every_window_in_order() {
    let server = MockServer::start().await;
    mount_window(&server, "2024-01-01", "rep-a", "COMPLETED").await;
    mount_window(&server, "2024-06-29", "rep-b", "COMPLETED").await;
    mount_window(&server, "2024-12-26", "rep-c", "COMPLETED").await;

    let requested = DateRange::new(day("2024-01-01"), day("2025-06-01")).expect("range");
    let windows = window::split(requested, window::MAX_WINDOW_DAYS).expect("split");
    let client = report_client(&server);

    let export = WindowOrchestrator::new(fast_settings(FailurePolicy::Continue))
        .run(requested, &windows, &client)
        .await
        .expect("export should succeed");

    assert!(export.is_complete());
    let reports: Vec<&str> = export
        .audit_logs()
        .filter_map(|entry| entry["report"].as_str())
        .collect();
    assert_eq!(reports, vec!["rep-a", "rep-b", "rep-c"]);

    let out_dir = TempDir::new().expect("temp dir");
    let filepath = output::write_export_file(out_dir.path(), &export).expect("write");
    assert_eq!(
        filepath.file_name().and_then(|n| n.to_str()),
        Some("veracode_audit_2024-01-01_to_2025-06-01.json")
    );
}

#[tokio::test]
async fn failed_report_is_recorded_and_export_continues() {
    let server = MockServer::start().await;
    mount_window(&server, "2025-01-01", "rep-a", "COMPLETED").await;
    mount_window(&server, "2025-01-11", "rep-b", "FAILED").await;
    mount_window(&server, "2025-01-21", "rep-c", "COMPLETED").await;

    let requested = DateRange::new(day("2025-01-01"), day("2025-01-30")).expect("range");
    let windows = window::split(requested, 10).expect("split");
    let client = report_client(&server);

    let export = WindowOrchestrator::new(fast_settings(FailurePolicy::Continue))
        .run(requested, &windows, &client)
        .await
        .expect("export should not abort");

    assert_eq!(export.windows.len(), 3);
    assert_eq!(export.summary.completed_windows, 2);
    assert_eq!(export.summary.failed_windows, 1);
    match &export.windows[1] {
        WindowOutcome::Error(marker) => {
            assert_eq!(marker.failure, FailureKind::Failed);
            assert_eq!(marker.job_id.as_deref(), Some("rep-b"));
        }
        WindowOutcome::Completed(_) => panic!("second window should have failed"),
    }
}

#[tokio::test]
async fn single_day_range_sends_no_end_date() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REPORT_PATH))
        .and(wiremock::matchers::body_json(json!({
            "report_type": "AUDIT",
            "start_date": "2025-03-01"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "rep-1"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{REPORT_PATH}/rep-1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_embedded": {"id": "rep-1", "status": "COMPLETED"}
        })))
        .mount(&server)
        .await;

    let requested = DateRange::new(day("2025-03-01"), day("2025-03-01")).expect("range");
    let windows = window::split(requested, window::MAX_WINDOW_DAYS).expect("split");
    let client = report_client(&server);

    let export = WindowOrchestrator::new(fast_settings(FailurePolicy::Abort))
        .run(requested, &windows, &client)
        .await
        .expect("export should succeed");

    assert_eq!(export.summary.total_windows, 1);
    assert_eq!(export.summary.total_audit_logs, 0);
}
