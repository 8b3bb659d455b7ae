//! Sequential export of all windows of a range
use crate::aggregate::{self, AggregatedOutput, FailureKind, WindowError, WindowOutcome};
use crate::error::{ExportError, Result};
use crate::job::ReportJobClient;
use crate::poller::{PollSettings, ReportPoller};
use crate::window::{DateRange, Window};
use log::{error, info, warn};
use std::time::Duration;

/// Default pause between two windows
pub const DEFAULT_INTER_WINDOW_DELAY: Duration = Duration::from_secs(1);

/// What happens to the run when a window fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Record an error marker for the window and move on
    #[default]
    Continue,
    /// Stop and return the window's error
    Abort,
}

/// Settings for a whole export run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub inter_window_delay: Duration,
    pub poll: PollSettings,
    pub failure_policy: FailurePolicy,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            inter_window_delay: DEFAULT_INTER_WINDOW_DELAY,
            poll: PollSettings::default(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl From<WindowError> for ExportError {
    fn from(window_error: WindowError) -> Self {
        match window_error.failure {
            FailureKind::Failed => ExportError::Request(window_error.to_string()),
            FailureKind::TimedOut => ExportError::TimedOut {
                window: window_error.window.to_string(),
                polls: window_error.polls,
            },
        }
    }
}

/// Exports windows one after another and aggregates the outcomes
#[derive(Debug, Clone)]
pub struct WindowOrchestrator {
    settings: OrchestratorSettings,
    poller: ReportPoller,
}

impl WindowOrchestrator {
    #[must_use]
    pub fn new(settings: OrchestratorSettings) -> Self {
        Self {
            settings,
            poller: ReportPoller::new(settings.poll),
        }
    }

    /// Export `windows` (in the order given) and assemble the result for `requested_range`
    ///
    /// Windows never run concurrently. The inter-window delay is applied before
    /// every window except the first.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if `windows` is empty, out of order or overlapping;
    /// nothing is requested in that case. Under [`FailurePolicy::Abort`] the first
    /// failing window's error is returned (`Request` or `TimedOut`).
    pub async fn run<C>(
        &self,
        requested_range: DateRange,
        windows: &[Window],
        client: &C,
    ) -> Result<AggregatedOutput>
    where
        C: ReportJobClient + ?Sized,
    {
        if windows.is_empty() {
            return Err(ExportError::Configuration("no windows to export".to_string()));
        }
        if let Some(pair) = windows
            .windows(2)
            .find(|pair| pair[0].end() >= pair[1].start())
        {
            return Err(ExportError::Configuration(format!(
                "windows out of order or overlapping: {} then {}",
                pair[0], pair[1]
            )));
        }

        let total = windows.len();
        let mut outcomes = Vec::with_capacity(total);

        for (index, window) in windows.iter().enumerate() {
            if index > 0 && !self.settings.inter_window_delay.is_zero() {
                tokio::time::sleep(self.settings.inter_window_delay).await;
            }

            info!("=== Window {}/{}: {} ===", index.saturating_add(1), total, window);

            match self.poller.run(window, client).await {
                Ok(result) => {
                    info!(
                        "Window {} completed with {} audit log entries",
                        window,
                        result.audit_logs.len()
                    );
                    outcomes.push(WindowOutcome::Completed(result));
                }
                Err(window_error) => match self.settings.failure_policy {
                    FailurePolicy::Continue => {
                        warn!("{}; recording the failure and continuing", window_error);
                        outcomes.push(WindowOutcome::Error(window_error));
                    }
                    FailurePolicy::Abort => {
                        error!("{}; aborting the export", window_error);
                        return Err(window_error.into());
                    }
                },
            }
        }

        let output = aggregate::assemble(requested_range, outcomes);
        info!(
            "Exported {} of {} window(s), {} audit log entries",
            output.summary.completed_windows,
            output.summary.total_windows,
            output.summary.total_audit_logs
        );
        Ok(output)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::job::{JobStatus, ReportJob, ReportPayload};
    use crate::poller::FailedStatusPolicy;
    use crate::poller::tests::ScriptedClient;
    use crate::window::tests::single_window;
    use crate::window::{DATE_FORMAT, split};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::Ordering;

    fn range(start: &str, end: &str) -> DateRange {
        let day = |d| NaiveDate::parse_from_str(d, DATE_FORMAT).expect("valid test date");
        DateRange::new(day(start), day(end)).expect("valid test range")
    }

    fn settings(failure_policy: FailurePolicy) -> OrchestratorSettings {
        OrchestratorSettings {
            inter_window_delay: Duration::from_secs(1),
            poll: PollSettings {
                poll_interval: Duration::from_secs(5),
                max_polls: 3,
                failed_status: FailedStatusPolicy::Terminal,
            },
            failure_policy,
        }
    }

    /// Completes every window except the one starting on `failing_start`
    struct OneBadWindow {
        failing_start: NaiveDate,
        created: Mutex<Vec<Window>>,
    }

    impl OneBadWindow {
        fn new(failing_start: &str) -> Self {
            Self {
                failing_start: NaiveDate::parse_from_str(failing_start, DATE_FORMAT)
                    .expect("valid test date"),
                created: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ReportJobClient for OneBadWindow {
        async fn create(&self, window: &Window) -> Result<ReportJob> {
            self.created.lock().expect("lock").push(*window);
            Ok(ReportJob::new(*window, format!("job-{}", window.start())))
        }

        async fn poll_status(&self, job: &ReportJob) -> Result<JobStatus> {
            if job.window.start() == self.failing_start {
                Ok(JobStatus::Processing)
            } else {
                Ok(JobStatus::Completed)
            }
        }

        async fn fetch(&self, job: &ReportJob) -> Result<ReportPayload> {
            Ok(ReportPayload {
                metadata: json!({"id": job.job_id}),
                audit_logs: vec![json!({"day": job.window.start_str()})],
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_window_is_recorded_and_run_continues() {
        let requested = range("2025-01-01", "2025-01-30");
        let windows = split(requested, 10).expect("split");
        assert_eq!(windows.len(), 3);
        let client = OneBadWindow::new("2025-01-11");

        let output = WindowOrchestrator::new(settings(FailurePolicy::Continue))
            .run(requested, &windows, &client)
            .await
            .expect("run should not abort");

        assert_eq!(output.windows.len(), 3);
        assert!(output.windows[0].is_completed());
        assert!(!output.windows[1].is_completed());
        assert!(output.windows[2].is_completed());
        let order: Vec<Window> = output.windows.iter().map(|o| *o.window()).collect();
        assert_eq!(order, windows);

        match &output.windows[1] {
            WindowOutcome::Error(marker) => {
                assert_eq!(marker.failure, FailureKind::TimedOut);
                assert_eq!(marker.polls, 3);
            }
            WindowOutcome::Completed(_) => panic!("window 2 should have failed"),
        }
        assert_eq!(output.summary.total_audit_logs, 2);
        assert_eq!(*client.created.lock().expect("lock"), windows);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_policy_stops_at_first_failure() {
        let requested = range("2025-01-01", "2025-01-30");
        let windows = split(requested, 10).expect("split");
        let client = OneBadWindow::new("2025-01-11");

        let result = WindowOrchestrator::new(settings(FailurePolicy::Abort))
            .run(requested, &windows, &client)
            .await;

        match result {
            Err(ExportError::TimedOut { window, polls }) => {
                assert_eq!(window, "2025-01-11 to 2025-01-20");
                assert_eq!(polls, 3);
            }
            other => panic!("expected TimedOut, got {other:?}"),
        }
        // Third window never started
        assert_eq!(client.created.lock().expect("lock").len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_on_request_failure_returns_request_error() {
        let requested = range("2025-01-01", "2025-01-05");
        let windows = split(requested, 10).expect("split");
        let client = ScriptedClient::failing_create();

        let result = WindowOrchestrator::new(settings(FailurePolicy::Abort))
            .run(requested, &windows, &client)
            .await;

        assert!(matches!(result, Err(ExportError::Request(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_only_between_windows() {
        let requested = range("2025-01-01", "2025-01-03");
        let windows = split(requested, 1).expect("split");
        let client = ScriptedClient::new(&[JobStatus::Completed]);
        let settings = OrchestratorSettings {
            inter_window_delay: Duration::from_secs(60),
            poll: PollSettings {
                poll_interval: Duration::from_secs(1),
                max_polls: 5,
                failed_status: FailedStatusPolicy::Terminal,
            },
            failure_policy: FailurePolicy::Continue,
        };

        let started = tokio::time::Instant::now();
        let output = WindowOrchestrator::new(settings)
            .run(requested, &windows, &client)
            .await
            .expect("run");

        assert!(output.is_complete());
        assert_eq!(client.creates.load(Ordering::SeqCst), 3);
        // 3 windows x 1 poll x 1s, plus 2 delays of 60s
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(123) && elapsed < Duration::from_secs(124));
    }

    #[tokio::test]
    async fn test_empty_window_list_is_rejected() {
        let client = ScriptedClient::new(&[]);
        let result = WindowOrchestrator::new(OrchestratorSettings::default())
            .run(range("2025-01-01", "2025-01-01"), &[], &client)
            .await;

        assert!(matches!(result, Err(ExportError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_unordered_windows_are_rejected_before_any_request() {
        let requested = range("2025-01-01", "2025-01-30");
        let mut windows = split(requested, 10).expect("split");
        windows.reverse();
        let client = ScriptedClient::new(&[JobStatus::Completed]);

        let result = WindowOrchestrator::new(OrchestratorSettings::default())
            .run(requested, &windows, &client)
            .await;

        assert!(matches!(
            result,
            Err(ExportError::Configuration(ref m)) if m.contains("out of order")
        ));
        assert_eq!(client.creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_repeated_window_is_rejected() {
        let requested = range("2025-01-01", "2025-01-10");
        let windows = split(requested, 10).expect("split");
        let repeated = [windows[0], windows[0]];
        let client = ScriptedClient::new(&[JobStatus::Completed]);

        let result = WindowOrchestrator::new(OrchestratorSettings::default())
            .run(requested, &repeated, &client)
            .await;

        assert!(matches!(result, Err(ExportError::Configuration(_))));
        assert_eq!(client.creates.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_window_error_conversion() {
        let window = single_window("2025-01-01", "2025-01-31");
        let failed: ExportError = WindowError {
            window,
            failure: FailureKind::Failed,
            message: "report request failed: HTTP 500".to_string(),
            job_id: None,
            polls: 0,
        }
        .into();
        assert!(matches!(failed, ExportError::Request(ref m) if m.contains("HTTP 500")));
    }
}
