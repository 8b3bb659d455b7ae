//! Per-window outcomes and the aggregated export document
use crate::window::{DateRange, Window};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Audit logs and report metadata of one completed window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowResult {
    pub window: Window,
    pub metadata: Value,
    pub audit_logs: Vec<Value>,
}

/// Why a window produced no result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Request error or a FAILED report
    Failed,
    /// Report never completed within the poll budget
    TimedOut,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed => write!(f, "FAILED"),
            Self::TimedOut => write!(f, "TIMED_OUT"),
        }
    }
}

/// Marker recorded in place of a window that failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("window {window} {failure}: {message}")]
pub struct WindowError {
    pub window: Window,
    pub failure: FailureKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    /// Status polls made before giving up
    pub polls: u32,
}

/// Result of one window, in the order windows were processed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WindowOutcome {
    Completed(WindowResult),
    Error(WindowError),
}

impl WindowOutcome {
    #[must_use]
    pub fn window(&self) -> &Window {
        match self {
            Self::Completed(result) => &result.window,
            Self::Error(error) => &error.window,
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Counters over all windows of an export
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub total_windows: usize,
    pub completed_windows: usize,
    pub failed_windows: usize,
    pub timed_out_windows: usize,
    pub total_audit_logs: usize,
}

/// The export document: every window of the requested range, in order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedOutput {
    pub requested_range: DateRange,
    pub summary: ExportSummary,
    pub windows: Vec<WindowOutcome>,
}

impl AggregatedOutput {
    /// Whether every window completed
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.summary.completed_windows == self.summary.total_windows
    }

    /// All audit log records in window order
    pub fn audit_logs(&self) -> impl Iterator<Item = &Value> {
        self.windows.iter().flat_map(|outcome| match outcome {
            WindowOutcome::Completed(result) => result.audit_logs.as_slice(),
            WindowOutcome::Error(_) => &[],
        })
    }
}

/// Assemble window outcomes into the export document
///
/// # Panics
///
/// Panics if `outcomes` is empty or its windows are not strictly ascending and
/// non-overlapping. The orchestrator always hands over at least one window in
/// split order.
#[must_use]
pub fn assemble(requested_range: DateRange, outcomes: Vec<WindowOutcome>) -> AggregatedOutput {
    assert!(!outcomes.is_empty(), "cannot assemble an export without windows");
    for pair in outcomes.windows(2) {
        let (previous, next) = (pair[0].window(), pair[1].window());
        assert!(
            previous.end() < next.start(),
            "windows out of order or overlapping: {previous} then {next}"
        );
    }

    let mut summary = ExportSummary {
        total_windows: outcomes.len(),
        ..ExportSummary::default()
    };
    for outcome in &outcomes {
        match outcome {
            WindowOutcome::Completed(result) => {
                summary.completed_windows = summary.completed_windows.saturating_add(1);
                summary.total_audit_logs =
                    summary.total_audit_logs.saturating_add(result.audit_logs.len());
            }
            WindowOutcome::Error(error) => match error.failure {
                FailureKind::Failed => {
                    summary.failed_windows = summary.failed_windows.saturating_add(1);
                }
                FailureKind::TimedOut => {
                    summary.timed_out_windows = summary.timed_out_windows.saturating_add(1);
                }
            },
        }
    }

    AggregatedOutput {
        requested_range,
        summary,
        windows: outcomes,
    }
}
