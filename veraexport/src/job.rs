//! Report jobs and the client seam used to drive them
//!
//! [`ReportJobClient`] is the three-call surface the poller needs: create a report
//! job for a window, ask for its status, and fetch the payload once it completed.
//! [`VeracodeReportClient`] implements it on top of the Reporting REST API.
use crate::error::{ExportError, Result};
use crate::window::Window;
use async_trait::async_trait;
use log::{debug, info};
use serde_json::Value;
use std::fmt;
use veracode_reporting::{AuditReportRequest, ReportStatus, ReportingApi};

/// Generation status of a report job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Accepted but not started
    Pending,
    /// Being generated
    Processing,
    /// Ready to fetch
    Completed,
    /// Generation failed or the server reported a status we don't recognise
    Failed,
}

impl JobStatus {
    /// Map the API status of a report
    ///
    /// A missing status means the request is still being accepted.
    #[must_use]
    pub fn from_report_status(status: Option<&ReportStatus>) -> Self {
        match status {
            None | Some(ReportStatus::Queued | ReportStatus::Submitted) => Self::Pending,
            Some(ReportStatus::Processing) => Self::Processing,
            Some(ReportStatus::Completed) => Self::Completed,
            Some(ReportStatus::Failed | ReportStatus::Unknown) => Self::Failed,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Processing => write!(f, "PROCESSING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// A report generation job for one window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportJob {
    pub window: Window,
    pub job_id: String,
    pub status: JobStatus,
}

impl ReportJob {
    /// A freshly created job, status `Pending`
    #[must_use]
    pub fn new(window: Window, job_id: impl Into<String>) -> Self {
        Self {
            window,
            job_id: job_id.into(),
            status: JobStatus::Pending,
        }
    }
}

/// Content of a completed report
#[derive(Debug, Clone, PartialEq)]
pub struct ReportPayload {
    /// Report identifiers, requester and generation timestamps
    pub metadata: Value,
    /// Audit log records of every page, in page order
    pub audit_logs: Vec<Value>,
}

/// Create, poll and fetch report jobs
#[async_trait]
pub trait ReportJobClient: Send + Sync {
    /// Submit a report request covering `window`
    async fn create(&self, window: &Window) -> Result<ReportJob>;

    /// Current generation status of `job`
    async fn poll_status(&self, job: &ReportJob) -> Result<JobStatus>;

    /// Payload of a completed job
    async fn fetch(&self, job: &ReportJob) -> Result<ReportPayload>;
}

/// [`ReportJobClient`] backed by the Veracode Reporting API
#[derive(Debug, Clone)]
pub struct VeracodeReportClient {
    api: ReportingApi,
    audit_actions: Vec<String>,
    action_types: Vec<String>,
}

impl VeracodeReportClient {
    #[must_use]
    pub fn new(api: ReportingApi) -> Self {
        Self {
            api,
            audit_actions: Vec::new(),
            action_types: Vec::new(),
        }
    }

    /// Restrict reports to the given audit actions and action types (empty means all)
    #[must_use]
    pub fn with_filters(mut self, audit_actions: Vec<String>, action_types: Vec<String>) -> Self {
        self.audit_actions = audit_actions;
        self.action_types = action_types;
        self
    }

    /// Report request for a window; `end_date` is only sent for multi-day windows
    fn audit_request(&self, window: &Window) -> AuditReportRequest {
        let end_date = window.spans_multiple_days().then(|| window.end_str());
        AuditReportRequest::new(window.start_str(), end_date)
            .with_audit_actions(self.audit_actions.clone())
            .with_action_types(self.action_types.clone())
    }
}

#[async_trait]
impl ReportJobClient for VeracodeReportClient {
    async fn create(&self, window: &Window) -> Result<ReportJob> {
        let request = self.audit_request(window);
        debug!("Submitting AUDIT report request: {:?}", request);

        let report_id = self.api.generate_audit_report(&request).await?;
        info!("Report {} requested for window {}", report_id, window);

        Ok(ReportJob::new(*window, report_id))
    }

    async fn poll_status(&self, job: &ReportJob) -> Result<JobStatus> {
        let report = self.api.get_audit_report(&job.job_id, None).await?;
        let status = report.embedded.status.as_ref();

        debug!(
            "Report {} raw status {}",
            job.job_id,
            report.embedded.status_label()
        );
        Ok(JobStatus::from_report_status(status))
    }

    async fn fetch(&self, job: &ReportJob) -> Result<ReportPayload> {
        if job.status != JobStatus::Completed {
            return Err(ExportError::Request(format!(
                "report {} cannot be fetched in status {}",
                job.job_id, job.status
            )));
        }

        let completed = self.api.get_all_audit_log_pages(&job.job_id).await?;
        let metadata = serde_json::to_value(&completed.report)?;

        debug!(
            "Fetched {} audit log entries in {} page(s) for report {}",
            completed.audit_logs.len(),
            completed.pages_retrieved,
            job.job_id
        );

        Ok(ReportPayload {
            metadata,
            audit_logs: completed.audit_logs,
        })
    }
}
