//! Veracode Reporting API
//!
//! This module provides access to the Veracode Reporting REST API for generating
//! AUDIT reports and reading their (paginated) audit log content.
//!
//! A report goes through three steps:
//!
//! 1. [`ReportingApi::generate_audit_report`] submits the request and returns a report id
//! 2. [`ReportingApi::get_audit_report`] returns the current status (and, once
//!    completed, the first page of audit logs)
//! 3. [`ReportingApi::get_all_audit_log_pages`] collects every page of a completed report
//!
//! Waiting between steps 1 and 3 is left to the caller.
use crate::json_validator::from_str_bounded;
use crate::{VeracodeClient, VeracodeError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const REPORT_ENDPOINT: &str = "/appsec/v1/analytics/report";

/// Request payload for generating an audit report
#[derive(Debug, Clone, Serialize)]
pub struct AuditReportRequest {
    /// The type of report to generate (always "AUDIT" for audit logs)
    pub report_type: String,
    /// Start date in YYYY-MM-DD format
    pub start_date: String,
    /// Optional end date in YYYY-MM-DD format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    /// Optional list of audit actions to filter (e.g., "Delete", "Create", "Update")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_action: Option<Vec<String>>,
    /// Optional list of action types to filter (e.g., "Login", "Admin")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_type: Option<Vec<String>>,
}

impl AuditReportRequest {
    /// Create a new audit report request with just start and end dates
    #[must_use]
    pub fn new(start_date: impl Into<String>, end_date: Option<String>) -> Self {
        Self {
            report_type: "AUDIT".to_string(),
            start_date: start_date.into(),
            end_date,
            audit_action: None,
            action_type: None,
        }
    }

    /// Add audit action filters (ignored when empty)
    #[must_use]
    pub fn with_audit_actions(mut self, actions: Vec<String>) -> Self {
        if !actions.is_empty() {
            self.audit_action = Some(actions);
        }
        self
    }

    /// Add action type filters (ignored when empty)
    #[must_use]
    pub fn with_action_types(mut self, types: Vec<String>) -> Self {
        if !types.is_empty() {
            self.action_type = Some(types);
        }
        self
    }
}

/// Embedded data in generate report response
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateReportData {
    /// The report ID used to retrieve the generated report
    #[serde(default)]
    pub id: Option<String>,
}

/// Response when generating a report
///
/// The id normally arrives under `_embedded`; some responses carry it at the top level.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateReportResponse {
    /// Embedded report data
    #[serde(rename = "_embedded", default)]
    pub embedded: Option<GenerateReportData>,
    /// Top-level report id
    #[serde(default)]
    pub id: Option<String>,
}

impl GenerateReportResponse {
    /// The report id, preferring the top-level field
    #[must_use]
    pub fn report_id(&self) -> Option<&str> {
        let present = |id: &&str| !id.trim().is_empty();
        self.id
            .as_deref()
            .filter(present)
            .or_else(|| {
                self.embedded
                    .as_ref()
                    .and_then(|e| e.id.as_deref())
                    .filter(present)
            })
    }
}

/// Report status values
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReportStatus {
    /// Report request has been queued
    Queued,
    /// Report request has been submitted
    Submitted,
    /// Report is being processed
    Processing,
    /// Report has been completed and is ready
    Completed,
    /// Report generation failed
    Failed,
    /// Any status string this client does not know
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportStatus::Queued => write!(f, "QUEUED"),
            ReportStatus::Submitted => write!(f, "SUBMITTED"),
            ReportStatus::Processing => write!(f, "PROCESSING"),
            ReportStatus::Completed => write!(f, "COMPLETED"),
            ReportStatus::Failed => write!(f, "FAILED"),
            ReportStatus::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Page metadata for pagination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct PageMetadata {
    /// Current page number (0-indexed)
    pub number: u32,
    /// Number of items per page
    pub size: u32,
    /// Total number of audit log entries across all pages
    pub total_elements: u32,
    /// Total number of pages
    pub total_pages: u32,
}

/// Report data embedded in the response
///
/// Every field is optional: a report that is still being generated carries little
/// more than its id and status. Fields this client does not model are kept in
/// `extra` so they survive into exported metadata.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ReportData {
    /// Report ID
    #[serde(default)]
    pub id: Option<String>,
    /// Report type (always "AUDIT" for audit reports)
    #[serde(default)]
    pub report_type: Option<String>,
    /// Current status of the report (absent while the request is being accepted)
    #[serde(default)]
    pub status: Option<ReportStatus>,
    /// User who requested the report
    #[serde(default)]
    pub requested_by_user: Option<String>,
    /// Account ID that requested the report
    #[serde(default)]
    pub requested_by_account: Option<u64>,
    /// Date when report was requested
    #[serde(default)]
    pub date_report_requested: Option<String>,
    /// Date when report was completed (null if not completed)
    #[serde(default)]
    pub date_report_completed: Option<String>,
    /// Date when report expires (null if not completed)
    #[serde(default)]
    pub report_expiration_date: Option<String>,
    /// Audit log entries of this page (raw JSON records)
    #[serde(default, skip_serializing)]
    pub audit_logs: Option<Value>,
    /// Links for pagination
    #[serde(rename = "_links", default, skip_serializing)]
    pub links: Option<Value>,
    /// Page metadata (null if not completed)
    #[serde(default)]
    pub page_metadata: Option<PageMetadata>,
    /// Remaining fields returned by the API
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ReportData {
    /// Status as a display string ("MISSING" when the API sent none)
    #[must_use]
    pub fn status_label(&self) -> String {
        self.status
            .as_ref()
            .map_or_else(|| "MISSING".to_string(), ToString::to_string)
    }

    /// Take this page's audit log records out of the report
    ///
    /// A missing or null `audit_logs` field means the page is empty.
    ///
    /// # Errors
    ///
    /// Returns `InvalidResponse` if `audit_logs` is present but not an array.
    pub fn take_audit_logs(&mut self) -> Result<Vec<Value>, ReportingError> {
        match self.audit_logs.take() {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(entries)) => Ok(entries),
            Some(other) => Err(ReportingError::InvalidResponse(format!(
                "audit_logs is not an array (found {})",
                json_type_name(&other)
            ))),
        }
    }
}

/// Full report response with embedded data
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportResponse {
    /// Embedded report data
    #[serde(rename = "_embedded", default)]
    pub embedded: ReportData,
}

/// Every page of a completed report
#[derive(Debug, Clone)]
pub struct CompletedReport {
    /// Report metadata from the first page (audit logs removed)
    pub report: ReportData,
    /// Audit log records of all pages, in page order
    pub audit_logs: Vec<Value>,
    /// Number of pages that were read
    pub pages_retrieved: u32,
}

/// The Reporting API interface
#[derive(Clone, Debug)]
pub struct ReportingApi {
    client: VeracodeClient,
}

impl ReportingApi {
    /// Create a new Reporting API instance
    #[must_use]
    pub fn new(client: VeracodeClient) -> Self {
        Self { client }
    }

    /// Generate an audit report (step 1 of the process)
    ///
    /// This sends a request to generate the report. The API returns a report id
    /// which can be used to retrieve the report after it's generated.
    ///
    /// # Errors
    ///
    /// Returns `ReportingError` if the request fails, the API answers with a
    /// non-success status, or the response carries no report id.
    pub async fn generate_audit_report(
        &self,
        request: &AuditReportRequest,
    ) -> Result<String, ReportingError> {
        let response = self.client.post(REPORT_ENDPOINT, Some(request)).await?;
        let response =
            VeracodeClient::handle_response(response, "generate audit report").await?;

        let response_text = response.text().await.map_err(VeracodeError::from)?;
        log::debug!("Generate report API response: {}", response_text);

        let generate_response: GenerateReportResponse =
            from_str_bounded(&response_text).map_err(ReportingError::InvalidResponse)?;

        generate_response
            .report_id()
            .map(str::to_string)
            .ok_or_else(|| ReportingError::MissingReportId(response_text.clone()))
    }

    /// Retrieve a generated audit report (step 2 of the process)
    ///
    /// The report may still be processing, so check the status field in the response.
    ///
    /// # Arguments
    ///
    /// * `report_id` - The report ID returned from `generate_audit_report`
    /// * `page` - Optional page number (0-indexed) for pagination
    ///
    /// # Errors
    ///
    /// Returns `ReportingError` if the request fails or the body is malformed.
    pub async fn get_audit_report(
        &self,
        report_id: &str,
        page: Option<u32>,
    ) -> Result<ReportResponse, ReportingError> {
        // URL-encode the report_id to prevent injection attacks
        let endpoint = format!("{REPORT_ENDPOINT}/{}", urlencoding::encode(report_id));
        let query: Vec<(&str, String)> = page
            .map(|page_num| vec![("page", page_num.to_string())])
            .unwrap_or_default();

        let response = self.client.get(&endpoint, &query).await?;
        let response = VeracodeClient::handle_response(response, "get audit report").await?;

        let response_text = response.text().await.map_err(VeracodeError::from)?;
        log::debug!("Get audit report API response: {}", response_text);

        from_str_bounded(&response_text).map_err(ReportingError::InvalidResponse)
    }

    /// Retrieve all audit logs across all pages of a completed report (step 3)
    ///
    /// The unpaged report response doubles as page 0; remaining pages are requested
    /// with `?page=N` as announced by `page_metadata.total_pages`.
    ///
    /// # Errors
    ///
    /// Returns `NotCompleted` if the report is not in COMPLETED status, or any
    /// error raised while reading a page.
    pub async fn get_all_audit_log_pages(
        &self,
        report_id: &str,
    ) -> Result<CompletedReport, ReportingError> {
        let mut report = self.get_audit_report(report_id, None).await?.embedded;

        if report.status != Some(ReportStatus::Completed) {
            return Err(ReportingError::NotCompleted {
                report_id: report_id.to_string(),
                status: report.status_label(),
            });
        }

        let mut audit_logs = report.take_audit_logs()?;

        let total_pages = match report.page_metadata {
            Some(metadata) if metadata.total_elements > 0 => metadata.total_pages.max(1),
            Some(metadata) => {
                log::info!(
                    "Report {} completed but contains no audit log entries (0 total elements, {} total pages)",
                    report_id,
                    metadata.total_pages
                );
                1
            }
            None => {
                log::debug!("Report {} has no page metadata, treating as a single page", report_id);
                1
            }
        };

        log::info!(
            "Retrieved page 1/{} of report {} ({} entries)",
            total_pages,
            report_id,
            audit_logs.len()
        );

        for page_num in 1..total_pages {
            let mut page = self
                .get_audit_report(report_id, Some(page_num))
                .await?
                .embedded;
            let entries = page.take_audit_logs()?;

            log::info!(
                "Retrieved page {}/{} of report {} ({} entries)",
                page_num.saturating_add(1),
                total_pages,
                report_id,
                entries.len()
            );
            audit_logs.extend(entries);
        }

        let announced = report
            .page_metadata
            .and_then(|metadata| usize::try_from(metadata.total_elements).ok());
        if let Some(expected) = announced.filter(|n| *n != audit_logs.len()) {
            log::warn!(
                "Report {} announced {} entries but {} were retrieved",
                report_id,
                expected,
                audit_logs.len()
            );
        }

        Ok(CompletedReport {
            report,
            audit_logs,
            pages_retrieved: total_pages,
        })
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Error type for reporting operations
#[derive(Debug, thiserror::Error)]
#[must_use = "Need to handle all error enum types."]
pub enum ReportingError {
    /// Wraps a Veracode API error
    #[error("Veracode API error: {0}")]
    VeracodeApi(#[from] VeracodeError),

    /// Response body could not be parsed or has an unexpected shape
    #[error("Invalid report response: {0}")]
    InvalidResponse(String),

    /// Generate-report response carried no id
    #[error("No report id in generate report response: {0}")]
    MissingReportId(String),

    /// Report content was requested before the report completed
    #[error("Report {report_id} is not completed (status: {status})")]
    NotCompleted {
        /// Report id
        report_id: String,
        /// Status reported by the API
        status: String,
    },
}
