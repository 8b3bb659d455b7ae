//! Veraexport library - windowed Veracode audit log export
//!
//! The Reporting API only accepts AUDIT report requests spanning up to six months.
//! This library splits a longer range into compliant windows, drives one report
//! per window through request, polling and download, and merges the windows into
//! one ordered document.
pub mod aggregate;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod error;
pub mod job;
pub mod orchestrator;
pub mod output;
pub mod poller;
pub mod validation;
pub mod window;

// Re-export commonly used types
pub use aggregate::{AggregatedOutput, WindowOutcome};
pub use error::{ExportError, Result};
pub use job::{ReportJobClient, VeracodeReportClient};
pub use orchestrator::{FailurePolicy, WindowOrchestrator};
pub use window::{DateRange, Window};
