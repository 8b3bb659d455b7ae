//! Run configuration and its validation
//!
//! Everything is checked here, before any credentials are loaded or any request is
//! sent, so a bad invocation fails fast with a `Configuration` error.
use crate::error::{ExportError, Result};
use crate::orchestrator::{FailurePolicy, OrchestratorSettings};
use crate::poller::{FailedStatusPolicy, PollSettings};
use crate::validation::{ActionType, AuditAction, Region};
use crate::window::{DateRange, MAX_WINDOW_DAYS};
use chrono::NaiveDate;
use std::path::PathBuf;
use std::time::Duration;

/// Raw run parameters, as given on the command line
#[derive(Debug, Clone, PartialEq)]
pub struct ExportConfig {
    pub start_date: NaiveDate,
    /// Defaults to today (UTC)
    pub end_date: Option<NaiveDate>,
    pub inter_window_delay_secs: f64,
    pub poll_interval_secs: f64,
    pub max_polls: u32,
    pub max_window_days: u32,
    pub fail_fast: bool,
    pub keep_polling_on_failed: bool,
    pub region: Region,
    pub output_dir: PathBuf,
    pub audit_actions: Vec<AuditAction>,
    pub action_types: Vec<ActionType>,
}

/// Checked run parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig {
    pub range: DateRange,
    pub max_window_days: u32,
    pub settings: OrchestratorSettings,
    pub region: Region,
    pub output_dir: PathBuf,
    pub audit_actions: Vec<String>,
    pub action_types: Vec<String>,
}

impl ExportConfig {
    /// Check every parameter, resolving a missing end date to `today`
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the start date is after the end date, the poll
    /// interval or the inter-window delay is not a positive number of seconds,
    /// `max_polls` is 0, or the window length is outside `1..=180` days
    pub fn validate(&self, today: NaiveDate) -> Result<ValidatedConfig> {
        let end_date = self.end_date.unwrap_or(today);
        let range = DateRange::new(self.start_date, end_date)?;

        let inter_window_delay = positive_seconds(self.inter_window_delay_secs, "sleep")?;
        let poll_interval = positive_seconds(self.poll_interval_secs, "poll interval")?;

        if self.max_polls == 0 {
            return Err(ExportError::Configuration(
                "max polls must be greater than 0".to_string(),
            ));
        }

        if !(1..=MAX_WINDOW_DAYS).contains(&self.max_window_days) {
            return Err(ExportError::Configuration(format!(
                "window length must be between 1 and {MAX_WINDOW_DAYS} days (got {})",
                self.max_window_days
            )));
        }

        let failed_status = if self.keep_polling_on_failed {
            FailedStatusPolicy::KeepPolling
        } else {
            FailedStatusPolicy::Terminal
        };
        let failure_policy = if self.fail_fast {
            FailurePolicy::Abort
        } else {
            FailurePolicy::Continue
        };

        Ok(ValidatedConfig {
            range,
            max_window_days: self.max_window_days,
            settings: OrchestratorSettings {
                inter_window_delay,
                poll: PollSettings {
                    poll_interval,
                    max_polls: self.max_polls,
                    failed_status,
                },
                failure_policy,
            },
            region: self.region,
            output_dir: self.output_dir.clone(),
            audit_actions: self
                .audit_actions
                .iter()
                .map(|a| a.as_str().to_string())
                .collect(),
            action_types: self
                .action_types
                .iter()
                .map(|t| t.as_str().to_string())
                .collect(),
        })
    }
}

/// Seconds as a non-zero `Duration`
///
/// # Errors
///
/// Returns `Configuration` for zero, negative, NaN or infinite values
pub fn positive_seconds(seconds: f64, field_name: &str) -> Result<Duration> {
    match Duration::try_from_secs_f64(seconds) {
        Ok(duration) if !duration.is_zero() => Ok(duration),
        _ => Err(ExportError::Configuration(format!(
            "{field_name} must be greater than 0 seconds (got {seconds})"
        ))),
    }
}
