//! CLI argument parsing for veraexport
use crate::config::{ExportConfig, positive_seconds};
use crate::validation::{ActionType, AuditAction, Region};
use crate::window::{MAX_WINDOW_DAYS, parse_date};
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "veraexport",
    version,
    about = "Export Veracode AUDIT log data via the Reporting REST API",
    long_about = "Exports Veracode audit logs for any date range. The range is split into windows of at most 180 days (the Reporting API limit), one AUDIT report is generated and downloaded per window, and all windows are written to a single JSON file.",
    after_help = "CREDENTIALS:
  VERACODE_API_KEY_ID / VERACODE_API_KEY_SECRET   API credentials
  VERACODE_CREDENTIALS_FILE                       Credentials file (default: ~/.veracode/credentials)
  VERACODE_API_PROFILE                            Profile in the credentials file (default: default)

NETWORK:
  HTTPS_PROXY / HTTP_PROXY                        Proxy URL
  PROXY_USERNAME / PROXY_PASSWORD                 Proxy authentication
  VERAEXPORT_DISABLE_CERT_VALIDATION              Disable TLS certificate validation (development only)

LOGGING:
  RUST_LOG                                        Log filter (default: info)

EXAMPLES:
  # Everything since the start of 2024, up to today
  veraexport --start-date 2024-01-01

  # A single month, stop at the first failed window
  veraexport --start-date 2025-01-01 --end-date 2025-01-31 --fail-fast"
)]
pub struct Cli {
    /// Start date (YYYY-MM-DD, inclusive)
    #[arg(long, value_parser = validate_date)]
    pub start_date: NaiveDate,

    /// End date (YYYY-MM-DD, inclusive). Defaults to today (UTC)
    #[arg(long, value_parser = validate_date)]
    pub end_date: Option<NaiveDate>,

    /// Seconds to wait between windows (must be > 0)
    #[arg(long, default_value = "1.0", value_parser = validate_delay)]
    pub sleep: f64,

    /// Seconds between report status checks
    #[arg(long, default_value = "5.0", value_parser = validate_poll_interval)]
    pub poll_interval: f64,

    /// Maximum number of report status checks per window (must be > 0)
    #[arg(long, default_value = "40", value_parser = validate_count)]
    pub max_polls: u32,

    /// Maximum window length in days (1-180)
    #[arg(long, default_value_t = MAX_WINDOW_DAYS, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_WINDOW_DAYS)))]
    pub max_window_days: u32,

    /// Stop at the first window that fails instead of recording it and continuing
    #[arg(long)]
    pub fail_fast: bool,

    /// Keep polling when a report reports FAILED; the window then times out unless it recovers
    #[arg(long)]
    pub keep_polling_on_failed: bool,

    /// Veracode region (commercial, european, federal)
    #[arg(long, default_value = "commercial", value_parser = clap::value_parser!(Region))]
    pub region: Region,

    /// Output directory for the export file
    #[arg(short, long, default_value = ".", value_parser = validate_directory)]
    pub output_dir: PathBuf,

    /// Audit actions to filter. Valid values: Create, Delete, Update, Error, Email, Success, Failed, Locked, Unlocked, "Logged out", Undelete, "Maintain Schedule", "Permanent Delete", "Update for Internal Only"
    #[arg(long, value_parser = clap::value_parser!(AuditAction))]
    pub audit_action: Vec<AuditAction>,

    /// Action types to filter. Valid values: "Login Account", Admin, Auth, Login
    #[arg(long, value_parser = clap::value_parser!(ActionType))]
    pub action_type: Vec<ActionType>,
}

impl From<Cli> for ExportConfig {
    fn from(cli: Cli) -> Self {
        Self {
            start_date: cli.start_date,
            end_date: cli.end_date,
            inter_window_delay_secs: cli.sleep,
            poll_interval_secs: cli.poll_interval,
            max_polls: cli.max_polls,
            max_window_days: cli.max_window_days,
            fail_fast: cli.fail_fast,
            keep_polling_on_failed: cli.keep_polling_on_failed,
            region: cli.region,
            output_dir: cli.output_dir,
            audit_actions: cli.audit_action,
            action_types: cli.action_type,
        }
    }
}

/// Validate date format (YYYY-MM-DD)
fn validate_date(s: &str) -> Result<NaiveDate, String> {
    if s.trim().is_empty() {
        return Err("Date cannot be empty".to_string());
    }
    parse_date(s, "date").map_err(|e| e.to_string())
}

/// Validate inter-window delay (> 0 seconds)
fn validate_delay(s: &str) -> Result<f64, String> {
    let value = parse_seconds(s)?;
    positive_seconds(value, "Sleep").map_err(|e| e.to_string())?;
    Ok(value)
}

/// Validate poll interval (> 0 seconds)
fn validate_poll_interval(s: &str) -> Result<f64, String> {
    let value = parse_seconds(s)?;
    positive_seconds(value, "Poll interval").map_err(|e| e.to_string())?;
    Ok(value)
}

fn parse_seconds(s: &str) -> Result<f64, String> {
    s.trim()
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number of seconds"))
}

/// Validate max polls (> 0)
fn validate_count(s: &str) -> Result<u32, String> {
    let value: u32 = s
        .trim()
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if value == 0 {
        return Err("Max polls must be greater than 0".to_string());
    }
    Ok(value)
}

/// Validate output directory is a directory or can be created
fn validate_directory(s: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(s);

    if path.exists() {
        if !path.is_dir() {
            return Err(format!("Path '{s}' exists but is not a directory"));
        }
        let metadata =
            std::fs::metadata(&path).map_err(|e| format!("Cannot access directory '{s}': {e}"))?;
        if metadata.permissions().readonly() {
            return Err(format!("Directory '{s}' is read-only (permission denied)"));
        }
        return Ok(path);
    }

    // Nearest existing ancestor must be a directory we can create entries in
    match path.ancestors().skip(1).find(|p| p.exists()) {
        Some(parent) if !parent.is_dir() => Err(format!(
            "Parent path '{}' is not a directory",
            parent.display()
        )),
        Some(_) => Ok(path),
        // Relative paths resolve against the working directory
        None if path.is_relative() => Ok(path),
        None => Err(format!(
            "Cannot create directory '{s}': no parent directory exists"
        )),
    }
}
