//! JSON export file output
use crate::aggregate::AggregatedOutput;
use crate::error::Result;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

/// File name for an export of the given range
#[must_use]
pub fn export_file_name(output: &AggregatedOutput) -> String {
    format!(
        "veracode_audit_{}_to_{}.json",
        output.requested_range.start_str(),
        output.requested_range.end_str()
    )
}

/// Write the export document as pretty-printed JSON
///
/// The directory is created if needed; an existing file for the same range is
/// replaced.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the file cannot be written
pub fn write_export_file(output_dir: &Path, output: &AggregatedOutput) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)?;

    let filepath = output_dir.join(export_file_name(output));
    debug!("Writing export to: {}", filepath.display());

    let json_string = serde_json::to_string_pretty(output)?;
    fs::write(&filepath, json_string)?;

    info!(
        "Export written to: {} ({} window(s), {} audit log entries)",
        filepath.display(),
        output.summary.total_windows,
        output.summary.total_audit_logs
    );
    Ok(filepath)
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::aggregate::{WindowOutcome, WindowResult, assemble};
    use crate::window::tests::{day, single_window};
    use crate::window::DateRange;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample_output() -> AggregatedOutput {
        let range = DateRange::new(day("2025-01-01"), day("2025-01-31")).expect("range");
        assemble(
            range,
            vec![WindowOutcome::Completed(WindowResult {
                window: single_window("2025-01-01", "2025-01-31"),
                metadata: json!({"id": "rep-1"}),
                audit_logs: vec![json!({"action": "Login"})],
            })],
        )
    }

    #[test]
    fn test_write_export_file() {
        let temp_dir = TempDir::new().expect("temp dir");
        let output_dir = temp_dir.path().join("exports");

        let filepath = write_export_file(&output_dir, &sample_output()).expect("write");

        assert_eq!(
            filepath,
            output_dir.join("veracode_audit_2025-01-01_to_2025-01-31.json")
        );
        let content = fs::read_to_string(&filepath).expect("read back");
        let written: serde_json::Value = serde_json::from_str(&content).expect("valid json");
        assert_eq!(written["windows"][0]["audit_logs"][0]["action"], "Login");
        assert_eq!(written["summary"]["completed_windows"], 1);
        // Pretty-printed
        assert!(content.contains('\n'));
    }

    #[test]
    fn test_existing_file_is_replaced() {
        let temp_dir = TempDir::new().expect("temp dir");
        let output = sample_output();
        let target = temp_dir.path().join(export_file_name(&output));
        fs::write(&target, "stale").expect("write stale file");

        write_export_file(temp_dir.path(), &output).expect("write");

        let content = fs::read_to_string(&target).expect("read back");
        assert!(content.starts_with('{'));
    }
}
