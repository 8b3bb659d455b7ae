//! Veraexport - Veracode Audit Log Export Tool
//!
//! Exports audit logs for arbitrary date ranges in report-sized windows
use clap::Parser;
use log::{info, warn};
use veraexport::config::ExportConfig;
use veraexport::{
    Result, VeracodeReportClient, WindowOrchestrator, cli, credentials, output, window,
};
use veracode_reporting::VeracodeClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse CLI arguments
    let args = cli::Cli::parse();

    info!("Veraexport - Veracode Audit Log Export Tool");

    // Validate everything before touching credentials or the network
    let config = ExportConfig::from(args).validate(window::today_utc())?;
    let windows = window::split(config.range, config.max_window_days)?;

    info!(
        "Exporting AUDIT data from {} to {} in {} window(s)",
        config.range.start(),
        config.range.end(),
        windows.len()
    );

    let veracode_credentials = credentials::load_veracode_credentials()?;
    let veracode_config = credentials::create_veracode_config(veracode_credentials, config.region);
    let client = VeracodeClient::new(veracode_config)?;

    let report_client = VeracodeReportClient::new(client.reporting_api())
        .with_filters(config.audit_actions.clone(), config.action_types.clone());

    let export = WindowOrchestrator::new(config.settings)
        .run(config.range, &windows, &report_client)
        .await?;

    let filepath = output::write_export_file(&config.output_dir, &export)?;

    if export.is_complete() {
        info!(
            "Done. Saved {} window(s) with {} audit log entries to {}",
            export.summary.total_windows,
            export.summary.total_audit_logs,
            filepath.display()
        );
    } else {
        warn!(
            "Saved {} to {}, but {} window(s) failed and {} timed out; those windows have no audit logs",
            export.requested_range,
            filepath.display(),
            export.summary.failed_windows,
            export.summary.timed_out_windows
        );
    }

    Ok(())
}
