//! Subcommands, one per export module

pub mod containers;
pub mod hosts;
pub mod metrics;

use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use ddexport_core::{
    Destination, ExportOptions, PageSource, Projection, SHARED_RUNTIME, SharedProgress, fmt_num,
    run_export,
};
use ddexport_datadog::{Credentials, DatadogClient};
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Conventional exit status after SIGINT
pub const EXIT_INTERRUPTED: u8 = 130;

/// Print a key-value summary table on stderr
pub fn print_summary(title: &str, rows: &[(&str, String)]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new(title).fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    eprintln!("\n{table}");
}

/// Build an authenticated client. Fails before anything is opened when a
/// key is missing.
pub fn datadog_client(config: &Config) -> Result<DatadogClient> {
    let credentials = Credentials::new(
        config.datadog.api_key.clone(),
        config.datadog.app_key.clone(),
    )?;
    let client = DatadogClient::new(&config.datadog.site, credentials);
    log::debug!("Datadog API at {}", client.base_url());
    Ok(client)
}

/// `None`, empty, or `-` selects stdout
pub fn output_path(path: Option<&Path>) -> Option<&Path> {
    path.filter(|p| !p.as_os_str().is_empty() && *p != Path::new("-"))
}

/// Token cancelled on the first Ctrl-C. Must be called inside the runtime.
fn interrupt_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, finishing records already fetched");
            trigger.cancel();
        }
    });
    cancel
}

/// Stream every record of `source` to `output` as JSON Lines and print a summary.
pub fn stream_to(
    source: impl PageSource,
    output: Option<&Path>,
    fields: &[String],
    config: &Config,
    progress: &SharedProgress,
) -> Result<ExitCode> {
    let name = source.name().to_string();
    let dest = Destination::open(output)?;
    let target = dest.describe();
    let options = ExportOptions {
        channel_capacity: config.export.channel_capacity,
        report_every: config.export.report_every,
        projection: (!fields.is_empty()).then(|| Projection::new(fields)),
    };

    log::info!("Exporting {name} to {target}");
    let pb = progress.export_line(&name);
    let summary = SHARED_RUNTIME.block_on(async {
        let cancel = interrupt_token();
        run_export(source, dest, &options, &cancel, &pb).await
    })?;

    print_summary(
        &name,
        &[
            ("Output", target),
            ("Records", fmt_num(summary.records_written)),
            (
                "Pages",
                format!("{} ({} failed)", summary.pages, summary.failed_pages),
            ),
            ("Time", format!("{:.1}s", summary.elapsed.as_secs_f64())),
        ],
    );

    if summary.cancelled {
        return Ok(ExitCode::from(EXIT_INTERRUPTED));
    }
    if summary.failed_pages > 0 {
        log::warn!(
            "{} of {} pages failed and were skipped",
            summary.failed_pages,
            summary.pages
        );
    }
    Ok(ExitCode::SUCCESS)
}
