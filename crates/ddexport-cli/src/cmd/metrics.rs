//! `ddexport metrics`: sum one query per scope into CSV

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use ddexport_core::{Destination, SHARED_RUNTIME, TimeRange, run_aggregation};
use ddexport_datadog::{DEFAULT_METRICS_QUERY, MetricsApi};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct MetricsArgs {
    /// Output CSV file (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Start of the window: "2 weeks ago", "2024-01-01", epoch seconds..
    #[arg(long, default_value = "1 day ago")]
    pub from: String,

    /// End of the window: "now", "5 minutes ago"..
    #[arg(long, default_value = "now")]
    pub to: String,

    /// Metrics query
    #[arg(long, default_value = DEFAULT_METRICS_QUERY)]
    pub query: String,
}

pub fn run(args: MetricsArgs, config: &Config) -> Result<ExitCode> {
    let client = super::datadog_client(config)?;
    let range = TimeRange::resolve(&args.from, &args.to)?;
    let mut dest = Destination::open(super::output_path(args.output.as_deref()))?;
    let target = dest.describe();
    let api = MetricsApi::new(client);

    let outcome = SHARED_RUNTIME.block_on(async {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => None,
            result = run_aggregation(&api, range, &args.query, &mut dest) => Some(result),
        }
    });
    let Some(result) = outcome else {
        log::warn!("Interrupted before the query completed");
        return Ok(ExitCode::from(super::EXIT_INTERRUPTED));
    };
    let summary = result.with_context(|| format!("metrics query failed: {}", args.query))?;

    super::print_summary(
        "metrics",
        &[
            ("Output", target),
            ("Window", format!("{} .. {}", range.from, range.to)),
            ("Series", summary.series.to_string()),
            ("Scopes", summary.scopes.to_string()),
            ("Skipped points", summary.skipped_points.to_string()),
        ],
    );
    Ok(ExitCode::SUCCESS)
}
