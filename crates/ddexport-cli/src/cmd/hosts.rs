//! `ddexport hosts`: stream every host as JSON Lines

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use ddexport_core::SharedProgress;
use ddexport_datadog::{HostSource, MAX_HOSTS_PER_PAGE};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct HostsArgs {
    /// Output file (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Hosts per page (max 1000)
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=MAX_HOSTS_PER_PAGE as i64))]
    pub limit: Option<u32>,

    /// Only hosts matching this search string
    #[arg(long)]
    pub filter: Option<String>,

    /// Keep only these fields (dotted path or JSON pointer, repeatable)
    #[arg(long = "field", value_name = "PATH")]
    pub fields: Vec<String>,
}

pub fn run(args: HostsArgs, config: &Config, progress: &SharedProgress) -> Result<ExitCode> {
    let client = super::datadog_client(config)?;
    let count = args
        .limit
        .unwrap_or(config.export.page_size)
        .min(MAX_HOSTS_PER_PAGE);
    if let Some(filter) = &args.filter {
        log::info!("  Filter: {filter}");
    }

    let source = HostSource::new(client, count, args.filter);
    log::info!("Listing hosts, {} per page", source.count());
    super::stream_to(
        source,
        super::output_path(args.output.as_deref()),
        &args.fields,
        config,
        progress,
    )
}
