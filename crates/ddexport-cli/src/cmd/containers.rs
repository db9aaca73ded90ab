//! `ddexport containers`: stream every container as JSON Lines

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, ValueEnum};
use ddexport_core::SharedProgress;
use ddexport_datadog::{ContainerSource, DEFAULT_GROUPING_KEY, Grouping, MAX_PAGE_SIZE};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct ContainersArgs {
    /// Output file (`-` or empty for stdout)
    #[arg(short, long, default_value = "output.json")]
    pub output: PathBuf,

    /// Whether containers are grouped by a tag
    #[arg(long, value_enum, default_value_t = GroupingMode::Ungrouped)]
    pub grouping: GroupingMode,

    /// Tag to group by when grouping is enabled
    #[arg(long, default_value = DEFAULT_GROUPING_KEY)]
    pub grouping_key: String,

    /// Containers per page
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=MAX_PAGE_SIZE as i64))]
    pub page_size: Option<u32>,

    /// Keep only these fields (dotted path or JSON pointer, repeatable)
    #[arg(long = "field", value_name = "PATH")]
    pub fields: Vec<String>,
}

#[derive(Clone, Copy, ValueEnum, Debug, PartialEq, Eq)]
pub enum GroupingMode {
    Ungrouped,
    Grouped,
}

impl ContainersArgs {
    fn grouping(&self) -> Grouping {
        match self.grouping {
            GroupingMode::Ungrouped => Grouping::Ungrouped,
            GroupingMode::Grouped => Grouping::Grouped {
                key: self.grouping_key.clone(),
            },
        }
    }
}

pub fn run(args: ContainersArgs, config: &Config, progress: &SharedProgress) -> Result<ExitCode> {
    let client = super::datadog_client(config)?;
    let page_size = args.page_size.unwrap_or(config.export.page_size);
    let grouping = args.grouping();
    let source = ContainerSource::new(client, page_size, grouping.clone());
    log::info!(
        "Listing containers, {} per page, {grouping:?}",
        source.page_size()
    );
    super::stream_to(
        source,
        super::output_path(Some(&args.output)),
        &args.fields,
        config,
        progress,
    )
}
