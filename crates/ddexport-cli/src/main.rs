//! ddexport - Export Datadog inventory and metrics to local files
//!
//! Streams paginated container and host listings to JSON Lines, and
//! reduces bounded metric queries to per-scope CSV.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "ddexport")]
#[command(about = "Export Datadog containers, hosts and metrics")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "debug")]
    quiet: bool,

    /// Config file path (default: ./ddexport.toml or ~/.config/ddexport/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Connect timeout in seconds
    #[arg(long, global = true)]
    connect_timeout: Option<u64>,

    /// Per-request timeout in seconds (default: none)
    #[arg(long, global = true)]
    request_timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Command {
    /// Stream all containers as JSON Lines
    Containers(cmd::containers::ContainersArgs),
    /// Stream all hosts as JSON Lines
    Hosts(cmd::hosts::HostsArgs),
    /// Sum a metrics query per scope into CSV
    Metrics(cmd::metrics::MetricsArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(ddexport_core::ProgressContext::new());

    // TTY: spinners show activity, so only warnings unless --debug.
    // non-TTY: info, since logs are the only progress indicator.
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = cli.quiet || (is_tty && !cli.debug);
    let verbosity = ddexport_core::Verbosity::from_flags(quiet, cli.debug);
    ddexport_core::init_logging(verbosity, multi);

    let config = if let Some(path) = &cli.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };

    // Config file defaults, CLI overrides
    let request_timeout = cli.request_timeout.or(config.http.request_timeout);
    ddexport_core::set_http_config(ddexport_core::HttpConfig {
        connect_timeout: Duration::from_secs(
            cli.connect_timeout.unwrap_or(config.http.connect_timeout),
        ),
        request_timeout: request_timeout.map(Duration::from_secs),
    });

    match cli.command {
        Command::Containers(args) => cmd::containers::run(args, &config, &progress),
        Command::Hosts(args) => cmd::hosts::run(args, &config, &progress),
        Command::Metrics(args) => cmd::metrics::run(args, &config),
        Command::Config => {
            show_config(&config, request_timeout);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn show_config(config: &Config, request_timeout: Option<u64>) {
    use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

    let configured = |key: &Option<String>| {
        if key.is_some() { "configured" } else { "not set" }
    };

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    table.add_row(vec!["Site", &config.datadog.site]);
    table.add_row(vec![
        "API URL",
        &ddexport_datadog::site_base_url(&config.datadog.site),
    ]);
    table.add_row(vec!["API key", configured(&config.datadog.api_key)]);
    table.add_row(vec!["App key", configured(&config.datadog.app_key)]);
    table.add_row(vec![
        "Channel capacity",
        &config.export.channel_capacity.to_string(),
    ]);
    table.add_row(vec!["Page size", &config.export.page_size.to_string()]);
    table.add_row(vec![
        "Report every",
        &format!("{} records", ddexport_core::fmt_num(config.export.report_every)),
    ]);
    table.add_row(vec![
        "Connect timeout",
        &format!("{}s", ddexport_core::http_config().connect_timeout.as_secs()),
    ]);
    table.add_row(vec![
        "Request timeout",
        &request_timeout.map_or_else(|| "none".to_string(), |s| format!("{s}s")),
    ]);

    eprintln!("\n{table}");
}
