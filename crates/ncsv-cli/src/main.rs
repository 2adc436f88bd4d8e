//! CSV normalizer CLI.

use std::io::{self, IsTerminal};

use anyhow::Context;
use clap::{ColorChoice, Parser};
use ncsv_cli::logging::{LogConfig, LogFormat, init_logging};
use ncsv_core::{NormalizeOptions, OrderMode, RunSummary, default_workers, normalize};
use tracing::level_filters::LevelFilter;

mod cli;
mod summary;

use crate::cli::{Cli, LogFormatArg, LogLevelArg};
use crate::summary::print_summary;

fn main() {
    let cli = Cli::parse();
    cli.color.write_global();
    let log_config = log_config_from_cli(&cli);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }
    let exit_code = match run(&cli) {
        Ok(summary) => match print_summary(&summary, cli.summary_format) {
            Ok(()) => 0,
            Err(error) => {
                eprintln!("error: failed to render summary: {error}");
                1
            }
        },
        Err(error) => {
            eprintln!("error: {error:#}");
            1
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: &Cli) -> anyhow::Result<RunSummary> {
    let options = options_from_cli(cli);
    normalize(&options).with_context(|| format!("failed to normalize {}", cli.file.display()))
}

fn options_from_cli(cli: &Cli) -> NormalizeOptions {
    let workers = cli
        .workers
        .map_or_else(default_workers, |workers| workers as usize);
    let order = if cli.preserve_order {
        OrderMode::Ordered
    } else {
        OrderMode::Unordered
    };
    NormalizeOptions::new(&cli.file)
        .with_header(cli.header.clone())
        .with_split(cli.split)
        .with_print_every(cli.print_every)
        .with_queue_capacity(cli.concurrency as usize)
        .with_workers(workers)
        .with_clean_strings(cli.clean_string)
        .with_order(order)
        .with_output_dir(&cli.output_dir)
        .with_mismatch_file(cli.mismatches.clone())
        .with_delimiter(cli.delimiter)
        .with_progress(!cli.no_progress)
}

/// Build logging configuration from CLI flags with consistent precedence.
fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let level_filter = match cli.log_level {
        Some(LogLevelArg::Error) => LevelFilter::ERROR,
        Some(LogLevelArg::Warn) => LevelFilter::WARN,
        Some(LogLevelArg::Info) => LevelFilter::INFO,
        Some(LogLevelArg::Debug) => LevelFilter::DEBUG,
        Some(LogLevelArg::Trace) => LevelFilter::TRACE,
        None => cli.verbosity.tracing_level_filter(),
    };
    let format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    };
    let mut config = LogConfig::default()
        .with_level_filter(level_filter)
        .with_format(format)
        .with_timestamps(cli.log_timestamps)
        .with_log_file(cli.log_file.clone());
    config.use_env_filter = !(cli.verbosity.is_present() || cli.log_level.is_some());
    config.with_ansi = match cli.color.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => cli.log_file.is_none() && io::stderr().is_terminal(),
    };
    config
}
