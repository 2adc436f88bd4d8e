//! CLI argument definitions for the CSV normalizer.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "ncsv",
    version,
    about = "Normalize a CSV file to a fixed header width",
    long_about = "Normalize every record of a CSV file to the width of its header.\n\n\
                  Short records are padded with empty fields, long records are truncated.\n\
                  Every correction is written to a mismatch log, and the output can be\n\
                  split across several files."
)]
pub struct Cli {
    /// Header columns separated by commas (default: first line of the input).
    #[arg(short = 'e', long = "header", value_name = "COLS")]
    pub header: Option<String>,

    /// Path to the input CSV file.
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    pub file: PathBuf,

    /// Number of data rows per output file (0 writes a single file).
    #[arg(short = 's', long = "split", value_name = "N", default_value_t = 0)]
    pub split: u64,

    /// Print progress every N lines.
    #[arg(
        short = 'p',
        long = "print-every",
        value_name = "N",
        default_value_t = 500,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub print_every: u64,

    /// Capacity of each bounded queue between pipeline stages.
    #[arg(
        short = 'c',
        long = "concurrency",
        value_name = "N",
        default_value_t = 1000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub concurrency: u64,

    /// Strip invalid UTF-8 byte sequences from every field (slower).
    #[arg(short = 'l', long = "clean-string")]
    pub clean_string: bool,

    /// Number of reconciliation workers (default: available CPUs).
    #[arg(
        short = 'w',
        long = "workers",
        value_name = "N",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub workers: Option<u64>,

    /// Write records in input order, buffering records that finish early.
    #[arg(long = "preserve-order")]
    pub preserve_order: bool,

    /// Directory for the normalized output files.
    #[arg(short = 'o', long = "output-dir", value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Mismatch log path (default: <OUTPUT_DIR>/mismatches.text).
    #[arg(long = "mismatches", value_name = "PATH")]
    pub mismatches: Option<PathBuf>,

    /// Field delimiter of the input file.
    #[arg(
        short = 'd',
        long = "delimiter",
        value_name = "CHAR",
        default_value = ",",
        value_parser = parse_delimiter
    )]
    pub delimiter: u8,

    /// Do not draw progress lines.
    #[arg(long = "no-progress")]
    pub no_progress: bool,

    /// Format of the final summary.
    #[arg(long = "summary-format", value_enum, default_value = "table")]
    pub summary_format: SummaryFormatArg,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for warnings only).
    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(long = "log-format", value_enum, default_value = "pretty")]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Prefix pretty and compact log lines with a timestamp.
    #[arg(long = "log-timestamps")]
    pub log_timestamps: bool,
}

/// Final summary formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SummaryFormatArg {
    Table,
    Json,
}

/// CLI log level choices.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

/// Accept a single-byte delimiter, with `\t` and `tab` as spellings of TAB.
fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "\\t" | "tab" => Ok(b'\t'),
        _ => match value.as_bytes() {
            [byte] => Ok(*byte),
            _ => Err(format!("delimiter must be a single byte, got '{value}'")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_flags() {
        let cli = Cli::try_parse_from([
            "ncsv", "-f", "in.csv", "-e", "a,b", "-s", "10", "-p", "50", "-c", "64", "-l",
        ])
        .unwrap();
        assert_eq!(cli.file, PathBuf::from("in.csv"));
        assert_eq!(cli.header.as_deref(), Some("a,b"));
        assert_eq!(cli.split, 10);
        assert_eq!(cli.print_every, 50);
        assert_eq!(cli.concurrency, 64);
        assert!(cli.clean_string);
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["ncsv", "--file", "in.csv"]).unwrap();
        assert_eq!(cli.split, 0);
        assert_eq!(cli.print_every, 500);
        assert_eq!(cli.concurrency, 1000);
        assert!(!cli.clean_string);
        assert!(!cli.preserve_order);
        assert_eq!(cli.delimiter, b',');
        assert_eq!(cli.summary_format, SummaryFormatArg::Table);
        assert!(!cli.log_timestamps);
    }

    #[test]
    fn test_file_is_required() {
        assert!(Cli::try_parse_from(["ncsv"]).is_err());
    }

    #[test]
    fn test_zero_cadence_rejected() {
        assert!(Cli::try_parse_from(["ncsv", "-f", "in.csv", "-p", "0"]).is_err());
        assert!(Cli::try_parse_from(["ncsv", "-f", "in.csv", "-c", "0"]).is_err());
    }

    #[test]
    fn test_delimiter_parsing() {
        assert_eq!(parse_delimiter(";"), Ok(b';'));
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert!(parse_delimiter("::").is_err());
    }
}
