//! Configuration options for a normalization run.

use std::num::NonZeroUsize;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{NormalizeError, Result};

/// Default progress cadence in records.
pub const DEFAULT_PRINT_EVERY: u64 = 500;

/// Default bounded-queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Default mismatch log file name, relative to the output directory.
pub const DEFAULT_MISMATCH_FILE: &str = "mismatches.text";

/// Ordering contract between the worker pool and the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderMode {
    /// Write records in the order workers finish them.
    ///
    /// With more than one worker the output order may differ from the input.
    #[default]
    Unordered,
    /// Buffer early arrivals and write records in input order.
    Ordered,
}

/// Options controlling a normalization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeOptions {
    /// Input CSV path.
    pub input: PathBuf,

    /// Explicit comma-separated header. When `None` the first input record is used.
    pub header: Option<String>,

    /// Data rows per output file; 0 writes a single file.
    pub split: u64,

    /// Progress cadence in records, for both reading and writing.
    pub print_every: u64,

    /// Capacity of each bounded queue.
    pub queue_capacity: usize,

    /// Number of reconciliation workers.
    pub workers: usize,

    /// Strip invalid UTF-8 byte sequences from every field.
    pub clean_strings: bool,

    /// Ordering contract for the sink.
    pub order: OrderMode,

    /// Directory receiving the normalized output files.
    pub output_dir: PathBuf,

    /// Mismatch log path. Defaults to `mismatches.text` in `output_dir`.
    pub mismatch_file: Option<PathBuf>,

    /// Field delimiter.
    pub delimiter: u8,

    /// Draw progress spinners on stderr.
    pub show_progress: bool,
}

impl NormalizeOptions {
    /// Options for `input` with every other setting at its default.
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            header: None,
            split: 0,
            print_every: DEFAULT_PRINT_EVERY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            workers: default_workers(),
            clean_strings: false,
            order: OrderMode::default(),
            output_dir: PathBuf::from("."),
            mismatch_file: None,
            delimiter: b',',
            show_progress: true,
        }
    }

    #[must_use]
    pub fn with_header(mut self, header: Option<String>) -> Self {
        self.header = header.filter(|value| !value.is_empty());
        self
    }

    #[must_use]
    pub fn with_split(mut self, split: u64) -> Self {
        self.split = split;
        self
    }

    #[must_use]
    pub fn with_print_every(mut self, print_every: u64) -> Self {
        self.print_every = print_every;
        self
    }

    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub fn with_clean_strings(mut self, enable: bool) -> Self {
        self.clean_strings = enable;
        self
    }

    #[must_use]
    pub fn with_order(mut self, order: OrderMode) -> Self {
        self.order = order;
        self
    }

    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_mismatch_file(mut self, path: Option<PathBuf>) -> Self {
        self.mismatch_file = path;
        self
    }

    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, enable: bool) -> Self {
        self.show_progress = enable;
        self
    }

    /// Resolved mismatch log path.
    pub fn mismatch_path(&self) -> PathBuf {
        self.mismatch_file
            .clone()
            .unwrap_or_else(|| self.output_dir.join(DEFAULT_MISMATCH_FILE))
    }

    /// Reject values the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::InvalidOption`] for a zero cadence, queue
    /// capacity or worker count.
    pub fn validate(&self) -> Result<()> {
        if self.print_every == 0 {
            return Err(invalid("print_every", "must be at least 1"));
        }
        if self.queue_capacity == 0 {
            return Err(invalid("queue_capacity", "must be at least 1"));
        }
        if self.workers == 0 {
            return Err(invalid("workers", "must be at least 1"));
        }
        Ok(())
    }
}

/// Worker count matching the available processing units.
pub fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

fn invalid(name: &'static str, reason: &str) -> NormalizeError {
    NormalizeError::InvalidOption {
        name,
        reason: reason.to_string(),
    }
}
