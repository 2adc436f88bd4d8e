//! Streaming CSV normalization.
//!
//! Reconciles every record of a delimited file to a fixed header width,
//! audits each width mismatch, and writes the corrected records to one or
//! more rotated output files. See [`pipeline`] for how the stages connect.

pub mod error;
pub mod header;
pub mod mismatch_log;
pub mod options;
pub mod permit;
pub mod pipeline;
pub mod progress;
pub mod reader;
pub mod reconcile;
pub mod record;
pub mod rotator;
pub mod sink;
pub mod source;
pub mod worker;

pub use error::{NormalizeError, Result};
pub use header::{Header, ResolvedHeader, resolve_header};
pub use mismatch_log::MismatchLog;
pub use options::{NormalizeOptions, OrderMode, default_workers};
pub use pipeline::{RunSummary, normalize, run_pipeline};
pub use reconcile::{reconcile, sanitize_field};
pub use record::{Mismatch, MismatchKind, Record};
pub use rotator::{OutputFile, OutputNaming, Rotator};
pub use source::{RecordSource, SourceError, csv_reader, open_csv};
