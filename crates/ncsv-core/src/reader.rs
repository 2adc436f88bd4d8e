//! Record reader: the single producer feeding the worker pool.

use crossbeam_channel::Sender;
use tracing::{debug, error, warn};

use crate::error::{NormalizeError, Result};
use crate::permit::Permits;
use crate::progress::ProgressCounter;
use crate::record::Record;
use crate::source::{RecordSource, SourceError};

/// Counters reported by the reader when it finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    /// Records handed to the worker pool.
    pub records_read: u64,
    /// Lines skipped because they could not be read.
    pub read_errors: u64,
    /// Last line number consumed, including the header line and skipped lines.
    pub last_line_number: u64,
}

/// Stream records from `source` into `sender` until end of input.
///
/// Line numbers start at `first_line` and advance for every line, including
/// lines that fail to read. A permit is taken from `permits` before each
/// record is sent, so the reader waits while the sink is `capacity` records
/// behind. Progress counts input lines, header included. Dropping `sender`
/// when this returns closes the record queue.
///
/// # Errors
///
/// Returns [`NormalizeError::Read`] if the underlying stream fails. Per-line
/// failures are logged and skipped.
pub fn read_records<S: RecordSource + ?Sized>(
    source: &mut S,
    first_line: u64,
    sender: &Sender<Record>,
    permits: &Permits,
    progress: &ProgressCounter,
) -> Result<ReaderStats> {
    let mut stats = ReaderStats {
        last_line_number: first_line.saturating_sub(1),
        ..ReaderStats::default()
    };
    let mut line_number = first_line;

    loop {
        match source.next_record() {
            Ok(Some(fields)) => {
                let record = Record::new(line_number, stats.records_read, fields);
                if !permits.acquire() || sender.send(record).is_err() {
                    debug!(line = line_number, "pipeline closed, stopping reader");
                    stats.last_line_number = line_number;
                    break;
                }
                stats.records_read += 1;
            }
            Ok(None) => break,
            Err(SourceError::Recoverable(error)) => {
                warn!(line = line_number, %error, "skipping unreadable line");
                stats.read_errors += 1;
            }
            Err(SourceError::Fatal(source)) => {
                error!(line = line_number, error = %source, "input stream failed, stopping reader");
                return Err(NormalizeError::Read {
                    line: stats.last_line_number,
                    source,
                });
            }
        }
        stats.last_line_number = line_number;
        progress.update(line_number);
        line_number += 1;
    }

    progress.finish(stats.last_line_number);
    debug!(
        records = stats.records_read,
        read_errors = stats.read_errors,
        "reader finished"
    );
    Ok(stats)
}
