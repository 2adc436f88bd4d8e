//! Normalization pipeline with explicit stages.
//!
//! The stages run concurrently and are connected by bounded queues:
//! 1. **Read**: one thread streams records from the input
//! 2. **Reconcile**: a pool of workers fixes record widths
//! 3. **Audit**: one thread appends mismatches to the mismatch log
//! 4. **Write**: one thread writes records through the output rotator
//!
//! Shutdown cascades downstream: the reader closes the record queue at end of
//! input, the workers close the output and mismatch queues when they have all
//! exited, and the two consumers finish once their queues are drained.
//!
//! The reader also takes an in-flight permit per record and the sink returns
//! it after writing, so at most `queue_capacity` records sit between them
//! even when ordered mode holds records back for a slow worker.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, Scope, ScopedJoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::bounded;
use serde::{Serialize, Serializer};
use tracing::{info, info_span, warn};

use crate::error::{NormalizeError, Result};
use crate::header::{ResolvedHeader, resolve_header};
use crate::mismatch_log::{MismatchLog, drain_mismatches};
use crate::options::{NormalizeOptions, OrderMode};
use crate::permit::in_flight;
use crate::progress::{Cadence, ProgressReporter};
use crate::reader::read_records;
use crate::rotator::{OutputFile, OutputNaming, Rotator};
use crate::sink::drain_records;
use crate::source::{RecordSource, open_csv};
use crate::worker::{WorkerContext, WorkerQueues, join_pool, spawn_pool};

/// Totals for a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub input: PathBuf,
    pub header_columns: usize,
    /// Last input line consumed, counting the header line and skipped lines.
    pub lines_processed: u64,
    pub records_read: u64,
    pub records_written: u64,
    pub read_errors: u64,
    pub extra_columns: u64,
    pub missing_columns: u64,
    pub mismatches_logged: u64,
    pub sanitized_fields: u64,
    pub output_files: Vec<OutputFile>,
    pub mismatch_file: PathBuf,
    pub workers: usize,
    pub order: OrderMode,
    pub peak_reorder_depth: usize,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl RunSummary {
    /// Total records whose width differed from the header.
    pub fn mismatches(&self) -> u64 {
        self.extra_columns + self.missing_columns
    }
}

fn serialize_millis<S: Serializer>(
    duration: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u128(duration.as_millis())
}

/// Normalize the file named in `options`.
///
/// # Errors
///
/// Returns an error if the input cannot be opened, the header cannot be
/// resolved, an output file cannot be created or written, or a stage fails.
pub fn normalize(options: &NormalizeOptions) -> Result<RunSummary> {
    options.validate()?;
    let started = Instant::now();
    let span = info_span!("normalize", input = %options.input.display());
    let _guard = span.enter();

    if options.clean_strings {
        warn!("UTF-8 text cleaning is enabled; processing will take considerably longer");
    }

    let mut source = open_csv(&options.input, options.delimiter)?;
    let resolved = resolve_header(options.header.as_deref(), &mut source, &options.input)?;
    run_pipeline(options, resolved, source, started)
}

/// Run the concurrent stages over an already opened source.
///
/// `started` is the instant reported elapsed time is measured from.
///
/// # Errors
///
/// See [`normalize`].
pub fn run_pipeline<S: RecordSource + Send>(
    options: &NormalizeOptions,
    resolved: ResolvedHeader,
    mut source: S,
    started: Instant,
) -> Result<RunSummary> {
    options.validate()?;
    let ResolvedHeader { header, first_line } = resolved;
    let header = Arc::new(header);
    info!(
        columns = header.width(),
        workers = options.workers,
        split = options.split,
        order = ?options.order,
        "starting normalization"
    );

    let mismatch_path = options.mismatch_path();
    let log = MismatchLog::create(&mismatch_path)?;
    let naming = OutputNaming::new(&options.input, &options.output_dir, options.split);
    let rotator = Rotator::new(naming, Arc::clone(&header), options.split);

    let reporter = ProgressReporter::new(Cadence::new(options.print_every), options.show_progress);
    let read_progress = reporter.counter("Processed lines");
    let write_progress = reporter.counter("Total lines written");

    let capacity = options.queue_capacity;
    let (record_tx, record_rx) = bounded(capacity);
    let (reconciled_tx, reconciled_rx) = bounded(capacity);
    let (mismatch_tx, mismatch_rx) = bounded(capacity);
    let (permits, permit_returns) = in_flight(capacity);

    let context = WorkerContext {
        header: Arc::clone(&header),
        clean_strings: options.clean_strings,
    };
    let order = options.order;

    let (reader_stats, worker_stats, sink_summary, mismatches_logged) =
        thread::scope(|scope| -> Result<_> {
            let logger = spawn_stage(scope, "mismatch-log", move || {
                drain_mismatches(log, mismatch_rx)
            })?;
            let sink = spawn_stage(scope, "sink", move || {
                drain_records(
                    rotator,
                    reconciled_rx,
                    order,
                    &permit_returns,
                    &write_progress,
                )
            })?;

            let queues = WorkerQueues {
                records: record_rx,
                reconciled: reconciled_tx,
                mismatches: mismatch_tx,
            };
            let workers = spawn_pool(scope, options.workers, &context, &queues)?;
            drop(queues);

            let reader = spawn_stage(scope, "reader", move || {
                read_records(&mut source, first_line, &record_tx, &permits, &read_progress)
            })?;

            let reader_result = join_stage(reader, "reader");
            let worker_result = join_pool(workers);
            let sink_result = join_stage(sink, "sink");
            let logger_result = join_stage(logger, "mismatch-log");

            let sink_summary = sink_result.and_then(|inner| inner)?;
            let mismatches_logged = logger_result.and_then(|inner| inner)?;
            let worker_stats = worker_result?;
            let reader_stats = reader_result.and_then(|inner| inner)?;
            Ok((reader_stats, worker_stats, sink_summary, mismatches_logged))
        })?;

    let summary = RunSummary {
        input: options.input.clone(),
        header_columns: header.width(),
        lines_processed: reader_stats.last_line_number,
        records_read: reader_stats.records_read,
        records_written: sink_summary.rotation.rows_written,
        read_errors: reader_stats.read_errors,
        extra_columns: worker_stats.extra,
        missing_columns: worker_stats.missing,
        mismatches_logged,
        sanitized_fields: worker_stats.sanitized_fields,
        output_files: sink_summary.rotation.files,
        mismatch_file: mismatch_path,
        workers: options.workers,
        order,
        peak_reorder_depth: sink_summary.peak_reorder_depth,
        elapsed: started.elapsed(),
    };
    info!(
        lines = summary.lines_processed,
        written = summary.records_written,
        mismatches = summary.mismatches(),
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "processing completed"
    );
    Ok(summary)
}

fn spawn_stage<'scope, T, F>(
    scope: &'scope Scope<'scope, '_>,
    stage: &'static str,
    f: F,
) -> Result<ScopedJoinHandle<'scope, T>>
where
    T: Send + 'scope,
    F: FnOnce() -> T + Send + 'scope,
{
    thread::Builder::new()
        .name(format!("ncsv-{stage}"))
        .spawn_scoped(scope, f)
        .map_err(|source| NormalizeError::SpawnThread { stage, source })
}

fn join_stage<T>(handle: ScopedJoinHandle<'_, T>, stage: &'static str) -> Result<T> {
    handle
        .join()
        .map_err(|_| NormalizeError::StagePanicked { stage })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::header::Header;
    use crate::source::csv_reader;

    fn options(dir: &Path) -> NormalizeOptions {
        NormalizeOptions::new(dir.join("data.csv"))
            .with_output_dir(dir)
            .with_progress(false)
            .with_workers(2)
            .with_queue_capacity(4)
    }

    #[test]
    fn test_run_pipeline_over_in_memory_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = csv_reader("1,2\n1,2,3\n1,2,3,4\n".as_bytes(), b',');
        let resolved = ResolvedHeader {
            header: Header::from_list("a,b,c"),
            first_line: 1,
        };
        let options = options(dir.path()).with_order(OrderMode::Ordered);

        let summary = run_pipeline(&options, resolved, source, Instant::now()).unwrap();

        assert_eq!(summary.records_read, 3);
        assert_eq!(summary.records_written, 3);
        assert_eq!(summary.missing_columns, 1);
        assert_eq!(summary.extra_columns, 1);
        assert_eq!(summary.mismatches_logged, 2);
        assert_eq!(summary.lines_processed, 3);
        let output = std::fs::read_to_string(dir.path().join("data_normalized.csv")).unwrap();
        assert_eq!(output, "a,b,c\n1,2,\n1,2,3\n1,2,3\n");
    }

    #[test]
    fn test_missing_mismatch_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let source = csv_reader("1\n".as_bytes(), b',');
        let resolved = ResolvedHeader {
            header: Header::from_list("a"),
            first_line: 1,
        };
        let options = options(dir.path())
            .with_mismatch_file(Some(dir.path().join("absent").join("mismatches.text")));

        let err = run_pipeline(&options, resolved, source, Instant::now()).unwrap_err();
        assert!(matches!(err, NormalizeError::CreateMismatchLog { .. }));
    }

    #[test]
    fn test_output_failure_stops_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let rows: String = (0..200).map(|n| format!("{n},x\n")).collect();
        let source = csv_reader(std::io::Cursor::new(rows.into_bytes()), b',');
        let resolved = ResolvedHeader {
            header: Header::from_list("n,v"),
            first_line: 1,
        };
        let options = options(dir.path())
            .with_output_dir(dir.path().join("absent"))
            .with_mismatch_file(Some(dir.path().join("mismatches.text")));

        let err = run_pipeline(&options, resolved, source, Instant::now()).unwrap_err();
        assert!(matches!(err, NormalizeError::CreateOutput { .. }));
    }

    #[test]
    fn test_summary_serializes_elapsed_millis() {
        let dir = tempfile::tempdir().unwrap();
        let source = csv_reader("1\n".as_bytes(), b',');
        let resolved = ResolvedHeader {
            header: Header::from_list("a"),
            first_line: 1,
        };
        let summary = run_pipeline(&options(dir.path()), resolved, source, Instant::now()).unwrap();
        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("elapsed_ms").is_some());
        assert_eq!(json["order"], "unordered");
    }
}
