//! Reconciliation worker pool.
//!
//! Workers pull records from the shared bounded queue, fix their width and
//! push the result downstream. The only state they share is the header. They
//! do not coordinate with each other, so records reach the sink in completion
//! order.

use std::ops::AddAssign;
use std::sync::Arc;
use std::thread::{self, Scope, ScopedJoinHandle};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, trace};

use crate::error::{NormalizeError, Result};
use crate::header::Header;
use crate::reconcile::{reconcile, sanitize_record};
use crate::record::{Mismatch, MismatchKind, Record};

/// Counters reported by a worker when its input queue closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub records: u64,
    pub extra: u64,
    pub missing: u64,
    pub sanitized_fields: u64,
}

impl AddAssign for WorkerStats {
    fn add_assign(&mut self, other: Self) {
        self.records += other.records;
        self.extra += other.extra;
        self.missing += other.missing;
        self.sanitized_fields += other.sanitized_fields;
    }
}

/// Read-only state shared by every worker.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub header: Arc<Header>,
    pub clean_strings: bool,
}

/// Queue endpoints handed to each worker.
#[derive(Debug, Clone)]
pub struct WorkerQueues {
    pub records: Receiver<Record>,
    pub reconciled: Sender<Record>,
    pub mismatches: Sender<Mismatch>,
}

/// Process records until the input queue is closed and drained.
///
/// Stops early if a downstream queue has been closed by a failed consumer.
pub fn run_worker(context: &WorkerContext, queues: &WorkerQueues) -> WorkerStats {
    let width = context.header.width();
    let mut stats = WorkerStats::default();

    for mut record in &queues.records {
        if context.clean_strings {
            stats.sanitized_fields += sanitize_record(&mut record.fields) as u64;
        }
        if let Some(mismatch) = reconcile(&mut record, width) {
            trace!(line = mismatch.line_number, kind = %mismatch.kind, "width mismatch");
            match mismatch.kind {
                MismatchKind::Extra => stats.extra += 1,
                MismatchKind::Missing => stats.missing += 1,
            }
            if queues.mismatches.send(mismatch).is_err() {
                debug!("mismatch queue closed, stopping worker");
                break;
            }
        }
        stats.records += 1;
        if queues.reconciled.send(record).is_err() {
            debug!("output queue closed, stopping worker");
            break;
        }
    }
    stats
}

/// Start `size` named worker threads inside `scope`.
///
/// # Errors
///
/// Returns [`NormalizeError::SpawnThread`] if the OS refuses a thread.
pub fn spawn_pool<'scope>(
    scope: &'scope Scope<'scope, '_>,
    size: usize,
    context: &WorkerContext,
    queues: &WorkerQueues,
) -> Result<Vec<ScopedJoinHandle<'scope, WorkerStats>>> {
    (0..size)
        .map(|id| {
            let context = context.clone();
            let queues = queues.clone();
            thread::Builder::new()
                .name(format!("ncsv-worker-{id}"))
                .spawn_scoped(scope, move || run_worker(&context, &queues))
                .map_err(|source| NormalizeError::SpawnThread {
                    stage: "worker",
                    source,
                })
        })
        .collect()
}

/// Wait for every worker and sum their counters.
///
/// # Errors
///
/// Returns [`NormalizeError::StagePanicked`] if any worker panicked.
pub fn join_pool(handles: Vec<ScopedJoinHandle<'_, WorkerStats>>) -> Result<WorkerStats> {
    let mut total = WorkerStats::default();
    let mut panicked = false;
    for handle in handles {
        match handle.join() {
            Ok(stats) => total += stats,
            Err(_) => panicked = true,
        }
    }
    if panicked {
        return Err(NormalizeError::StagePanicked { stage: "worker" });
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::bounded;
    use csv::ByteRecord;

    use super::*;

    fn context(columns: &str, clean_strings: bool) -> WorkerContext {
        WorkerContext {
            header: Arc::new(Header::from_list(columns)),
            clean_strings,
        }
    }

    fn record<T: AsRef<[u8]>>(line: u64, fields: Vec<T>) -> Record {
        Record::new(line, line - 1, ByteRecord::from(fields))
    }

    #[test]
    fn test_worker_reconciles_and_reports() {
        let (in_tx, in_rx) = bounded(8);
        let (out_tx, out_rx) = bounded(8);
        let (mis_tx, mis_rx) = bounded(8);
        in_tx.send(record(1, vec![b"1", b"2"])).unwrap();
        in_tx.send(record(2, vec![b"1", b"2", b"3"])).unwrap();
        in_tx.send(record(3, vec![b"1", b"2", b"3", b"4"])).unwrap();
        drop(in_tx);

        let queues = WorkerQueues {
            records: in_rx,
            reconciled: out_tx,
            mismatches: mis_tx,
        };
        let stats = run_worker(&context("a,b,c", false), &queues);
        drop(queues);

        assert_eq!(stats.records, 3);
        assert_eq!(stats.missing, 1);
        assert_eq!(stats.extra, 1);
        assert!(out_rx.iter().all(|r| r.width() == 3));
        let mismatches: Vec<Mismatch> = mis_rx.iter().collect();
        assert_eq!(mismatches.len(), 2);
        assert_eq!(mismatches[0].line_number, 1);
        assert_eq!(mismatches[0].actual_width, 2);
        assert_eq!(mismatches[1].line_number, 3);
        assert_eq!(mismatches[1].actual_width, 4);
    }

    #[test]
    fn test_worker_sanitizes_when_enabled() {
        let (in_tx, in_rx) = bounded(1);
        let (out_tx, out_rx) = bounded(1);
        let (mis_tx, _mis_rx) = bounded(1);
        in_tx.send(record(1, vec![b"ab\xffcd"])).unwrap();
        drop(in_tx);

        let queues = WorkerQueues {
            records: in_rx,
            reconciled: out_tx,
            mismatches: mis_tx,
        };
        let stats = run_worker(&context("x", true), &queues);
        drop(queues);

        assert_eq!(stats.sanitized_fields, 1);
        let out = out_rx.recv().unwrap();
        assert_eq!(&out.fields[0], b"abcd");
    }

    #[test]
    fn test_pool_drains_queue() {
        let (in_tx, in_rx) = bounded(4);
        let (out_tx, out_rx) = bounded(4);
        let (mis_tx, mis_rx) = bounded(4);
        let queues = WorkerQueues {
            records: in_rx,
            reconciled: out_tx,
            mismatches: mis_tx,
        };
        let ctx = context("a,b", false);

        let (total, written, audited) = thread::scope(|scope| {
            let handles = spawn_pool(scope, 3, &ctx, &queues).unwrap();
            drop(queues);
            let collector = scope.spawn(move || out_rx.iter().count());
            let auditor = scope.spawn(move || mis_rx.iter().count());
            for line in 1..=50u64 {
                let fields = if line % 5 == 0 {
                    vec!["x"]
                } else {
                    vec!["x", "y"]
                };
                in_tx.send(record(line, fields)).unwrap();
            }
            drop(in_tx);
            let total = join_pool(handles).unwrap();
            (total, collector.join().unwrap(), auditor.join().unwrap())
        });

        assert_eq!(total.records, 50);
        assert_eq!(total.missing, 10);
        assert_eq!(written, 50);
        assert_eq!(audited, 10);
    }
}
