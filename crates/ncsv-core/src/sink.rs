//! Sink: the single consumer writing reconciled records.
//!
//! In unordered mode records are written as they arrive, which is worker
//! completion order. Ordered mode holds early arrivals in a [`ReorderBuffer`]
//! keyed by the reader's sequence number until every earlier record has been
//! written.

use std::collections::BTreeMap;

use crossbeam_channel::Receiver;
use tracing::{debug, warn};

use crate::error::Result;
use crate::options::OrderMode;
use crate::permit::PermitReturns;
use crate::progress::ProgressCounter;
use crate::record::Record;
use crate::rotator::{RotationSummary, Rotator};

/// Result of draining the reconciled-record queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkSummary {
    pub rotation: RotationSummary,
    /// Largest number of records held back at once in ordered mode.
    pub peak_reorder_depth: usize,
}

/// Restores input order from records arriving in completion order.
#[derive(Debug, Default)]
pub struct ReorderBuffer {
    next: u64,
    pending: BTreeMap<u64, Record>,
    peak: usize,
}

impl ReorderBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold `record` until its turn.
    pub fn push(&mut self, record: Record) {
        self.pending.insert(record.sequence, record);
        self.peak = self.peak.max(self.pending.len());
    }

    /// Next record in sequence, if it has arrived.
    pub fn pop_ready(&mut self) -> Option<Record> {
        let entry = self.pending.first_entry()?;
        if *entry.key() != self.next {
            return None;
        }
        self.next += 1;
        Some(entry.remove())
    }

    /// Release everything still held, lowest sequence first.
    pub fn drain_remaining(&mut self) -> impl Iterator<Item = Record> + '_ {
        std::mem::take(&mut self.pending).into_values()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn peak(&self) -> usize {
        self.peak
    }
}

/// Write every record from `records` through `rotator`, then close it.
///
/// One permit is returned to `permits` per record written. In ordered mode
/// held-back records keep their permits, so the reorder buffer never holds
/// more records than the reader was allowed to put in flight.
///
/// # Errors
///
/// Returns the first file creation or write failure. The receiver is dropped
/// on return so upstream stages stop sending.
pub fn drain_records(
    mut rotator: Rotator,
    records: Receiver<Record>,
    order: OrderMode,
    permits: &PermitReturns,
    progress: &ProgressCounter,
) -> Result<SinkSummary> {
    let mut written = 0u64;
    let mut peak_reorder_depth = 0;
    let mut emit = |record: &Record| -> Result<()> {
        rotator.write(record)?;
        permits.release();
        written += 1;
        progress.update(written);
        Ok(())
    };

    match order {
        OrderMode::Unordered => {
            for record in &records {
                emit(&record)?;
            }
        }
        OrderMode::Ordered => {
            let mut buffer = ReorderBuffer::new();
            for record in &records {
                buffer.push(record);
                while let Some(ready) = buffer.pop_ready() {
                    emit(&ready)?;
                }
            }
            if !buffer.is_empty() {
                warn!(
                    held = buffer.len(),
                    "input ended with gaps in the sequence, writing remaining records"
                );
                for record in buffer.drain_remaining() {
                    emit(&record)?;
                }
            }
            peak_reorder_depth = buffer.peak();
        }
    }

    progress.finish(written);
    let rotation = rotator.close()?;
    debug!(
        rows = rotation.rows_written,
        files = rotation.files.len(),
        "sink finished"
    );
    Ok(SinkSummary {
        rotation,
        peak_reorder_depth,
    })
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use crossbeam_channel::bounded;
    use csv::ByteRecord;

    use super::*;
    use crate::header::Header;
    use crate::permit::in_flight;
    use crate::progress::{Cadence, ProgressReporter};
    use crate::rotator::OutputNaming;

    fn record(sequence: u64) -> Record {
        let value = sequence.to_string();
        Record::new(sequence + 1, sequence, ByteRecord::from(vec![value]))
    }

    #[test]
    fn test_reorder_buffer_restores_sequence() {
        let mut buffer = ReorderBuffer::new();
        let mut out = Vec::new();
        for sequence in [2, 0, 3, 1, 4] {
            buffer.push(record(sequence));
            while let Some(ready) = buffer.pop_ready() {
                out.push(ready.sequence);
            }
        }
        assert_eq!(out, vec![0, 1, 2, 3, 4]);
        assert!(buffer.is_empty());
        assert_eq!(buffer.peak(), 3);
    }

    #[test]
    fn test_reorder_buffer_drains_gaps_in_order() {
        let mut buffer = ReorderBuffer::new();
        buffer.push(record(5));
        buffer.push(record(3));
        assert!(buffer.pop_ready().is_none());
        let rest: Vec<u64> = buffer.drain_remaining().map(|r| r.sequence).collect();
        assert_eq!(rest, vec![3, 5]);
    }

    #[test]
    fn test_ordered_sink_writes_in_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let naming = OutputNaming::new(Path::new("in.csv"), dir.path(), 0);
        let rotator = Rotator::new(naming, Arc::new(Header::from_list("n")), 0);
        let (tx, rx) = bounded(8);
        let (permits, returns) = in_flight(8);
        for sequence in [1, 0, 3, 2] {
            assert!(permits.acquire());
            tx.send(record(sequence)).unwrap();
        }
        drop(tx);

        let progress = ProgressReporter::hidden(Cadence::new(1)).counter("Total lines written");
        let summary = drain_records(rotator, rx, OrderMode::Ordered, &returns, &progress).unwrap();

        assert_eq!(summary.rotation.rows_written, 4);
        let contents = std::fs::read_to_string(dir.path().join("in_normalized.csv")).unwrap();
        assert_eq!(contents, "n\n0\n1\n2\n3\n");
    }

    #[test]
    fn test_unordered_sink_writes_arrival_order() {
        let dir = tempfile::tempdir().unwrap();
        let naming = OutputNaming::new(Path::new("in.csv"), dir.path(), 0);
        let rotator = Rotator::new(naming, Arc::new(Header::from_list("n")), 0);
        let (tx, rx) = bounded(8);
        let (permits, returns) = in_flight(8);
        for sequence in [1, 0] {
            assert!(permits.acquire());
            tx.send(record(sequence)).unwrap();
        }
        drop(tx);

        let progress = ProgressReporter::hidden(Cadence::new(1)).counter("Total lines written");
        let summary = drain_records(rotator, rx, OrderMode::Unordered, &returns, &progress).unwrap();

        assert_eq!(summary.peak_reorder_depth, 0);
        let contents = std::fs::read_to_string(dir.path().join("in_normalized.csv")).unwrap();
        assert_eq!(contents, "n\n1\n0\n");
    }

    #[test]
    fn test_ordered_sink_holds_back_at_most_capacity_records() {
        let dir = tempfile::tempdir().unwrap();
        let naming = OutputNaming::new(Path::new("in.csv"), dir.path(), 0);
        let rotator = Rotator::new(naming, Arc::new(Header::from_list("n")), 0);
        let capacity = 4;
        let total = 2_000u64;
        let (tx, rx) = bounded(capacity);
        let (permits, returns) = in_flight(capacity);
        let progress = ProgressReporter::hidden(Cadence::new(100)).counter("Total lines written");

        let summary = thread::scope(|scope| {
            // The first record is taken by a worker that finishes last.
            assert!(permits.acquire());
            let straggler = tx.clone();
            scope.spawn(move || {
                thread::sleep(Duration::from_millis(50));
                straggler.send(record(0)).unwrap();
            });
            let permits = &permits;
            scope.spawn(move || {
                for sequence in 1..total {
                    assert!(permits.acquire());
                    tx.send(record(sequence)).unwrap();
                }
            });
            drain_records(rotator, rx, OrderMode::Ordered, &returns, &progress)
        })
        .unwrap();

        assert_eq!(summary.rotation.rows_written, total);
        assert!(summary.peak_reorder_depth <= capacity);
        let rows = std::fs::read_to_string(dir.path().join("in_normalized.csv")).unwrap();
        let ids: Vec<u64> = rows.lines().skip(1).map(|l| l.parse().unwrap()).collect();
        assert_eq!(ids, (0..total).collect::<Vec<_>>());
    }
}
