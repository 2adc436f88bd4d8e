//! In-flight limit between the reader and the sink.
//!
//! The reader takes a permit before handing a record to the worker pool and
//! the sink hands one back after writing a record. At most `capacity` records
//! are between the two stages at any time, including records the ordered sink
//! is holding back for a slower worker.

use crossbeam_channel::{Receiver, Sender, bounded};

/// Permits and their return path for a pipeline that keeps at most
/// `capacity` records in flight.
pub fn in_flight(capacity: usize) -> (Permits, PermitReturns) {
    let (slots, returned) = bounded(capacity.max(1));
    (Permits { slots }, PermitReturns { slots: returned })
}

/// Reader side: blocks while every permit is out.
#[derive(Debug, Clone)]
pub struct Permits {
    slots: Sender<()>,
}

impl Permits {
    /// Take a permit, waiting for the sink to return one if none is free.
    ///
    /// Returns `false` once the sink has stopped.
    pub fn acquire(&self) -> bool {
        self.slots.send(()).is_ok()
    }
}

/// Sink side: returns one permit per record written.
#[derive(Debug)]
pub struct PermitReturns {
    slots: Receiver<()>,
}

impl PermitReturns {
    /// Return the permit of a written record.
    ///
    /// Records are only produced after their permit is taken, so a permit is
    /// always waiting here.
    pub fn release(&self) {
        let _ = self.slots.try_recv();
    }

    #[cfg(test)]
    pub(crate) fn outstanding(&self) -> usize {
        self.slots.len()
    }
}
