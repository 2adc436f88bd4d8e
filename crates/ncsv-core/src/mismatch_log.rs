//! Append-only audit log of width mismatches.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crossbeam_channel::Receiver;
use tracing::debug;

use crate::error::{NormalizeError, Result};
use crate::record::Mismatch;

/// Buffered writer producing one line per mismatch.
#[derive(Debug)]
pub struct MismatchLog<W: Write> {
    path: PathBuf,
    writer: W,
    written: u64,
}

impl MismatchLog<BufWriter<File>> {
    /// Create (or truncate) the log file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::CreateMismatchLog`] if the file cannot be created.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|source| NormalizeError::CreateMismatchLog {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_writer(path, BufWriter::new(file)))
    }
}

impl<W: Write> MismatchLog<W> {
    /// Wrap an arbitrary writer; `path` is only used in error messages.
    pub fn from_writer(path: &Path, writer: W) -> Self {
        Self {
            path: path.to_path_buf(),
            writer,
            written: 0,
        }
    }

    /// Append one mismatch line.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::Write`] if the write fails.
    pub fn append(&mut self, mismatch: &Mismatch) -> Result<()> {
        writeln!(self.writer, "{mismatch}").map_err(|e| NormalizeError::write(&self.path, e))?;
        self.written += 1;
        Ok(())
    }

    /// Flush buffered lines and return the writer with the line count.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::Write`] if the flush fails.
    pub fn finish(mut self) -> Result<(W, u64)> {
        self.writer
            .flush()
            .map_err(|e| NormalizeError::write(&self.path, e))?;
        Ok((self.writer, self.written))
    }
}

/// Drain `mismatches` into `log` until every worker has dropped its sender.
///
/// Lines are appended in arrival order. Returns the number of lines written.
///
/// # Errors
///
/// Returns the first write failure; the receiver is dropped on return so
/// workers stop sending.
pub fn drain_mismatches<W: Write>(
    mut log: MismatchLog<W>,
    mismatches: Receiver<Mismatch>,
) -> Result<u64> {
    for mismatch in &mismatches {
        log.append(&mismatch)?;
    }
    let (_, written) = log.finish()?;
    debug!(written, "mismatch log flushed");
    Ok(written)
}
