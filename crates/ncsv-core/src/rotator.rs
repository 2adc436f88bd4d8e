//! Output file rotation.
//!
//! [`Rotator`] owns the currently open output file together with its row
//! count and index. Every file starts with the header row; when a split
//! threshold is set a new file is started once the current one holds that
//! many data rows.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use csv::{Writer, WriterBuilder};
use serde::Serialize;
use tracing::debug;

use crate::error::{NormalizeError, Result};
use crate::header::Header;
use crate::record::Record;

/// Suffix appended to the input stem.
pub const NORMALIZED_SUFFIX: &str = "_normalized";

/// Extension of every output file.
pub const OUTPUT_EXTENSION: &str = "csv";

/// Derives output file names from the input file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputNaming {
    dir: PathBuf,
    stem: String,
    numbered: bool,
}

impl OutputNaming {
    /// Names for `input` placed in `dir`, numbered when `split` is non-zero.
    pub fn new(input: &Path, dir: &Path, split: u64) -> Self {
        let stem = input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        Self {
            dir: dir.to_path_buf(),
            stem,
            numbered: split > 0,
        }
    }

    /// Path of the output file with 1-based `index`.
    pub fn path_for(&self, index: u64) -> PathBuf {
        let name = if self.numbered {
            format!("{}{NORMALIZED_SUFFIX}_{index}.{OUTPUT_EXTENSION}", self.stem)
        } else {
            format!("{}{NORMALIZED_SUFFIX}.{OUTPUT_EXTENSION}", self.stem)
        };
        self.dir.join(name)
    }
}

/// One finished output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputFile {
    pub path: PathBuf,
    /// Data rows, excluding the header row.
    pub rows: u64,
}

/// Totals returned by [`Rotator::close`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RotationSummary {
    pub files: Vec<OutputFile>,
    pub rows_written: u64,
}

/// Writes reconciled records to a sequence of output files.
#[derive(Debug)]
pub struct Rotator {
    naming: OutputNaming,
    header: Arc<Header>,
    split: u64,
    current: Option<Writer<File>>,
    rows_in_current_file: u64,
    file_index: u64,
    rows_written: u64,
    files: Vec<OutputFile>,
}

impl Rotator {
    /// A rotator that has not opened any file yet.
    pub fn new(naming: OutputNaming, header: Arc<Header>, split: u64) -> Self {
        Self {
            naming,
            header,
            split,
            current: None,
            rows_in_current_file: 0,
            file_index: 1,
            rows_written: 0,
            files: Vec::new(),
        }
    }

    /// Create the file for the current index and write the header row.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::CreateOutput`] if the file cannot be created
    /// and [`NormalizeError::Write`] if the header cannot be written.
    pub fn open(&mut self) -> Result<()> {
        self.finish_current()?;
        let path = self.naming.path_for(self.file_index);
        let file = File::create(&path).map_err(|source| NormalizeError::CreateOutput {
            path: path.clone(),
            source,
        })?;
        let mut writer = WriterBuilder::new().from_writer(file);
        writer
            .write_byte_record(self.header.as_byte_record())
            .map_err(|e| NormalizeError::write(&path, e))?;
        debug!(path = %path.display(), index = self.file_index, "opened output file");
        self.current = Some(writer);
        self.rows_in_current_file = 0;
        self.files.push(OutputFile { path, rows: 0 });
        Ok(())
    }

    /// Write one record, opening or rotating files as needed.
    ///
    /// # Errors
    ///
    /// Propagates file creation and write failures.
    pub fn write(&mut self, record: &Record) -> Result<()> {
        if self.current.is_none() {
            self.open()?;
        } else if self.split > 0 && self.rows_in_current_file == self.split {
            self.rotate()?;
        }
        let naming = &self.naming;
        let index = self.file_index;
        let writer = self
            .current
            .as_mut()
            .ok_or_else(|| closed_error(&naming.path_for(index)))?;
        writer
            .write_byte_record(&record.fields)
            .map_err(|e| NormalizeError::write(naming.path_for(index), e))?;
        self.rows_in_current_file += 1;
        self.rows_written += 1;
        if let Some(file) = self.files.last_mut() {
            file.rows = self.rows_in_current_file;
        }
        Ok(())
    }

    /// Close the current file and open the next index.
    ///
    /// Before the first file is open this opens file 1 instead, so no index
    /// is skipped.
    ///
    /// # Errors
    ///
    /// Propagates flush, creation and header write failures.
    pub fn rotate(&mut self) -> Result<()> {
        if self.current.is_none() && self.files.is_empty() {
            return self.open();
        }
        self.finish_current()?;
        self.file_index += 1;
        debug!(index = self.file_index, "rotating output file");
        self.open()
    }

    /// Flush and close, returning every file written.
    ///
    /// A rotator that never received a record still produces one header-only
    /// file.
    ///
    /// # Errors
    ///
    /// Propagates creation and flush failures.
    pub fn close(mut self) -> Result<RotationSummary> {
        if self.files.is_empty() {
            self.open()?;
        }
        self.finish_current()?;
        Ok(RotationSummary {
            files: self.files,
            rows_written: self.rows_written,
        })
    }

    fn current_path(&self) -> PathBuf {
        self.naming.path_for(self.file_index)
    }

    fn finish_current(&mut self) -> Result<()> {
        if let Some(mut writer) = self.current.take() {
            let path = self.current_path();
            writer.flush().map_err(|e| NormalizeError::write(&path, e))?;
            debug!(path = %path.display(), rows = self.rows_in_current_file, "closed output file");
        }
        Ok(())
    }
}

fn closed_error(path: &Path) -> NormalizeError {
    NormalizeError::write(
        path,
        std::io::Error::new(std::io::ErrorKind::NotConnected, "output file is not open"),
    )
}
