//! Tokenizer seam: anything that yields raw CSV records.

use std::fs::File;
use std::io;
use std::path::Path;

use csv::{ByteRecord, ReaderBuilder};

use crate::error::{NormalizeError, Result};

/// Failure reading a single record.
#[derive(Debug)]
pub enum SourceError {
    /// The current record is unreadable; the next one may still be fine.
    Recoverable(csv::Error),
    /// The underlying stream failed; no further records can be read.
    Fatal(csv::Error),
}

/// A stream of raw records with a variable number of fields.
///
/// The flexible `csv::Reader` used for files accepts any line as a record and
/// only fails on I/O, so [`SourceError::Recoverable`] is there for stricter
/// tokenizers plugged in through this trait.
pub trait RecordSource {
    /// Read the next record, `Ok(None)` at end of input.
    fn next_record(&mut self) -> std::result::Result<Option<ByteRecord>, SourceError>;
}

impl<R: io::Read> RecordSource for csv::Reader<R> {
    fn next_record(&mut self) -> std::result::Result<Option<ByteRecord>, SourceError> {
        let mut record = ByteRecord::new();
        match self.read_byte_record(&mut record) {
            Ok(true) => Ok(Some(record)),
            Ok(false) => Ok(None),
            Err(err) if err.is_io_error() => Err(SourceError::Fatal(err)),
            Err(err) => Err(SourceError::Recoverable(err)),
        }
    }
}

/// Open `path` as a headerless, flexible CSV reader.
///
/// # Errors
///
/// Returns [`NormalizeError::OpenInput`] if the file cannot be opened.
pub fn open_csv(path: &Path, delimiter: u8) -> Result<csv::Reader<File>> {
    let file = File::open(path).map_err(|source| NormalizeError::OpenInput {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(csv_reader(file, delimiter))
}

/// Wrap any reader with the tokenizer settings the pipeline expects.
pub fn csv_reader<R: io::Read>(reader: R, delimiter: u8) -> csv::Reader<R> {
    ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(reader)
}
