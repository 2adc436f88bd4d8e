//! Header resolution.
//!
//! The header is fixed before any worker starts and only read afterwards, so
//! the pipeline shares it behind an `Arc` without locking.

use std::borrow::Cow;
use std::path::Path;

use csv::ByteRecord;

use crate::error::{NormalizeError, Result};
use crate::source::{RecordSource, SourceError};

/// Ordered column names defining the expected record width.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    columns: ByteRecord,
}

impl Header {
    /// Split an explicit comma-separated column list.
    pub fn from_list(list: &str) -> Self {
        Self {
            columns: list.split(',').collect(),
        }
    }

    /// Use a record read from the input verbatim.
    pub fn from_record(columns: ByteRecord) -> Self {
        Self { columns }
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Raw header row, as written at the top of every output file.
    pub fn as_byte_record(&self) -> &ByteRecord {
        &self.columns
    }

    /// Column names, lossily decoded for display.
    pub fn names(&self) -> impl Iterator<Item = Cow<'_, str>> {
        self.columns.iter().map(String::from_utf8_lossy)
    }
}

/// A header together with the line number of the first data record.
#[derive(Debug, Clone)]
pub struct ResolvedHeader {
    pub header: Header,
    pub first_line: u64,
}

/// Determine the header for a run.
///
/// An explicit list wins and consumes no input. Otherwise the first record of
/// `source` becomes the header and counts as line 1.
///
/// # Errors
///
/// Returns [`NormalizeError::HeaderRead`] if the first record cannot be read
/// and [`NormalizeError::EmptyInput`] if there is no first record.
pub fn resolve_header<S: RecordSource + ?Sized>(
    explicit: Option<&str>,
    source: &mut S,
    path: &Path,
) -> Result<ResolvedHeader> {
    if let Some(list) = explicit.filter(|list| !list.is_empty()) {
        let header = Header::from_list(list);
        tracing::debug!(columns = header.width(), "using explicit header");
        return Ok(ResolvedHeader {
            header,
            first_line: 1,
        });
    }

    match source.next_record() {
        Ok(Some(record)) => {
            let header = Header::from_record(record);
            tracing::debug!(columns = header.width(), "using first input line as header");
            Ok(ResolvedHeader {
                header,
                first_line: 2,
            })
        }
        Ok(None) => Err(NormalizeError::EmptyInput {
            path: path.to_path_buf(),
        }),
        Err(SourceError::Recoverable(source) | SourceError::Fatal(source)) => {
            Err(NormalizeError::HeaderRead {
                path: path.to_path_buf(),
                source,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::csv_reader;

    #[test]
    fn test_explicit_header_consumes_nothing() {
        let mut source = csv_reader("1,2,3\n".as_bytes(), b',');
        let resolved = resolve_header(Some("a,b"), &mut source, Path::new("in.csv")).unwrap();
        assert_eq!(resolved.header.width(), 2);
        assert_eq!(resolved.first_line, 1);
        let first = source.next_record().unwrap().unwrap();
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_header_from_first_line() {
        let mut source = csv_reader("id,name,city\n1,x,y\n".as_bytes(), b',');
        let resolved = resolve_header(None, &mut source, Path::new("in.csv")).unwrap();
        let names: Vec<String> = resolved.header.names().map(Cow::into_owned).collect();
        assert_eq!(names, vec!["id", "name", "city"]);
        assert_eq!(resolved.first_line, 2);
    }

    #[test]
    fn test_empty_explicit_header_falls_back_to_input() {
        let mut source = csv_reader("a,b\n".as_bytes(), b',');
        let resolved = resolve_header(Some(""), &mut source, Path::new("in.csv")).unwrap();
        assert_eq!(resolved.header.width(), 2);
        assert_eq!(resolved.first_line, 2);
    }

    #[test]
    fn test_empty_input_without_header_fails() {
        let mut source = csv_reader("".as_bytes(), b',');
        let err = resolve_header(None, &mut source, Path::new("in.csv")).unwrap_err();
        assert!(matches!(err, NormalizeError::EmptyInput { .. }));
    }

    #[test]
    fn test_explicit_header_keeps_empty_names() {
        let header = Header::from_list("a,,c");
        assert_eq!(header.width(), 3);
    }
}
