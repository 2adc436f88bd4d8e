//! Records flowing through the pipeline and the mismatch audit entries they produce.

use std::fmt;

use csv::ByteRecord;
use serde::Serialize;

/// One input row with its position in the file.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// 1-based line number, counting the header line when it came from the file.
    pub line_number: u64,
    /// Dense 0-based index over successfully read records.
    pub sequence: u64,
    /// Raw field bytes.
    pub fields: ByteRecord,
}

impl Record {
    pub fn new(line_number: u64, sequence: u64, fields: ByteRecord) -> Self {
        Self {
            line_number,
            sequence,
            fields,
        }
    }

    /// Number of fields.
    pub fn width(&self) -> usize {
        self.fields.len()
    }
}

/// Direction of a width deviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MismatchKind {
    /// The record had more fields than the header.
    Extra,
    /// The record had fewer fields than the header.
    Missing,
}

impl MismatchKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Extra => "Extra",
            Self::Missing => "Missing",
        }
    }
}

impl fmt::Display for MismatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Audit entry for a record whose width differed from the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub line_number: u64,
    pub expected_width: usize,
    /// Width before reconciliation.
    pub actual_width: usize,
    pub kind: MismatchKind,
}

impl Mismatch {
    /// Classify a width deviation, returning `None` when the widths agree.
    pub fn detect(line_number: u64, expected_width: usize, actual_width: usize) -> Option<Self> {
        let kind = match actual_width.cmp(&expected_width) {
            std::cmp::Ordering::Greater => MismatchKind::Extra,
            std::cmp::Ordering::Less => MismatchKind::Missing,
            std::cmp::Ordering::Equal => return None,
        };
        Some(Self {
            line_number,
            expected_width,
            actual_width,
            kind,
        })
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Line {}: {} columns detected. Header: {} columns, Line: {} columns",
            self.line_number, self.kind, self.expected_width, self.actual_width
        )
    }
}
