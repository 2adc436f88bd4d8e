//! Width reconciliation and best-effort text cleanup.

use std::borrow::Cow;

use csv::ByteRecord;

use crate::record::{Mismatch, Record};

/// Truncate or pad `record` to `width` fields.
///
/// Returns the mismatch describing the original width, or `None` when the
/// record already had `width` fields and was left untouched.
pub fn reconcile(record: &mut Record, width: usize) -> Option<Mismatch> {
    let mismatch = Mismatch::detect(record.line_number, width, record.width())?;
    if record.fields.len() > width {
        record.fields.truncate(width);
    } else {
        while record.fields.len() < width {
            record.fields.push_field(b"");
        }
    }
    Some(mismatch)
}

/// Drop invalid UTF-8 sequences from `field`, keeping every valid byte.
pub fn sanitize_field(field: &[u8]) -> Cow<'_, [u8]> {
    if std::str::from_utf8(field).is_ok() {
        return Cow::Borrowed(field);
    }
    let mut cleaned = Vec::with_capacity(field.len());
    for chunk in field.utf8_chunks() {
        cleaned.extend_from_slice(chunk.valid().as_bytes());
    }
    Cow::Owned(cleaned)
}

/// Sanitize every field of `fields`, returning how many were changed.
pub fn sanitize_record(fields: &mut ByteRecord) -> usize {
    let mut changed = 0;
    let cleaned: ByteRecord = fields
        .iter()
        .map(|field| {
            let cleaned = sanitize_field(field);
            if matches!(cleaned, Cow::Owned(_)) {
                changed += 1;
            }
            cleaned
        })
        .collect();
    if changed > 0 {
        *fields = cleaned;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MismatchKind;

    fn record(fields: &[&str]) -> Record {
        Record::new(7, 0, ByteRecord::from(fields.to_vec()))
    }

    #[test]
    fn test_pads_missing_fields() {
        let mut rec = record(&["1", "2"]);
        let mismatch = reconcile(&mut rec, 3).unwrap();
        assert_eq!(mismatch.kind, MismatchKind::Missing);
        assert_eq!(mismatch.expected_width, 3);
        assert_eq!(mismatch.actual_width, 2);
        assert_eq!(mismatch.line_number, 7);
        assert_eq!(rec.fields, ByteRecord::from(vec!["1", "2", ""]));
    }

    #[test]
    fn test_truncates_extra_fields() {
        let mut rec = record(&["1", "2", "3"]);
        let mismatch = reconcile(&mut rec, 2).unwrap();
        assert_eq!(mismatch.kind, MismatchKind::Extra);
        assert_eq!(mismatch.expected_width, 2);
        assert_eq!(mismatch.actual_width, 3);
        assert_eq!(rec.fields, ByteRecord::from(vec!["1", "2"]));
    }

    #[test]
    fn test_correct_width_is_untouched() {
        let mut rec = record(&["a", "b", "c"]);
        let before = rec.clone();
        assert!(reconcile(&mut rec, 3).is_none());
        assert_eq!(rec, before);
    }

    #[test]
    fn test_sanitize_removes_invalid_sequence() {
        let cleaned = sanitize_field(b"caf\xc3\xa9 \xff\xfe bar");
        assert_eq!(&*cleaned, "café  bar".as_bytes());
    }

    #[test]
    fn test_sanitize_borrows_valid_input() {
        assert!(matches!(sanitize_field("plain ✓".as_bytes()), Cow::Borrowed(_)));
    }

    #[test]
    fn test_sanitize_record_counts_changed_fields() {
        let mut fields = ByteRecord::from(vec![&b"ok"[..], &b"a\x80b"[..], &b"\xc3"[..]]);
        assert_eq!(sanitize_record(&mut fields), 2);
        assert_eq!(fields, ByteRecord::from(vec!["ok", "ab", ""]));
    }
}
