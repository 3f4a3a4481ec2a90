//! Full-rewrite CSV snapshots of a table.
//!
//! Every mutating table operation rewrites the table's file from scratch:
//! one `<key>,<record>` row per entry, rows sorted by the string form of the
//! key. There is no log and no atomic rename, so a crash mid-write can leave
//! a truncated file.

use crate::record::Record;
use arbor_common::{ArborError, Result};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// One parsed snapshot row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRow {
    /// Primary key.
    pub key: i64,
    /// Text rendering of the record as it was written.
    pub value: String,
}

/// Truncates `path` and writes every entry of `rows`.
///
/// With `fsync` set the file is synced to disk before returning.
pub fn write_snapshot(path: &Path, rows: &HashMap<i64, Record>, fsync: bool) -> Result<()> {
    let mut sorted: Vec<(String, &Record)> =
        rows.iter().map(|(k, r)| (k.to_string(), r)).collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    let mut writer = BufWriter::new(file);
    for (key, record) in &sorted {
        writeln!(writer, "{},{}", key, quote(&record.to_string()))?;
    }
    writer.flush()?;
    if fsync {
        writer.get_ref().sync_all()?;
    }

    debug!(path = %path.display(), rows = sorted.len(), "snapshot written");
    Ok(())
}

/// Reads a snapshot file back into rows, in file order.
pub fn read_rows(path: &Path) -> Result<Vec<SnapshotRow>> {
    let text = fs::read_to_string(path)?;
    let mut rows = Vec::new();
    for (line, fields) in split_records(&text)?.into_iter().enumerate() {
        let [key, value]: [String; 2] = fields.try_into().map_err(|fields: Vec<String>| {
            ArborError::Internal(format!(
                "{}: row {} has {} fields, expected 2",
                path.display(),
                line + 1,
                fields.len()
            ))
        })?;
        let key = key.parse::<i64>().map_err(|_| {
            ArborError::Internal(format!(
                "{}: row {} has non-integer key {:?}",
                path.display(),
                line + 1,
                key
            ))
        })?;
        rows.push(SnapshotRow { key, value });
    }
    Ok(rows)
}

/// Quotes a field when it holds a delimiter, quote or line break.
fn quote(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Splits CSV text into records of unquoted fields.
fn split_records(text: &str) -> Result<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if quoted {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => quoted = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() => quoted = true,
            ',' => fields.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                fields.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut fields));
            }
            _ => field.push(c),
        }
    }

    if quoted {
        return Err(ArborError::Internal(
            "unterminated quoted field in snapshot".to_string(),
        ));
    }
    if !field.is_empty() || !fields.is_empty() {
        fields.push(field);
        records.push(fields);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn row(id: i64, name: &str) -> (i64, Record) {
        (id, Record::new().with("ID", id).with("NAME", name))
    }

    #[test]
    fn test_rows_sorted_by_key_text() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("USER.csv");
        let rows: HashMap<_, _> = [row(2, "b"), row(10, "j"), row(1, "a")].into_iter().collect();

        write_snapshot(&path, &rows, false).unwrap();
        let keys: Vec<i64> = read_rows(&path).unwrap().iter().map(|r| r.key).collect();
        // String order, not numeric order.
        assert_eq!(keys, vec![1, 10, 2]);
    }

    #[test]
    fn test_record_text_is_quoted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("USER.csv");
        let rows: HashMap<_, _> = [row(1, "a")].into_iter().collect();

        write_snapshot(&path, &rows, true).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "1,\"{ID: 1, NAME: 'a'}\"\n");

        let parsed = read_rows(&path).unwrap();
        assert_eq!(
            parsed,
            vec![SnapshotRow {
                key: 1,
                value: "{ID: 1, NAME: 'a'}".to_string()
            }]
        );
    }

    #[test]
    fn test_embedded_quotes_and_newlines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("T.csv");
        let rows: HashMap<_, _> = [row(5, "say \"hi\"\nbye")].into_iter().collect();

        write_snapshot(&path, &rows, false).unwrap();
        let parsed = read_rows(&path).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].value, rows[&5].to_string());
    }

    #[test]
    fn test_rewrite_truncates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("T.csv");
        let many: HashMap<_, _> = (1..=5).map(|i| row(i, "x")).collect();
        write_snapshot(&path, &many, false).unwrap();
        assert_eq!(read_rows(&path).unwrap().len(), 5);

        write_snapshot(&path, &HashMap::new(), false).unwrap();
        assert!(read_rows(&path).unwrap().is_empty());
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_unquoted_fields_and_crlf() {
        let fields = split_records("1,plain\r\n2,\"a,b\"").unwrap();
        assert_eq!(
            fields,
            vec![
                vec!["1".to_string(), "plain".to_string()],
                vec!["2".to_string(), "a,b".to_string()],
            ]
        );
    }

    #[test]
    fn test_malformed_rows_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "abc,{}\n").unwrap();
        assert!(read_rows(&path).is_err());

        fs::write(&path, "1,\"open\n").unwrap();
        assert!(read_rows(&path).is_err());

        fs::write(&path, "1\n").unwrap();
        assert!(read_rows(&path).is_err());
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("no-such-db").join("T.csv");
        let err = write_snapshot(&path, &HashMap::new(), false).unwrap_err();
        assert!(matches!(err, ArborError::Io(_)));
    }
}
