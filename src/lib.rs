//! # nested-csv - Nested JSON to CSV
//!
//! Turns nested records (maps and lists, as found in JSON) into flat CSV rows.
//! Each column name is a field path describing where its value lives:
//!
//! - `a.b.c` - nested map keys
//! - `a.list[2]` - a fixed list position
//! - `a.list[]` - one row per element of the list
//! - `a.list[id]` - the position of the current element in `a.list`
//!
//! Columns expanding sibling lists at the same depth advance together, so a
//! record yields as many rows as its longest list; nested lists multiply.
//!
//! ## Quick Start
//!
//! ```rust
//! use nested_csv::{CsvSink, NestedWriter, WriterConfig};
//! use serde_json::json;
//!
//! # fn main() -> anyhow::Result<()> {
//! let names = ["user.name", "posts[id]", "posts[].title"];
//! let mut writer = NestedWriter::new(CsvSink::new(Vec::new()), &names, WriterConfig::default())?;
//!
//! writer.write_header()?;
//! writer.write_row(
//!     &json!({"user": {"name": "Alice"}, "posts": [{"title": "First"}, {"title": "Second"}]}),
//!     None,
//! )?;
//!
//! let csv = String::from_utf8(writer.into_sink().into_inner()?)?;
//! assert_eq!(csv, "user.name,posts[id],posts[].title\nAlice,0,First\nAlice,1,Second\n");
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use serde_json::Value;
use std::io::{BufRead, Write};

pub mod error;
pub mod flatten;
pub mod schema;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{FieldConflictError, LookupError, WriteError};
pub use flatten::{CsvSink, NestedWriter, RowBuffer, RowPlan, RowSink};
pub use schema::generate_field_names;
pub use types::{FieldPath, Segment, WriterConfig};

/// Column that takes the explicit record id when the record has none
pub const ID_FIELD: &str = "id";

/// Write every line of a newline-delimited JSON stream as a record.
///
/// Blank lines are skipped. With `first_id`, records are numbered from it.
/// Returns the number of records written.
pub fn write_json_lines<R: BufRead, W: Write>(
    reader: R,
    writer: &mut NestedWriter<CsvSink<W>>,
    first_id: Option<u64>,
) -> Result<u64> {
    let mut ids = first_id.map(|first| first..=u64::MAX);
    let mut count = 0;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read line")?;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line)
            .with_context(|| format!("Failed to parse JSON on line {}", line_no + 1))?;

        let id = match ids.as_mut() {
            Some(ids) => Some(ids.next().ok_or(WriteError::IdOverflow)?),
            None => None,
        };
        writer
            .write_row(&value, id)
            .with_context(|| format!("Failed to write record on line {}", line_no + 1))?;

        count += 1;
    }

    writer.flush().context("Failed to flush output")?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn csv_writer(names: &[&str], config: WriterConfig) -> NestedWriter<CsvSink<Vec<u8>>> {
        NestedWriter::new(CsvSink::new(Vec::new()), names, config).unwrap()
    }

    fn output(writer: NestedWriter<CsvSink<Vec<u8>>>) -> String {
        String::from_utf8(writer.into_sink().into_inner().unwrap()).unwrap()
    }

    #[test]
    fn test_simple_columns() {
        let mut writer = csv_writer(&["a.b.c", "abc"], WriterConfig::default());
        writer.write_row(&json!({"a": {"b": {"c": 1}}, "abc": 2}), None).unwrap();
        assert_eq!(output(writer), "1,2\n");
    }

    #[test]
    fn test_nested_array_expansion() {
        let mut writer = csv_writer(&["a.a[]", "a.b[].c", "a.b[].d[]", "a.c"], WriterConfig::default());
        writer
            .write_row(&json!({"a": {"a": [1, 2], "b": [{"c": 5, "d": [7, 8]}], "c": 9}}), None)
            .unwrap();
        assert_eq!(output(writer), "1,5,7,9\n1,5,8,9\n2,,,9\n");
    }

    #[test]
    fn test_array_id_columns() {
        let mut writer = csv_writer(&["a[].b", "a[].c[]", "a[id]", "a[].c[id]"], WriterConfig::default());
        writer.write_row(&json!({"a": [{"b": 1, "c": [3, 4]}]}), None).unwrap();
        assert_eq!(output(writer), "1,3,0,0\n1,4,0,1\n");
    }

    #[test]
    fn test_conflicting_columns() {
        let result = NestedWriter::new(RowBuffer::new(), &["a.b[]", "b[]"], WriterConfig::default());
        assert!(matches!(result, Err(FieldConflictError::NotArray { .. })));
    }

    #[test]
    fn test_missing_key_writes_nothing() {
        let config = WriterConfig::default().with_raise_on_missing(true);
        let mut writer = csv_writer(&["a", "b[]"], config);
        let err = writer.write_row(&json!({"b": [1, 2]}), None).unwrap_err();
        assert!(matches!(err, WriteError::Lookup(LookupError::MissingKey { .. })));
        assert_eq!(output(writer), "");
    }

    #[test]
    fn test_header_is_verbatim() {
        let names = ["z", "a..b", "c[]", "c[id]", "z"];
        let mut writer = csv_writer(&names, WriterConfig::default());
        writer.write_header().unwrap();
        assert_eq!(output(writer), "z,a..b,c[],c[id],z\n");
    }

    #[test]
    fn test_write_json_lines() {
        let input = "{\"id\": 7, \"v\": [1]}\n\n{\"v\": [2, 3]}\n";
        let mut writer = csv_writer(&["id", "v[]"], WriterConfig::default());

        let count = write_json_lines(input.as_bytes(), &mut writer, Some(1)).unwrap();

        assert_eq!(count, 2);
        assert_eq!(output(writer), "7,1\n2,2\n2,3\n");
    }

    #[test]
    fn test_write_json_lines_last_id() {
        let mut writer = csv_writer(&["id", "v"], WriterConfig::default());
        let count = write_json_lines("{\"v\": 1}\n".as_bytes(), &mut writer, Some(u64::MAX)).unwrap();
        assert_eq!(count, 1);

        let err = write_json_lines("{\"v\": 2}\n{\"v\": 3}\n".as_bytes(), &mut writer, Some(u64::MAX))
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<WriteError>(), Some(WriteError::IdOverflow)));
        assert_eq!(output(writer), "18446744073709551615,1\n18446744073709551615,2\n");
    }

    #[test]
    fn test_write_json_lines_reports_bad_line() {
        let mut writer = csv_writer(&["v"], WriterConfig::default());
        let err = write_json_lines("{\"v\": 1}\nnot json\n".as_bytes(), &mut writer, None).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
