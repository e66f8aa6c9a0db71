use crate::error::{FieldConflictError, LookupError, WriteError};
use crate::flatten::plan::RowPlan;
use crate::flatten::resolver::{render_value, Resolver};
use crate::types::{Segment, WriterConfig};
use serde_json::Value;
use std::io::Write;
use tracing::trace;

/// Destination for header and rows. Values arrive in header order.
pub trait RowSink {
    fn write_header(&mut self, header: &[String]) -> Result<(), WriteError>;

    fn write_row(&mut self, row: &[String]) -> Result<(), WriteError>;

    fn flush(&mut self) -> Result<(), WriteError> {
        Ok(())
    }
}

/// Writes rows as CSV records
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CsvSink<W> {
    pub fn new(writer: W) -> Self {
        CsvSink {
            writer: csv::Writer::from_writer(writer),
        }
    }

    /// Use a pre-configured `csv::Writer` (delimiter, quoting, terminator)
    pub fn from_csv_writer(writer: csv::Writer<W>) -> Self {
        CsvSink { writer }
    }

    pub fn into_inner(self) -> Result<W, WriteError> {
        self.writer
            .into_inner()
            .map_err(|e| WriteError::Io(e.into_error()))
    }
}

impl<W: Write> RowSink for CsvSink<W> {
    fn write_header(&mut self, header: &[String]) -> Result<(), WriteError> {
        self.writer.write_record(header)?;
        Ok(())
    }

    fn write_row(&mut self, row: &[String]) -> Result<(), WriteError> {
        self.writer.write_record(row)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), WriteError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Collects header and rows in memory
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RowBuffer {
    pub header: Option<Vec<String>>,
    pub rows: Vec<Vec<String>>,
}

impl RowBuffer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RowSink for RowBuffer {
    fn write_header(&mut self, header: &[String]) -> Result<(), WriteError> {
        self.header = Some(header.to_vec());
        Ok(())
    }

    fn write_row(&mut self, row: &[String]) -> Result<(), WriteError> {
        self.rows.push(row.to_vec());
        Ok(())
    }
}

/// Expands nested records into flat rows according to field-path column names.
///
/// ```rust
/// use nested_csv::{NestedWriter, RowBuffer, WriterConfig};
/// use serde_json::json;
///
/// # fn main() -> anyhow::Result<()> {
/// let mut writer = NestedWriter::new(
///     RowBuffer::new(),
///     &["id", "tags[]"],
///     WriterConfig::default(),
/// )?;
/// writer.write_row(&json!({"tags": ["a", "b"]}), Some(7))?;
///
/// assert_eq!(writer.sink().rows, vec![vec!["7", "a"], vec!["7", "b"]]);
/// # Ok(())
/// # }
/// ```
pub struct NestedWriter<S: RowSink> {
    sink: S,
    plan: RowPlan,
    resolver: Resolver,
    restval: String,
    header: Vec<String>,

    /// Index tuple of the last row emitted for the current record
    prev_indexes: Option<Vec<usize>>,
}

impl<S: RowSink> NestedWriter<S> {
    /// Build a writer; fails if the column names cannot be arranged into rows
    pub fn new<N: AsRef<str>>(
        sink: S,
        field_names: &[N],
        config: WriterConfig,
    ) -> Result<Self, FieldConflictError> {
        let plan = RowPlan::new(field_names)?;
        Ok(NestedWriter {
            sink,
            header: plan.field_names(),
            plan,
            resolver: Resolver::new(config.raise_on_missing),
            restval: config.restval,
            prev_indexes: None,
        })
    }

    pub fn field_names(&self) -> &[String] {
        &self.header
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn flush(&mut self) -> Result<(), WriteError> {
        self.sink.flush()
    }

    /// Write the column names verbatim
    pub fn write_header(&mut self) -> Result<(), WriteError> {
        self.sink.write_header(&self.header)
    }

    /// Write every row produced by one record.
    ///
    /// `id` fills the `id` column only when the record does not supply one.
    /// On a lookup failure nothing is written for this record.
    pub fn write_row(&mut self, record: &Value, id: Option<u64>) -> Result<(), WriteError> {
        let mut row = vec![self.restval.clone(); self.plan.columns.len()];

        for &index in &self.plan.simple_fields {
            let column = &self.plan.columns[index];
            let value = self.resolver.value(&column.name, record, column.path.segments(), &[])?;
            row[index] = match (id, value) {
                (Some(id), value) if column.name == crate::ID_FIELD && self.is_restval(value) => id.to_string(),
                (_, Some(value)) => render_value(value),
                (_, None) => self.restval.clone(),
            };
        }

        if !self.plan.has_arrays() {
            self.sink.write_row(&row)?;
            return Ok(());
        }

        let loop_counts = self.loop_counts(record)?;
        trace!(?loop_counts, "expanding record");

        // Resolve all rows first so a lookup failure leaves the sink untouched
        let mut rows = Vec::new();
        self.prev_indexes = None;
        for indexes in IndexTuples::new(&loop_counts) {
            self.render(record, &indexes, &mut row)?;
            rows.push(row.clone());
            self.prev_indexes = Some(indexes);
        }

        for row in &rows {
            self.sink.write_row(row)?;
        }
        Ok(())
    }

    /// Write each record in turn. With `first_id`, records get consecutive
    /// ids starting from it.
    ///
    /// A failing record stops the batch; rows of earlier records stay written.
    pub fn write_rows<'a, I>(&mut self, records: I, first_id: Option<u64>) -> Result<(), WriteError>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut ids = first_id.map(|first| first..=u64::MAX);
        for record in records {
            let id = match ids.as_mut() {
                Some(ids) => Some(ids.next().ok_or(WriteError::IdOverflow)?),
                None => None,
            };
            self.write_row(record, id)?;
        }
        Ok(())
    }

    /// A missing value, or a string equal to `restval`. Other values the
    /// record supplies, `null` included, count as set.
    fn is_restval(&self, value: Option<&Value>) -> bool {
        match value {
            None => true,
            Some(Value::String(s)) => *s == self.restval,
            Some(_) => false,
        }
    }

    /// Rows needed per level: the longest list among its prefixes, at least 1
    fn loop_counts(&self, record: &Value) -> Result<Vec<usize>, LookupError> {
        let mut counts = Vec::with_capacity(self.plan.levels.len());
        for level in &self.plan.levels {
            let mut longest = 0;
            for prefix in &level.prefixes {
                longest = longest.max(self.resolver.max_len(&prefix.name, record, &prefix.segments)?);
            }
            counts.push(longest.max(1));
        }
        Ok(counts)
    }

    /// Stage the cells of one index tuple into `row`.
    ///
    /// A level is re-rendered when its own index moved or any outer level
    /// was re-rendered; otherwise its cells from the previous tuple stand.
    fn render(&self, record: &Value, indexes: &[usize], row: &mut [String]) -> Result<(), LookupError> {
        for (level, &index) in self.plan.levels.iter().zip(indexes) {
            for binding in &level.ids {
                row[binding.column] = index.to_string();
            }
        }

        let mut changed = false;
        for (depth, level) in self.plan.levels.iter().enumerate() {
            let moved = match &self.prev_indexes {
                Some(prev) => prev[depth] != indexes[depth],
                None => true,
            };
            if !(changed || moved) {
                continue;
            }
            changed = true;
            for field in &level.fields {
                row[field.column] = self.resolve(&field.name, record, field.path.segments(), indexes)?;
            }
        }
        Ok(())
    }

    fn resolve(
        &self,
        name: &str,
        record: &Value,
        path: &[Segment],
        indexes: &[usize],
    ) -> Result<String, LookupError> {
        Ok(self
            .resolver
            .value(name, record, path, indexes)?
            .map(render_value)
            .unwrap_or_else(|| self.restval.clone()))
    }
}

/// Cartesian product of `0..n` for each count, last position varying fastest
struct IndexTuples {
    counts: Vec<usize>,
    next: Option<Vec<usize>>,
}

impl IndexTuples {
    fn new(counts: &[usize]) -> Self {
        let next = if counts.iter().all(|&n| n > 0) {
            Some(vec![0; counts.len()])
        } else {
            None
        };
        IndexTuples {
            counts: counts.to_vec(),
            next,
        }
    }
}

impl Iterator for IndexTuples {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;

        let mut advanced = current.clone();
        for pos in (0..advanced.len()).rev() {
            advanced[pos] += 1;
            if advanced[pos] < self.counts[pos] {
                self.next = Some(advanced);
                break;
            }
            advanced[pos] = 0;
        }

        Some(current)
    }
}
