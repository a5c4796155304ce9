//! Success-ledger CSV reading and writing.
//!
//! Rows are positional: the header is carried through untouched apart from the
//! inserted label, and fields are never looked up by name. Quoted fields are
//! honoured on input and written back quoted only when they hold a delimiter,
//! a quote or a line break. An unquoted field with a stray `"` is therefore
//! written back quoted, with the quote doubled.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Terminator, WriterBuilder};

use robotscheck_shared::{LedgerLayout, OutputMode, Result, RobotsCheckError};

// ---------------------------------------------------------------------------
// LedgerRow
// ---------------------------------------------------------------------------

/// One ledger line split into its fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerRow(Vec<String>);

impl LedgerRow {
    /// All fields in order.
    pub fn fields(&self) -> &[String] {
        &self.0
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the row has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Field at `index`, if present.
    pub fn field(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    /// The row identifier (artifact file stem).
    pub fn id(&self, layout: &LedgerLayout) -> Option<&str> {
        self.field(layout.id_index)
    }

    /// The fetched end URL.
    pub fn url(&self, layout: &LedgerLayout) -> Option<&str> {
        self.field(layout.url_index)
    }

    /// Insert `value` as a new field at `index`.
    ///
    /// An index past the end appends, so short rows still gain exactly one field.
    pub fn widen(mut self, index: usize, value: impl Into<String>) -> Self {
        let at = index.min(self.0.len());
        self.0.insert(at, value.into());
        self
    }
}

impl From<&StringRecord> for LedgerRow {
    fn from(record: &StringRecord) -> Self {
        Self(record.iter().map(str::to_string).collect())
    }
}

impl<S: Into<String>> FromIterator<S> for LedgerRow {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

// ---------------------------------------------------------------------------
// LedgerReader
// ---------------------------------------------------------------------------

/// Streams a ledger one row at a time.
pub struct LedgerReader {
    path: PathBuf,
    reader: csv::Reader<File>,
    header: LedgerRow,
    record: StringRecord,
}

impl LedgerReader {
    /// Open `path` and consume its header line.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| RobotsCheckError::io(path, e))?;
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);

        let mut record = StringRecord::new();
        if !reader.read_record(&mut record)? {
            return Err(RobotsCheckError::ledger(
                1,
                format!("{} is empty, expected a header row", path.display()),
            ));
        }
        let header = LedgerRow::from(&record);

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            header,
            record,
        })
    }

    /// Path this reader was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The header row.
    pub fn header(&self) -> &LedgerRow {
        &self.header
    }

    /// Next data row with its 1-based line number, or `None` at end of input.
    pub fn next_row(&mut self) -> Result<Option<(u64, LedgerRow)>> {
        if !self.reader.read_record(&mut self.record)? {
            return Ok(None);
        }
        let line = self.record.position().map_or(0, |pos| pos.line());
        Ok(Some((line, LedgerRow::from(&self.record))))
    }
}

// ---------------------------------------------------------------------------
// LedgerWriter
// ---------------------------------------------------------------------------

/// Writes widened rows to the output ledger.
pub struct LedgerWriter {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl LedgerWriter {
    /// Open `path` for appending or after truncating, creating it if missing.
    pub fn open(path: &Path, mode: OutputMode) -> Result<Self> {
        let mut options = OpenOptions::new();
        options.create(true);
        match mode {
            OutputMode::Append => options.append(true),
            OutputMode::Truncate => options.write(true).truncate(true),
        };
        let file = options.open(path).map_err(|e| RobotsCheckError::io(path, e))?;

        let writer = WriterBuilder::new()
            .flexible(true)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(file);

        Ok(Self {
            path: path.to_path_buf(),
            writer,
        })
    }

    /// Path this writer appends to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one row.
    pub fn write_row(&mut self, row: &LedgerRow) -> Result<()> {
        self.writer.write_record(row.fields())?;
        Ok(())
    }

    /// Flush buffered rows to disk.
    pub fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| RobotsCheckError::io(&self.path, e))
    }
}
