//! Record format parsers. Each turns the input file into [`FieldSet`]s and
//! keeps enough of the last raw record to dump it to the parse-bad file.

pub mod csv;
pub mod fixed;
pub mod options;
pub mod tuple;

use crate::error::ParserError;
use model::records::field_set::FieldSet;
use std::{io::Write, path::Path};

pub use options::{ParserKind, ParserOptions};

pub trait Parser: Send {
    /// Reads the next record, `Ok(None)` at end of input.
    fn read(&mut self) -> Result<Option<FieldSet>, ParserError>;

    /// Field being interpreted: `Some(k)` for the 1-based column `k`,
    /// `Some(0)` for the record as a whole, `None` when the parser is not
    /// looking at record content (errors are then not the record's fault).
    fn current_field(&self) -> Option<usize>;

    /// 1-based ordinal of the last record read, skipped records included.
    fn record_ordinal(&self) -> u64;

    /// Appends the raw bytes of the last record read to a bad-record file.
    fn dump_rejected_record(&mut self, sink: &mut dyn Write, path: &Path) -> std::io::Result<()>;

    /// Ends parsing and returns how many leading records were skipped.
    fn finalize(&mut self) -> u64;
}

/// Writes raw record bytes followed by a newline if they lack one.
pub(crate) fn write_raw_line(sink: &mut dyn Write, raw: &[u8]) -> std::io::Result<()> {
    sink.write_all(raw)?;
    if !raw.ends_with(b"\n") {
        sink.write_all(b"\n")?;
    }
    Ok(())
}
