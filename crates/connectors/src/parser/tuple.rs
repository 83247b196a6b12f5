use super::{Parser, write_raw_line};
use crate::error::ParserError;
use model::records::field_set::FieldSet;
use serde_json::Value as JsonValue;
use std::{
    fs::File,
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};
use tracing::debug;

/// Parser for already separated records: one JSON array per line. Strings
/// are taken as-is, other scalars by their JSON text, `null` is a null field.
pub struct TupleParser {
    reader: BufReader<File>,
    path: PathBuf,
    line: Vec<u8>,
    skip: u64,
    skipped: u64,
    ordinal: u64,
    current_field: Option<usize>,
}

impl TupleParser {
    pub fn open(path: &Path, skip: u64) -> Result<Self, ParserError> {
        let file = File::open(path).map_err(|source| ParserError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            reader: BufReader::new(file),
            path: path.to_path_buf(),
            line: Vec::new(),
            skip,
            skipped: 0,
            ordinal: 0,
            current_field: None,
        })
    }
}

fn field_bytes(value: &JsonValue) -> Option<Vec<u8>> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.as_bytes().to_vec()),
        other => Some(other.to_string().into_bytes()),
    }
}

impl Parser for TupleParser {
    fn read(&mut self) -> Result<Option<FieldSet>, ParserError> {
        self.current_field = None;

        loop {
            self.line.clear();
            if self.reader.read_until(b'\n', &mut self.line)? == 0 {
                return Ok(None);
            }
            if self.line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            self.ordinal += 1;

            if self.skipped < self.skip {
                self.skipped += 1;
                continue;
            }

            self.current_field = Some(0);
            let values: Vec<JsonValue> = serde_json::from_slice(&self.line)
                .map_err(|e| ParserError::Malformed(format!("invalid tuple: {e}")))?;

            let mut fields = FieldSet::with_capacity(values.len());
            for value in &values {
                fields.push(field_bytes(value));
            }
            self.current_field = None;
            return Ok(Some(fields));
        }
    }

    fn current_field(&self) -> Option<usize> {
        self.current_field
    }

    fn record_ordinal(&self) -> u64 {
        self.ordinal
    }

    fn dump_rejected_record(&mut self, sink: &mut dyn Write, path: &Path) -> std::io::Result<()> {
        debug!(
            input = %self.path.display(),
            bad_file = %path.display(),
            "Dumping rejected tuple"
        );
        write_raw_line(sink, &self.line)
    }

    fn finalize(&mut self) -> u64 {
        self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    #[test]
    fn test_reads_tuples() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[1, \"a\", null]").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "[true, 2.5]").unwrap();
        file.flush().unwrap();

        let mut parser = TupleParser::open(file.path(), 0).unwrap();
        assert_eq!(
            parser.read().unwrap().unwrap(),
            FieldSet::from(vec![Some("1"), Some("a"), None])
        );
        assert_eq!(
            parser.read().unwrap().unwrap(),
            FieldSet::from(vec![Some("true"), Some("2.5")])
        );
        assert_eq!(parser.record_ordinal(), 2);
        assert!(parser.read().unwrap().is_none());
    }

    #[test]
    fn test_bad_line_is_whole_record_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{{\"not\": \"array\"}}").unwrap();
        file.flush().unwrap();

        let mut parser = TupleParser::open(file.path(), 0).unwrap();
        assert!(matches!(parser.read(), Err(ParserError::Malformed(_))));
        assert_eq!(parser.current_field(), Some(0));

        let mut sink = Vec::new();
        parser
            .dump_rejected_record(&mut sink, Path::new("bad"))
            .unwrap();
        assert_eq!(sink, b"{\"not\": \"array\"}\n");
    }
}
