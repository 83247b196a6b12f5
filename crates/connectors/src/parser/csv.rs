use super::{Parser, options::CsvOptions, write_raw_line};
use crate::error::ParserError;
use csv::{ByteRecord, ReaderBuilder};
use model::records::field_set::FieldSet;
use std::{
    fs::File,
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};
use tracing::debug;

/// Delimited text parser on top of the `csv` crate. The reader tracks byte
/// positions so a rejected record can be copied verbatim from a second
/// handle on the same file.
pub struct CsvParser {
    reader: csv::Reader<File>,
    raw: File,
    path: PathBuf,
    null: Vec<u8>,
    record: ByteRecord,
    span: (u64, u64),
    skip: u64,
    skipped: u64,
    ordinal: u64,
    current_field: Option<usize>,
}

impl CsvParser {
    pub fn open(path: &Path, options: CsvOptions, skip: u64) -> Result<Self, ParserError> {
        let open = || {
            File::open(path).map_err(|source| ParserError::Open {
                path: path.to_path_buf(),
                source,
            })
        };

        let mut builder = ReaderBuilder::new();
        builder
            .has_headers(false)
            .flexible(true)
            .delimiter(options.delimiter)
            .quote(options.quote);
        if options.escape != options.quote {
            builder.escape(Some(options.escape)).double_quote(false);
        }

        Ok(Self {
            reader: builder.from_reader(open()?),
            raw: open()?,
            path: path.to_path_buf(),
            null: options.null.into_bytes(),
            record: ByteRecord::new(),
            span: (0, 0),
            skip,
            skipped: 0,
            ordinal: 0,
            current_field: None,
        })
    }
}

impl Parser for CsvParser {
    fn read(&mut self) -> Result<Option<FieldSet>, ParserError> {
        self.current_field = None;

        loop {
            let start = self.reader.position().byte();
            if !self.reader.read_byte_record(&mut self.record)? {
                return Ok(None);
            }
            self.span = (start, self.reader.position().byte());
            self.ordinal += 1;

            if self.skipped < self.skip {
                self.skipped += 1;
                continue;
            }

            let mut fields = FieldSet::with_capacity(self.record.len());
            for (i, field) in self.record.iter().enumerate() {
                self.current_field = Some(i + 1);
                if field == self.null.as_slice() {
                    fields.push(None);
                } else {
                    fields.push(Some(field.to_vec()));
                }
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
        let (start, end) = self.span;
        debug!(
            input = %self.path.display(),
            bad_file = %path.display(),
            start,
            end,
            "Dumping rejected CSV record"
        );
        let mut raw = vec![0; end.saturating_sub(start) as usize];
        self.raw.seek(SeekFrom::Start(start))?;
        self.raw.read_exact(&mut raw)?;
        write_raw_line(sink, &raw)
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
    use tracing_test::traced_test;

    fn input(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_reads_fields_and_nulls() {
        let file = input("1,alpha\n2,\n3,\"a,b\"\n");
        let mut parser = CsvParser::open(file.path(), CsvOptions::default(), 0).unwrap();

        let first = parser.read().unwrap().unwrap();
        assert_eq!(first, FieldSet::from(vec![Some("1"), Some("alpha")]));
        let second = parser.read().unwrap().unwrap();
        assert_eq!(second, FieldSet::from(vec![Some("2"), None]));
        let third = parser.read().unwrap().unwrap();
        assert_eq!(third.get(1), Some(&b"a,b"[..]));
        assert_eq!(parser.record_ordinal(), 3);
        assert!(parser.read().unwrap().is_none());
        assert_eq!(parser.current_field(), None);
    }

    #[test]
    fn test_skip_counts_records() {
        let file = input("h1,h2\nskip,me\n1,x\n");
        let mut parser = CsvParser::open(file.path(), CsvOptions::default(), 2).unwrap();
        let fields = parser.read().unwrap().unwrap();
        assert_eq!(fields.get(0), Some(&b"1"[..]));
        assert_eq!(parser.record_ordinal(), 3);
        assert!(parser.read().unwrap().is_none());
        assert_eq!(parser.finalize(), 2);
    }

    #[test]
    fn test_custom_delimiter_and_null() {
        let file = input("1|\\N|x\n");
        let options = CsvOptions {
            delimiter: b'|',
            null: "\\N".to_string(),
            ..CsvOptions::default()
        };
        let mut parser = CsvParser::open(file.path(), options, 0).unwrap();
        let fields = parser.read().unwrap().unwrap();
        assert_eq!(fields, FieldSet::from(vec![Some("1"), None, Some("x")]));
    }

    #[traced_test]
    #[test]
    fn test_dump_rejected_record_is_verbatim() {
        let file = input("1,a\n2,\"quoted, value\"\n3,c");
        let mut parser = CsvParser::open(file.path(), CsvOptions::default(), 0).unwrap();
        parser.read().unwrap();
        parser.read().unwrap();

        let mut sink = Vec::new();
        parser
            .dump_rejected_record(&mut sink, Path::new("bad.csv"))
            .unwrap();
        assert_eq!(sink, b"2,\"quoted, value\"\n");

        parser.read().unwrap();
        let mut sink = Vec::new();
        parser
            .dump_rejected_record(&mut sink, Path::new("bad.csv"))
            .unwrap();
        assert_eq!(sink, b"3,c\n");
        assert!(logs_contain("Dumping rejected CSV record"));
    }

    #[test]
    fn test_missing_file() {
        let err = CsvParser::open(Path::new("/nonexistent/in.csv"), CsvOptions::default(), 0);
        assert!(matches!(err, Err(ParserError::Open { .. })));
    }
}
