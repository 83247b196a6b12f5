use super::{Parser, options::FixedOptions, write_raw_line};
use crate::error::ParserError;
use model::records::field_set::FieldSet;
use std::{
    fs::File,
    io::{BufRead, BufReader, Read, Write},
    path::{Path, PathBuf},
};
use tracing::debug;

/// Fixed-width record parser. Every record is exactly the sum of the
/// `COL` widths; a newline directly after a record is tolerated.
pub struct FixedParser {
    reader: BufReader<File>,
    path: PathBuf,
    options: FixedOptions,
    record_len: usize,
    raw: Vec<u8>,
    skip: u64,
    skipped: u64,
    ordinal: u64,
    current_field: Option<usize>,
}

impl FixedParser {
    pub fn open(path: &Path, options: FixedOptions, skip: u64) -> Result<Self, ParserError> {
        let file = File::open(path).map_err(|source| ParserError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let record_len = options.record_len();
        if record_len == 0 {
            return Err(ParserError::Setup("no COL specified".to_string()));
        }

        Ok(Self {
            reader: BufReader::new(file),
            path: path.to_path_buf(),
            options,
            record_len,
            raw: Vec::with_capacity(record_len),
            skip,
            skipped: 0,
            ordinal: 0,
            current_field: None,
        })
    }

    /// Fills `self.raw` with up to one record, returning the bytes read.
    fn fill_record(&mut self) -> std::io::Result<usize> {
        self.raw.clear();
        self.raw.resize(self.record_len, 0);
        let mut filled = 0;
        while filled < self.record_len {
            let n = self.reader.read(&mut self.raw[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        self.raw.truncate(filled);
        Ok(filled)
    }

    fn consume_line_end(&mut self) -> std::io::Result<()> {
        let buf = self.reader.fill_buf()?;
        let n = if buf.starts_with(b"\r\n") {
            2
        } else if buf.starts_with(b"\n") {
            1
        } else {
            0
        };
        self.reader.consume(n);
        Ok(())
    }

    fn split(&mut self) -> FieldSet {
        let mut fields = FieldSet::with_capacity(self.options.widths.len());
        let mut offset = 0;
        for (i, width) in self.options.widths.iter().enumerate() {
            self.current_field = Some(i + 1);
            let mut field = &self.raw[offset..offset + width];
            offset += width;
            if !self.options.preserve_blanks {
                while let [rest @ .., b' '] = field {
                    field = rest;
                }
            }
            let is_null = self
                .options
                .null
                .as_ref()
                .is_some_and(|null| null.as_bytes() == field);
            fields.push(if is_null { None } else { Some(field.to_vec()) });
        }
        fields
    }
}

impl Parser for FixedParser {
    fn read(&mut self) -> Result<Option<FieldSet>, ParserError> {
        self.current_field = None;

        loop {
            let filled = self.fill_record()?;
            if filled == 0 {
                return Ok(None);
            }
            self.ordinal += 1;
            self.consume_line_end()?;

            if self.skipped < self.skip {
                self.skipped += 1;
                continue;
            }

            if filled < self.record_len {
                let mut end = 0;
                let column = self
                    .options
                    .widths
                    .iter()
                    .position(|w| {
                        end += w;
                        end > filled
                    })
                    .map_or(0, |i| i + 1);
                self.current_field = Some(column);
                return Err(ParserError::Malformed(format!(
                    "record is too short: {filled} of {} bytes",
                    self.record_len
                )));
            }

            let fields = self.split();
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
            "Dumping rejected fixed-width record"
        );
        write_raw_line(sink, &self.raw)
    }

    fn finalize(&mut self) -> u64 {
        self.skipped
    }
}
