use crate::error::LoadError;
use csv::{QuoteStyle, WriterBuilder};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::debug;

/// Bad-record file of one failure category. Created on the first rejected
/// record and flushed when closed or dropped.
pub struct BadRecordSink {
    path: PathBuf,
    file: Option<BufWriter<File>>,
    entries: u64,
}

impl BadRecordSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
            entries: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> u64 {
        self.entries
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Appends one entry: the record written by `record`, then the cause line.
    pub fn write_entry(
        &mut self,
        record: impl FnOnce(&mut dyn Write, &Path) -> std::io::Result<()>,
        cause: &str,
    ) -> Result<(), LoadError> {
        let path = self.path.clone();
        let io_err = |source| LoadError::BadFile {
            path: path.clone(),
            source,
        };

        if self.file.is_none() {
            debug!(path = %self.path.display(), "Opening bad record file");
            let file = File::create(&self.path).map_err(io_err)?;
            self.file = Some(BufWriter::new(file));
        }
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };

        record(file, &self.path).map_err(io_err)?;
        writeln!(file, "{cause}").map_err(io_err)?;
        self.entries += 1;
        Ok(())
    }

    pub fn close(&mut self) -> Result<(), LoadError> {
        if let Some(mut file) = self.file.take() {
            file.flush().map_err(|source| LoadError::BadFile {
                path: self.path.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

/// Renders a row as one CSV line: nulls are empty, empty strings quoted.
pub fn csv_line(fields: &[Option<String>]) -> csv::Result<String> {
    let rendered = fields
        .iter()
        .map(|field| match field.as_deref() {
            None => Ok(String::new()),
            Some("") => Ok("\"\"".to_string()),
            Some(text) => csv_field(text),
        })
        .collect::<csv::Result<Vec<_>>>()?;
    Ok(rendered.join(","))
}

fn csv_field(text: &str) -> csv::Result<String> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .quote_style(QuoteStyle::Necessary)
        .from_writer(Vec::new());
    writer.write_field(text)?;
    let bytes = writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
