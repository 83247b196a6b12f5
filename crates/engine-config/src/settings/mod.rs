//! Load configuration assembled from control lines.

pub mod defaults;
pub mod values;

use crate::{
    control::{self, ControlLine},
    error::ConfigError,
};
use chrono::{DateTime, Local};
use connectors::{
    catalog::{Catalog, TargetTable},
    parser::{ParserKind, ParserOptions, options::parse_bool},
    writer::WriterKind,
};
use defaults::{DEFAULT_ERROR_THRESHOLD, default_paths};
use model::execution::policy::{Bound, OnDuplicate};
use std::{
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

/// Everything a load needs, fixed before the first record is read.
#[derive(Debug, Clone)]
pub struct LoadConfiguration {
    pub table: TargetTable,
    pub infile: PathBuf,
    pub logfile: PathBuf,
    pub parse_badfile: PathBuf,
    pub duplicate_badfile: PathBuf,
    pub parser: ParserOptions,
    pub writer: WriterKind,
    pub parse_errors: Bound,
    pub duplicate_errors: Bound,
    pub limit: Bound,
    pub on_duplicate: OnDuplicate,
    pub verbose: bool,
}

/// Collects control lines into a [`LoadConfiguration`]. The catalog is
/// consulted as soon as `TABLE` is seen.
pub struct ConfigBuilder<'a> {
    catalog: &'a Catalog,
    output_dir: PathBuf,
    started_at: DateTime<Local>,
    table: Option<TargetTable>,
    infile: Option<PathBuf>,
    logfile: Option<PathBuf>,
    parse_badfile: Option<PathBuf>,
    duplicate_badfile: Option<PathBuf>,
    parser: Option<ParserOptions>,
    writer: Option<WriterKind>,
    parse_errors: Option<Bound>,
    duplicate_errors: Option<Bound>,
    limit: Option<Bound>,
    on_duplicate: OnDuplicate,
    verbose: bool,
}

fn invalid(line: &ControlLine, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        context: line.clone(),
        message: message.into(),
    }
}

/// Keywords that may appear only once.
fn assert_once<T>(slot: &Option<T>, line: &ControlLine, name: &str) -> Result<(), ConfigError> {
    if slot.is_some() {
        return Err(invalid(line, format!("duplicate {name} specified")));
    }
    Ok(())
}

fn choice<T>(
    line: &ControlLine,
    parsed: Option<T>,
) -> Result<T, ConfigError> {
    parsed.ok_or_else(|| {
        invalid(
            line,
            format!("invalid {} \"{}\"", line.keyword.to_ascii_uppercase(), line.value),
        )
    })
}

impl<'a> ConfigBuilder<'a> {
    pub fn new(catalog: &'a Catalog, output_dir: impl Into<PathBuf>, started_at: DateTime<Local>) -> Self {
        Self {
            catalog,
            output_dir: output_dir.into(),
            started_at,
            table: None,
            infile: None,
            logfile: None,
            parse_badfile: None,
            duplicate_badfile: None,
            parser: None,
            writer: None,
            parse_errors: None,
            duplicate_errors: None,
            limit: None,
            on_duplicate: OnDuplicate::default(),
            verbose: false,
        }
    }

    pub fn apply(&mut self, line: &ControlLine) -> Result<(), ConfigError> {
        let value = line.value.as_str();

        match line.keyword.to_ascii_uppercase().as_str() {
            "TABLE" => {
                assert_once(&self.table, line, "TABLE")?;
                let table = self
                    .catalog
                    .resolve_table(value)
                    .map_err(|source| ConfigError::Catalog {
                        context: line.clone(),
                        source,
                    })?;
                self.table = Some(table);
            }
            "INFILE" => {
                assert_once(&self.infile, line, "INFILE")?;
                self.infile = Some(PathBuf::from(value));
            }
            "LOGFILE" => {
                assert_once(&self.logfile, line, "LOGFILE")?;
                self.logfile = Some(PathBuf::from(value));
            }
            "PARSE_BADFILE" => {
                assert_once(&self.parse_badfile, line, "PARSE_BADFILE")?;
                self.parse_badfile = Some(PathBuf::from(value));
            }
            "DUPLICATE_BADFILE" => {
                assert_once(&self.duplicate_badfile, line, "DUPLICATE_BADFILE")?;
                self.duplicate_badfile = Some(PathBuf::from(value));
            }
            "TYPE" => {
                assert_once(&self.parser, line, "TYPE")?;
                let kind = choice(line, ParserKind::from_choice(value))?;
                self.parser = Some(ParserOptions::new(kind));
            }
            "WRITER" | "LOADER" => {
                assert_once(&self.writer, line, "WRITER")?;
                self.writer = Some(choice(line, WriterKind::from_choice(value))?);
            }
            "PARSE_ERRORS" | "MAX_ERR_CNT" => {
                assert_once(&self.parse_errors, line, "PARSE_ERRORS")?;
                self.parse_errors =
                    Some(values::parse_threshold(value).map_err(|m| invalid(line, m))?);
            }
            "DUPLICATE_ERRORS" => {
                assert_once(&self.duplicate_errors, line, "DUPLICATE_ERRORS")?;
                self.duplicate_errors =
                    Some(values::parse_threshold(value).map_err(|m| invalid(line, m))?);
            }
            "LOAD" | "LIMIT" => {
                assert_once(&self.limit, line, "LOAD")?;
                self.limit = Some(values::parse_limit(value).map_err(|m| invalid(line, m))?);
            }
            "ON_DUPLICATE" => {
                self.on_duplicate = choice(line, OnDuplicate::from_str(value).ok())?;
            }
            "VERBOSE" => {
                self.verbose = parse_bool(value).ok_or_else(|| {
                    invalid(line, format!("invalid input syntax for type boolean: \"{value}\""))
                })?;
            }
            _ => {
                let accepted = match self.parser.as_mut() {
                    Some(parser) => parser
                        .report_parameter(&line.keyword, value)
                        .map_err(|source| ConfigError::Parser {
                            context: line.clone(),
                            source,
                        })?,
                    None => false,
                };
                if !accepted {
                    return Err(invalid(line, format!("invalid keyword \"{}\"", line.keyword)));
                }
            }
        }

        debug!(line = line.number, keyword = %line.keyword, "Applied control line");
        Ok(())
    }

    pub fn apply_all<'l>(
        &mut self,
        lines: impl IntoIterator<Item = &'l ControlLine>,
    ) -> Result<(), ConfigError> {
        lines.into_iter().try_for_each(|line| self.apply(line))
    }

    /// Checks required keywords, fills in defaults and validates paths.
    pub fn build(self) -> Result<LoadConfiguration, ConfigError> {
        let parser = self.parser.ok_or(ConfigError::Missing("TYPE"))?;
        let table = self.table.ok_or(ConfigError::Missing("TABLE"))?;
        let infile = absolute(&self.infile.ok_or(ConfigError::Missing("INFILE"))?)?;
        parser.validate()?;

        let output_dir = absolute(&self.output_dir)?;
        let defaults = default_paths(&output_dir, self.started_at, &table, &infile);
        let logfile = absolute(&self.logfile.unwrap_or(defaults.logfile))?;
        let parse_badfile = absolute(&self.parse_badfile.unwrap_or(defaults.parse_badfile))?;
        let duplicate_badfile =
            absolute(&self.duplicate_badfile.unwrap_or(defaults.duplicate_badfile))?;

        let paths = [&infile, &logfile, &parse_badfile, &duplicate_badfile];
        for (i, a) in paths.iter().enumerate() {
            if paths[i + 1..].contains(a) {
                return Err(ConfigError::SameFileName);
            }
        }

        Ok(LoadConfiguration {
            table,
            infile,
            logfile,
            parse_badfile,
            duplicate_badfile,
            parser,
            writer: self.writer.unwrap_or_default(),
            parse_errors: self
                .parse_errors
                .unwrap_or(Bound::Count(DEFAULT_ERROR_THRESHOLD)),
            duplicate_errors: self
                .duplicate_errors
                .unwrap_or(Bound::Count(DEFAULT_ERROR_THRESHOLD)),
            limit: self.limit.unwrap_or(Bound::Unbounded),
            on_duplicate: self.on_duplicate,
            verbose: self.verbose,
        })
    }
}

fn absolute(path: &Path) -> Result<PathBuf, ConfigError> {
    std::path::absolute(path).map_err(|source| ConfigError::Path {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads the control file (if any), then `KEY=VALUE` option lines with
/// continuing line numbers, and builds the configuration.
pub fn load_configuration(
    control_file: Option<&Path>,
    options: &[String],
    catalog: &Catalog,
    output_dir: &Path,
    started_at: DateTime<Local>,
) -> Result<LoadConfiguration, ConfigError> {
    let mut builder = ConfigBuilder::new(catalog, output_dir, started_at);

    let mut next_line = 1;
    if let Some(path) = control_file {
        let (lines, count) = control::read_control_file(path)?;
        builder.apply_all(&lines)?;
        next_line += count;
    }
    let lines = control::parse_lines(options.iter().map(String::as_str), next_line)?;
    builder.apply_all(&lines)?;

    builder.build()
}
