//! The load loop: read, form, transform, check and write each record,
//! absorbing per-record failures up to the configured thresholds.

pub mod bad_file;

use crate::{
    checker::Checker,
    error::{LoadError, RecordError},
    filter::{Filter, TransformRegistry},
    former::TupleFormer,
    report::LoadLog,
};
use bad_file::{BadRecordSink, csv_line};
use chrono::Local;
use connectors::{
    encoding::CharEncoding,
    error::ParserError,
    parser::Parser,
    table::{DuplicateKind, DuplicateRow},
    writer::{Writer, create_writer},
};
use engine_config::settings::LoadConfiguration;
use model::{
    execution::{
        rejected::RejectedRecord,
        report::{ErrorCategory, LoadResult, ThresholdBreach},
    },
    records::{field_set::FieldSet, record::Record},
};
use std::{io::Write, path::Path, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct Reader {
    config: LoadConfiguration,
    parser: Box<dyn Parser>,
    former: TupleFormer,
    filter: Option<Filter>,
    checker: Checker,
    writer: Option<Box<dyn Writer>>,
    parse_bad: BadRecordSink,
    duplicate_bad: BadRecordSink,
    log: LoadLog,
    cancel: CancellationToken,
    result: LoadResult,
}

impl Reader {
    /// Resolves the filter, opens the input, the writer and the load log.
    pub fn open(
        config: LoadConfiguration,
        registry: &TransformRegistry,
        cancel: CancellationToken,
    ) -> Result<Self, LoadError> {
        let started_at = Local::now();
        let table = &config.table;
        let common = &config.parser.common;

        let source_encoding = common
            .encoding
            .as_deref()
            .map(|label| {
                CharEncoding::from_label(label)
                    .ok_or_else(|| LoadError::Setup(format!("invalid encoding name \"{label}\"")))
            })
            .transpose()?;
        let checker = Checker::new(table, source_encoding, common.check_constraints);

        let filter = common
            .filter
            .as_deref()
            .map(|spec| {
                let function = registry.lookup(spec)?.clone();
                Filter::new(function, table.shape.clone(), cancel.clone())
            })
            .transpose()?;

        let former = match &filter {
            Some(filter) => TupleFormer::new(filter.param_shape(), &table.shape),
            None => TupleFormer::new(&table.shape, &table.shape),
        }
        .map_err(LoadError::Setup)?;

        let mut log = LoadLog::create(&config.logfile, config.verbose)?;
        log.banner(started_at)?;
        log.params(&dump_params(&config))?;
        log.flush()?;

        let parser = config.parser.open(&config.infile)?;
        let writer = create_writer(config.writer, table, config.on_duplicate)?;

        info!(
            table = %table.qualified_name(),
            input = %config.infile.display(),
            parser = config.parser.kind.name(),
            writer = %config.writer,
            filter = common.filter.as_deref().unwrap_or("-"),
            "Load prepared"
        );

        Ok(Self {
            parse_bad: BadRecordSink::new(&config.parse_badfile),
            duplicate_bad: BadRecordSink::new(&config.duplicate_badfile),
            config,
            parser,
            former,
            filter,
            checker,
            writer: Some(writer),
            log,
            cancel,
            result: LoadResult::default(),
        })
    }

    pub fn dump_params(&self) -> Vec<String> {
        dump_params(&self.config)
    }

    /// Runs the load to the end of input, the record limit or a threshold
    /// breach. Structural failures abort the writer and are returned.
    pub async fn run(mut self) -> Result<LoadResult, LoadError> {
        let clock = Instant::now();

        let mut outcome = self.read_records().await;
        if outcome.is_ok() {
            outcome = self.finish_writer().await;
        }
        self.result.records_skipped = self.parser.finalize();

        if let Err(err) = outcome {
            if let Some(writer) = self.writer.take() {
                writer.abort().await;
            }
            error!(error = %err, "Load failed");
            for closed in [self.parse_bad.close(), self.duplicate_bad.close()] {
                if let Err(close_err) = closed {
                    warn!(error = %close_err, "Could not close bad record file");
                }
            }
            if let Err(log_err) = self.log.failure(&err).and_then(|_| self.log.flush()) {
                warn!(error = %log_err, "Could not write load log");
            }
            return Err(err);
        }

        self.parse_bad.close()?;
        self.duplicate_bad.close()?;
        self.log.summary(&self.result, clock.elapsed())?;

        info!(
            loaded = self.result.records_loaded,
            skipped = self.result.records_skipped,
            parse_errors = self.result.parse_errors,
            duplicate_errors = self.result.duplicate_errors,
            replaced = self.result.records_replaced,
            breached = self.result.is_breached(),
            "Load finished"
        );
        Ok(self.result)
    }

    async fn read_records(&mut self) -> Result<(), LoadError> {
        while !self.config.limit.is_reached_by(self.result.records_loaded) {
            if self.cancel.is_cancelled() {
                return Err(LoadError::Cancelled);
            }

            let fields = match self.parser.read() {
                Ok(Some(fields)) => fields,
                Ok(None) => break,
                Err(err) => match self.parser.current_field() {
                    Some(field) if is_content_error(&err) => {
                        self.reject_parse(field, err.to_string())?;
                        if self.result.is_breached() {
                            break;
                        }
                        continue;
                    }
                    _ => return Err(err.into()),
                },
            };

            let ordinal = self.parser.record_ordinal();
            match self.process(&fields) {
                Ok(record) => self.write(ordinal, record).await?,
                Err(err) if err.is_content() => {
                    self.reject_parse(err.field().unwrap_or(0), err.to_string())?
                }
                Err(source) => {
                    return Err(LoadError::Record {
                        record: ordinal,
                        source,
                    });
                }
            }

            if self.result.is_breached() {
                break;
            }
        }
        Ok(())
    }

    fn process(&mut self, fields: &FieldSet) -> Result<Record, RecordError> {
        let record = self.former.form(fields, &self.checker)?;
        let record = match self.filter.as_mut() {
            Some(filter) => filter
                .invoke(record)?
                .unwrap_or_else(|| self.former.form_all_null()),
            None => record,
        };
        self.checker.check_constraints(&record)?;
        Ok(record)
    }

    async fn write(&mut self, ordinal: u64, record: Record) -> Result<(), LoadError> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(LoadError::Setup("writer is already closed".to_string()));
        };
        let outcome = writer.insert(ordinal, record).await?;
        if outcome.accepted {
            self.result.records_loaded += 1;
        }
        self.account_duplicates(outcome.duplicates)
    }

    async fn finish_writer(&mut self) -> Result<(), LoadError> {
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };
        let summary = writer.finish().await?;
        debug!(rows = summary.table_rows, "Writer finished");
        self.account_duplicates(summary.duplicates)
    }

    fn reject_parse(&mut self, field: usize, message: String) -> Result<(), LoadError> {
        self.result.parse_errors += 1;
        let rejected = RejectedRecord::new(
            ErrorCategory::Parse,
            self.result.parse_errors,
            self.parser.record_ordinal(),
            message,
        )
        .with_column(field);

        let parser = &mut self.parser;
        self.parse_bad.write_entry(
            |sink, path| parser.dump_rejected_record(sink, path),
            &rejected.cause_line(),
        )?;
        self.log.rejection(&rejected)?;

        if self.config.parse_errors.is_exceeded_by(self.result.parse_errors) {
            self.breach(ErrorCategory::Parse, self.result.parse_errors)?;
        }
        Ok(())
    }

    /// Counts and records duplicates reported by the writer.
    fn account_duplicates(&mut self, duplicates: Vec<DuplicateRow>) -> Result<(), LoadError> {
        for duplicate in duplicates {
            match duplicate.kind {
                DuplicateKind::Rejected => {}
                DuplicateKind::Unloaded => {
                    self.result.records_loaded = self.result.records_loaded.saturating_sub(1)
                }
                DuplicateKind::Replaced => self.result.records_replaced += 1,
            }
            self.result.duplicate_errors += 1;

            let rejected = RejectedRecord::new(
                ErrorCategory::Duplicate,
                self.result.duplicate_errors,
                duplicate.input_record,
                duplicate.message.clone(),
            )
            .with_details(duplicate.details.clone());

            let bytes = duplicate_line(
                &duplicate,
                self.config.table.encoding,
                self.duplicate_bad.path(),
            )?;
            self.duplicate_bad.write_entry(
                |sink, _| {
                    sink.write_all(&bytes)?;
                    sink.write_all(b"\n")
                },
                &rejected.cause_line(),
            )?;
            self.log.rejection(&rejected)?;

            if self
                .config
                .duplicate_errors
                .is_exceeded_by(self.result.duplicate_errors)
            {
                self.breach(ErrorCategory::Duplicate, self.result.duplicate_errors)?;
            }
        }
        Ok(())
    }

    /// Records the first breach only; later reports keep counting.
    fn breach(&mut self, category: ErrorCategory, observed: u64) -> Result<(), LoadError> {
        if self.result.breach.is_some() {
            return Ok(());
        }
        let breach = ThresholdBreach { category, observed };
        self.log.threshold(&breach, &self.config.infile)?;
        self.result.breach = Some(breach);
        Ok(())
    }
}

/// The duplicate row as a CSV line in the destination encoding.
fn duplicate_line(
    duplicate: &DuplicateRow,
    encoding: CharEncoding,
    path: &Path,
) -> Result<Vec<u8>, LoadError> {
    let bad_file = |source| LoadError::BadFile {
        path: path.to_path_buf(),
        source,
    };
    let line = csv_line(&duplicate.text_fields()).map_err(|e| bad_file(std::io::Error::other(e)))?;
    encoding.encode(&line).map_err(|c| {
        bad_file(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "character '{c}' has no equivalent in encoding \"{}\"",
                encoding.name()
            ),
        ))
    })
}

/// Parser failures that describe the record rather than the input stream.
fn is_content_error(err: &ParserError) -> bool {
    match err {
        ParserError::Malformed(_) => true,
        ParserError::Csv(e) => !e.is_io_error(),
        _ => false,
    }
}

/// Resolved configuration as `KEY = VALUE` lines, paths quoted.
pub fn dump_params(config: &LoadConfiguration) -> Vec<String> {
    let path = |p: &Path| format!("\"{}\"", p.display());
    let mut lines = vec![
        format!("INFILE = {}", path(&config.infile)),
        format!("PARSE_BADFILE = {}", path(&config.parse_badfile)),
        format!("DUPLICATE_BADFILE = {}", path(&config.duplicate_badfile)),
        format!("LOGFILE = {}", path(&config.logfile)),
        format!("TABLE = {}", config.table.qualified_name()),
        format!("WRITER = {}", config.writer),
        format!("PARSE_ERRORS = {}", config.parse_errors),
        format!("DUPLICATE_ERRORS = {}", config.duplicate_errors),
        format!("ON_DUPLICATE = {}", config.on_duplicate),
        format!("VERBOSE = {}", if config.verbose { "YES" } else { "NO" }),
        format!("LOAD = {}", config.limit),
    ];
    lines.extend(
        config
            .parser
            .dump_params()
            .into_iter()
            .map(|(key, value)| format!("{key} = {}", quote_value(&value))),
    );
    lines
}

fn quote_value(value: &str) -> String {
    if value.is_empty() || value.contains(|c: char| c.is_whitespace() || "#=\"".contains(c)) {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use connectors::catalog::Catalog;
    use engine_config::settings::load_configuration;
    use model::core::value::Value;
    use std::fs;
    use tempfile::TempDir;

    const CATALOG: &str = r#"{
        "database": "shop",
        "tables": [{
            "name": "items",
            "data_file": "items.csv",
            "columns": [
                {"name": "id", "type": "integer", "not_null": true},
                {"name": "label", "type": "varchar(8)"}
            ],
            "unique": [["id"]]
        }]
    }"#;

    struct Fixture {
        dir: TempDir,
        catalog: Catalog,
    }

    impl Fixture {
        fn new(input: &str) -> Self {
            let dir = TempDir::new().unwrap();
            fs::write(dir.path().join("catalog.json"), CATALOG).unwrap();
            fs::write(dir.path().join("in.csv"), input).unwrap();
            let catalog = Catalog::load(&dir.path().join("catalog.json")).unwrap();
            Self { dir, catalog }
        }

        fn config(&self, extra: &[&str]) -> LoadConfiguration {
            let mut options = vec![
                "TYPE = CSV".to_string(),
                "TABLE = items".to_string(),
                format!("INFILE = {}", self.dir.path().join("in.csv").display()),
            ];
            options.extend(extra.iter().map(|s| s.to_string()));
            load_configuration(
                None,
                &options,
                &self.catalog,
                self.dir.path(),
                Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            )
            .unwrap()
        }

        fn path(&self, name: &str) -> String {
            self.dir.path().join(name).display().to_string()
        }

        fn read(&self, name: &str) -> String {
            fs::read_to_string(self.dir.path().join(name)).unwrap_or_default()
        }
    }

    #[test]
    fn test_dump_params() {
        let fixture = Fixture::new("");
        let config = fixture.config(&["PARSE_ERRORS = INFINITE", "LIMIT = 10"]);
        let lines = dump_params(&config);
        assert!(lines[0].starts_with("INFILE = \""));
        assert_eq!(lines[4], "TABLE = public.items");
        assert!(lines.contains(&"PARSE_ERRORS = INFINITE".to_string()));
        assert!(lines.contains(&"DUPLICATE_ERRORS = 50".to_string()));
        assert!(lines.contains(&"LOAD = 10".to_string()));
        assert!(lines.contains(&"TYPE = CSV".to_string()));
        assert!(lines.contains(&"NULL = \"\"".to_string()));
    }

    #[tokio::test]
    async fn test_run_loads_and_rejects() {
        let fixture = Fixture::new("1,bolt\nx,nut\n2,washer\n,gear\n");
        let config = fixture.config(&[
            format!("LOGFILE = {}", fixture.path("load.log")).as_str(),
            format!("PARSE_BADFILE = {}", fixture.path("parse.bad")).as_str(),
        ]);
        let reader = Reader::open(config, &TransformRegistry::new(), CancellationToken::new())
            .unwrap();
        let result = reader.run().await.unwrap();

        assert_eq!(result.records_loaded, 2);
        assert_eq!(result.parse_errors, 2);
        assert!(!result.is_breached());
        assert_eq!(fixture.read("items.csv"), "1,bolt\n2,washer\n");

        let bad = fixture.read("parse.bad");
        assert!(bad.starts_with("x,nut\n# Parse error Record 1: Input Record 2: Rejected - column 1."));
        assert!(bad.contains(
            ",gear\n# Parse error Record 2: Input Record 4: Rejected. null value in column \"id\" violates not-null constraint"
        ));
        let log = fixture.read("load.log");
        assert!(log.contains("2 Rows successfully loaded."));
    }

    #[tokio::test]
    async fn test_limit_stops_reading() {
        let fixture = Fixture::new("1,a\n2,b\n3,c\n");
        let config = fixture.config(&["LOAD = 2"]);
        let reader = Reader::open(config, &TransformRegistry::new(), CancellationToken::new())
            .unwrap();
        let result = reader.run().await.unwrap();
        assert_eq!(result.records_loaded, 2);
        assert_eq!(fixture.read("items.csv"), "1,a\n2,b\n");
    }

    #[tokio::test]
    async fn test_cancelled_load_persists_nothing() {
        let fixture = Fixture::new("1,a\n2,b\n");
        let config = fixture.config(&[]);
        let cancel = CancellationToken::new();
        let reader = Reader::open(config, &TransformRegistry::new(), cancel.clone()).unwrap();
        cancel.cancel();
        let err = reader.run().await.unwrap_err();
        assert!(err.is_cancellation());
        assert!(!fixture.dir.path().join("items.csv").exists());
    }

    /// Yields one good record, then fails while between records.
    struct BrokenStream {
        reads: u64,
    }

    impl Parser for BrokenStream {
        fn read(&mut self) -> Result<Option<FieldSet>, ParserError> {
            self.reads += 1;
            if self.reads == 1 {
                return Ok(Some(FieldSet::from(vec![Some("1"), Some("bolt")])));
            }
            Err(ParserError::Io(std::io::Error::other("device went away")))
        }

        fn current_field(&self) -> Option<usize> {
            None
        }

        fn record_ordinal(&self) -> u64 {
            self.reads
        }

        fn dump_rejected_record(&mut self, _: &mut dyn Write, _: &Path) -> std::io::Result<()> {
            Ok(())
        }

        fn finalize(&mut self) -> u64 {
            0
        }
    }

    #[tokio::test]
    async fn test_stream_failure_is_not_a_parse_error() {
        let fixture = Fixture::new("");
        let config = fixture.config(&[
            "PARSE_ERRORS = INFINITE",
            format!("PARSE_BADFILE = {}", fixture.path("parse.bad")).as_str(),
        ]);
        let mut reader = Reader::open(config, &TransformRegistry::new(), CancellationToken::new())
            .unwrap();
        reader.parser = Box::new(BrokenStream { reads: 0 });

        let err = reader.read_records().await.unwrap_err();
        assert!(matches!(err, LoadError::Parser(ParserError::Io(_))));
        assert_eq!(reader.result.records_loaded, 1);
        assert_eq!(reader.result.parse_errors, 0);
        assert_eq!(reader.parse_bad.entries(), 0);
        assert!(!reader.parse_bad.is_open());
    }

    #[tokio::test]
    async fn test_stream_failure_aborts_the_load() {
        let fixture = Fixture::new("");
        let config = fixture.config(&[
            format!("LOGFILE = {}", fixture.path("load.log")).as_str(),
            format!("PARSE_BADFILE = {}", fixture.path("parse.bad")).as_str(),
        ]);
        let mut reader = Reader::open(config, &TransformRegistry::new(), CancellationToken::new())
            .unwrap();
        reader.parser = Box::new(BrokenStream { reads: 0 });

        let err = reader.run().await.unwrap_err();
        assert!(err.to_string().contains("device went away"));
        assert!(!fixture.dir.path().join("parse.bad").exists());
        assert!(!fixture.dir.path().join("items.csv").exists());
    }

    #[test]
    fn test_unencodable_duplicate_is_a_bad_file_error() {
        let latin1 = CharEncoding::from_label("LATIN1").unwrap();
        let duplicate = DuplicateRow {
            kind: DuplicateKind::Rejected,
            input_record: 3,
            values: vec![Value::Int(7), Value::String("日本".into())],
            message: "duplicate key".into(),
            details: String::new(),
        };
        let err = duplicate_line(&duplicate, latin1, Path::new("dup.bad")).unwrap_err();
        assert!(matches!(err, LoadError::BadFile { .. }));
        assert!(err.to_string().contains("dup.bad"));

        let fits = DuplicateRow {
            values: vec![Value::Int(7), Value::String("café".into())],
            ..duplicate
        };
        assert_eq!(
            duplicate_line(&fits, latin1, Path::new("dup.bad")).unwrap(),
            b"7,caf\xe9".to_vec()
        );
    }

    #[tokio::test]
    async fn test_unknown_filter_is_setup_error() {
        let fixture = Fixture::new("1,a\n");
        let config = fixture.config(&["FILTER = nope"]);
        let err = Reader::open(config, &TransformRegistry::new(), CancellationToken::new())
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "function nope does not exist");
    }
}
