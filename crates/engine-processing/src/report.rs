//! Operator-facing load log.

use crate::error::LoadError;
use chrono::{DateTime, Local};
use model::execution::{
    rejected::RejectedRecord,
    report::{LoadResult, ThresholdBreach},
};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, warn};

pub struct LoadLog {
    path: PathBuf,
    out: BufWriter<File>,
    verbose: bool,
}

impl LoadLog {
    pub fn create(path: &Path, verbose: bool) -> Result<Self, LoadError> {
        let file = File::create(path).map_err(|source| LoadError::LogFile {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
            verbose,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn banner(&mut self, started_at: DateTime<Local>) -> Result<(), LoadError> {
        self.line(&format!(
            "bulkload {} on {}",
            env!("CARGO_PKG_VERSION"),
            started_at.format("%Y-%m-%d %H:%M:%S")
        ))?;
        self.line("")
    }

    pub fn params(&mut self, params: &[String]) -> Result<(), LoadError> {
        for param in params {
            self.line(param)?;
        }
        self.line("")
    }

    /// Logs a rejected record; also traced at `warn` in verbose mode.
    pub fn rejection(&mut self, rejected: &RejectedRecord) -> Result<(), LoadError> {
        if self.verbose {
            warn!(
                category = %rejected.category,
                record = rejected.input_record,
                column = ?rejected.column,
                "{}",
                rejected.message
            );
        } else {
            debug!(
                category = %rejected.category,
                record = rejected.input_record,
                column = ?rejected.column,
                "{}",
                rejected.message
            );
        }
        self.line(&rejected.log_line())?;
        if let Some(details) = &rejected.details {
            self.line(&format!("DETAIL: {details}"))?;
        }
        Ok(())
    }

    pub fn threshold(&mut self, breach: &ThresholdBreach, source: &Path) -> Result<(), LoadError> {
        warn!(category = %breach.category, observed = breach.observed, "Error threshold exceeded");
        self.line("")?;
        self.line(&format!("{breach} in {}", source.display()))
    }

    pub fn failure(&mut self, err: &LoadError) -> Result<(), LoadError> {
        self.line("")?;
        self.line(&format!("ERROR: {err}"))
    }

    pub fn summary(&mut self, result: &LoadResult, elapsed: Duration) -> Result<(), LoadError> {
        self.line("")?;
        for line in result.summary_lines() {
            self.line(&format!("  {line}"))?;
        }
        self.line("")?;
        self.line(&format!("Run ended in {:.3} sec", elapsed.as_secs_f64()))?;
        self.flush()
    }

    pub fn flush(&mut self) -> Result<(), LoadError> {
        self.out.flush().map_err(|source| LoadError::LogFile {
            path: self.path.clone(),
            source,
        })
    }

    fn line(&mut self, text: &str) -> Result<(), LoadError> {
        writeln!(self.out, "{text}").map_err(|source| LoadError::LogFile {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use model::execution::report::ErrorCategory;
    use std::fs;
    use tempfile::TempDir;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_log_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("load.log");
        let mut log = LoadLog::create(&path, true).unwrap();

        log.banner(Local.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap())
            .unwrap();
        log.params(&["TABLE = public.items".to_string()]).unwrap();
        let rejected = RejectedRecord::new(ErrorCategory::Parse, 1, 3, "bad value").with_column(2);
        log.rejection(&rejected).unwrap();
        let breach = ThresholdBreach {
            category: ErrorCategory::Parse,
            observed: 1,
        };
        log.threshold(&breach, Path::new("/data/in.csv")).unwrap();
        let result = LoadResult {
            records_loaded: 4,
            parse_errors: 1,
            breach: Some(breach),
            ..Default::default()
        };
        log.summary(&result, Duration::from_millis(1500)).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("on 2024-05-01 08:30:00"));
        assert!(text.contains("TABLE = public.items\n"));
        assert!(text.contains("Parse error Record 1: Input Record 3: Rejected - column 2. bad value"));
        assert!(text.contains(
            "Maximum parse error count exceeded - 1 error(s) found in /data/in.csv"
        ));
        assert!(text.contains("  4 Rows successfully loaded."));
        assert!(text.contains("Run ended in 1.500 sec"));
        assert!(logs_contain("bad value"));
    }
}
