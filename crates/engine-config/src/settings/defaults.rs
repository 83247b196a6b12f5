use chrono::{DateTime, Local};
use connectors::catalog::TargetTable;
use std::path::{Path, PathBuf};

/// Threshold used when `PARSE_ERRORS` or `DUPLICATE_ERRORS` is absent.
pub const DEFAULT_ERROR_THRESHOLD: u64 = 50;

/// Output paths filled in when the control file leaves them out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultPaths {
    pub logfile: PathBuf,
    pub parse_badfile: PathBuf,
    pub duplicate_badfile: PathBuf,
}

/// `<dir>/<YYYYMMDDHHMMSS>_<database>_<schema>_<table>.<suffix>`; the parse
/// bad file keeps the extension of the input file.
pub fn default_paths(
    output_dir: &Path,
    started_at: DateTime<Local>,
    table: &TargetTable,
    infile: &Path,
) -> DefaultPaths {
    let stem = format!(
        "{}_{}_{}_{}.",
        started_at.format("%Y%m%d%H%M%S"),
        table.database,
        table.schema,
        table.name
    );
    let extension = infile
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();

    DefaultPaths {
        logfile: output_dir.join(format!("{stem}log")),
        parse_badfile: output_dir.join(format!("{stem}prs.{extension}")),
        duplicate_badfile: output_dir.join(format!("{stem}dup.csv")),
    }
}
