use crate::control::ControlLine;
use connectors::error::{CatalogError, ParserError};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading the control file or building the load
/// configuration. Errors tied to a control line carry it as context.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("control file name must be absolute path")]
    RelativeControlFile(PathBuf),

    #[error("could not open \"{path}\": {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The line itself could not be split into keyword and value.
    #[error("{message} (line {line})")]
    Syntax { line: usize, message: String },

    /// The keyword or its value was rejected.
    #[error("{message} ({context})")]
    Invalid {
        context: ControlLine,
        message: String,
    },

    #[error("{source} ({context})")]
    Parser {
        context: ControlLine,
        source: ParserError,
    },

    #[error("{source} ({context})")]
    Catalog {
        context: ControlLine,
        source: CatalogError,
    },

    #[error("no {0} specified")]
    Missing(&'static str),

    #[error("invalid parser options: {0}")]
    ParserOptions(#[from] ParserError),

    #[error("could not resolve path \"{path}\": {source}")]
    Path {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("INFILE, PARSE_BADFILE, DUPLICATE_BADFILE and LOGFILE cannot set the same file name.")]
    SameFileName,
}
