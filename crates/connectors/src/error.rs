use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("could not open input file \"{path}\": {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not read input file: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV reader error: {0}")]
    Csv(#[from] csv::Error),

    /// The raw record itself is unusable. Attributed to the field the
    /// parser reports as current.
    #[error("{0}")]
    Malformed(String),

    #[error("invalid {key} \"{value}\": {reason}")]
    InvalidParam {
        key: String,
        value: String,
        reason: String,
    },

    #[error("{0}")]
    Setup(String),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("could not open data file \"{path}\": {source}")]
    DataFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("I/O error in table store: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error in table store: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid row in data file \"{path}\" line {line}: {message}")]
    InvalidStoredRow {
        path: PathBuf,
        line: u64,
        message: String,
    },

    #[error("character not representable in destination encoding {0}")]
    Unrepresentable(String),

    #[error("row has {actual} values, table expects {expected}")]
    Arity { expected: usize, actual: usize },

    #[error("writer task failed: {0}")]
    WorkerFailed(String),

    #[error("writer channel closed")]
    ChannelClosed,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read catalog \"{path}\": {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid catalog \"{path}\": {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("relation \"{0}\" does not exist")]
    UnknownTable(String),

    #[error("type \"{0}\" does not exist")]
    UnknownType(String),

    #[error("invalid type \"{type_name}\" for column \"{column}\": {reason}")]
    InvalidType {
        column: String,
        type_name: String,
        reason: String,
    },

    #[error("column \"{column}\" named in {context} of \"{table}\" does not exist")]
    UnknownColumn {
        table: String,
        column: String,
        context: String,
    },

    #[error("invalid check constraint \"{name}\": {source}")]
    InvalidCheck {
        name: String,
        source: expression_engine::ExpressionError,
    },

    #[error("encoding \"{0}\" is not supported")]
    UnknownEncoding(String),
}
