use connectors::error::{CatalogError, ParserError, SinkError};
use engine_config::error::ConfigError;
use expression_engine::ExpressionError;
use model::core::{input::InputError, shape::ShapeMismatch};
use std::path::PathBuf;
use thiserror::Error;

/// Failure while turning one input record into an accepted row.
///
/// Content errors are the record's fault and are absorbed by the reader;
/// everything else stops the load.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("{source}")]
    Coercion {
        field: usize,
        #[source]
        source: InputError,
    },

    #[error("extra data after last expected column")]
    ExtraData { field: usize },

    #[error("{message}")]
    Encoding { field: usize, message: String },

    #[error("null value in column \"{column}\" violates not-null constraint")]
    NotNull { column: String },

    #[error("new row for relation \"{table}\" violates check constraint \"{constraint}\"")]
    Check { table: String, constraint: String },

    #[error("check constraint \"{constraint}\" failed to evaluate: {source}")]
    CheckFailed {
        constraint: String,
        #[source]
        source: ExpressionError,
    },

    /// Raised by the transform function body.
    #[error("{0}")]
    Transform(String),

    #[error("function return row and target table row do not match: {0}")]
    ShapeMismatch(#[from] ShapeMismatch),

    #[error("function return data type and target table data type do not match")]
    ReturnType,

    #[error("canceling load due to user request")]
    Cancelled,
}

impl RecordError {
    /// 1-based field the failure is attributed to, 0 for the whole record,
    /// `None` for structural failures.
    pub fn field(&self) -> Option<usize> {
        match self {
            RecordError::Coercion { field, .. }
            | RecordError::ExtraData { field }
            | RecordError::Encoding { field, .. } => Some(*field),
            RecordError::NotNull { .. }
            | RecordError::Check { .. }
            | RecordError::CheckFailed { .. }
            | RecordError::Transform(_) => Some(0),
            RecordError::ShapeMismatch(_) | RecordError::ReturnType | RecordError::Cancelled => {
                None
            }
        }
    }

    pub fn is_content(&self) -> bool {
        self.field().is_some()
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, RecordError::Cancelled)
    }
}

/// Structural failures: the load stops and the error is returned to the caller.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("{0}")]
    Setup(String),

    #[error(transparent)]
    Parser(#[from] ParserError),

    #[error("Input Record {record}: {source}")]
    Record {
        record: u64,
        #[source]
        source: RecordError,
    },

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("could not write bad record file \"{path}\": {source}")]
    BadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not write log file \"{path}\": {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("canceling load due to user request")]
    Cancelled,
}

impl LoadError {
    pub fn is_cancellation(&self) -> bool {
        match self {
            LoadError::Cancelled => true,
            LoadError::Record { source, .. } => source.is_cancellation(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let coercion = RecordError::Coercion {
            field: 2,
            source: InputError::TooLong("character varying(3)".into()),
        };
        assert_eq!(coercion.field(), Some(2));
        assert!(coercion.is_content());

        let transform = RecordError::Transform("boom".into());
        assert_eq!(transform.field(), Some(0));

        assert!(!RecordError::ReturnType.is_content());
        assert!(!RecordError::Cancelled.is_content());
        assert!(RecordError::Cancelled.is_cancellation());
    }

    #[test]
    fn test_cancelled_record_is_cancellation() {
        let err = LoadError::Record {
            record: 4,
            source: RecordError::Cancelled,
        };
        assert!(err.is_cancellation());
        assert!(!LoadError::Setup("x".into()).is_cancellation());
    }
}
