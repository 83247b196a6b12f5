use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("syntax error in expression at line {line}, column {column}: {message}")]
    Syntax {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("function {0} does not exist")]
    UnknownFunction(String),

    #[error("invalid arguments for function {function}: {message}")]
    InvalidFunctionArgs { function: String, message: String },

    #[error("type mismatch: cannot apply {op} to {left} and {right}")]
    TypeMismatch {
        op: String,
        left: String,
        right: String,
    },

    #[error("column \"{0}\" does not exist")]
    UnknownColumn(String),

    #[error("there is no parameter ${0}")]
    MissingParameter(usize),

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer out of range")]
    Overflow,

    #[error("unrecognized configuration parameter \"{0}\"")]
    UnknownSetting(String),

    /// Raised explicitly by `raise(message)`.
    #[error("{0}")]
    Raised(String),
}

impl ExpressionError {
    pub fn invalid_args(function: &str, message: impl Into<String>) -> Self {
        ExpressionError::InvalidFunctionArgs {
            function: function.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExpressionError>;
