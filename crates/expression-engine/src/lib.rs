pub mod context;
pub mod error;
pub mod eval;
pub mod functions;
pub mod inference;
pub mod parser;
pub mod session;

pub use context::EvalContext;
pub use error::{ExpressionError, Result};
pub use eval::Evaluator;
pub use functions::FunctionRegistry;
pub use inference::{infer_expression_type, types::TypeScope};
pub use parser::parse_expression;
pub use session::Session;
