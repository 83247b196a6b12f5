pub mod types;

pub use types::infer_expression_type;
