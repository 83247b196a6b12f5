pub mod checker;
pub mod error;
pub mod filter;
pub mod former;
pub mod reader;
pub mod report;
