pub mod catalog;
pub mod encoding;
pub mod error;
pub mod parser;
pub mod table;
pub mod writer;
