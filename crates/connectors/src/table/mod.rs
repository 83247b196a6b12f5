//! File-backed destination table: the rows the writers load into, with one
//! hash index per unique key.

mod store;

pub use store::{InsertOutcome, TableStore};

use model::core::value::Value;

/// How a duplicate row affects the load counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateKind {
    /// The incoming record was turned away before it was counted as loaded.
    Rejected,
    /// A record already counted as loaded by this run was removed again.
    Unloaded,
    /// A row that existed before the load was removed in favour of a new one.
    Replaced,
}

/// A row removed or refused because of a unique key conflict.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateRow {
    pub kind: DuplicateKind,
    /// Input ordinal of the row, or of the record that displaced it when the
    /// row existed before the load.
    pub input_record: u64,
    pub values: Vec<Value>,
    pub message: String,
    pub details: String,
}

impl DuplicateRow {
    /// Text fields for the duplicate-bad file, `None` for nulls.
    pub fn text_fields(&self) -> Vec<Option<String>> {
        self.values.iter().map(Value::to_text).collect()
    }
}
