//! Sinks for accepted records. All variants load into a [`TableStore`]; they
//! differ in when duplicate conflicts are resolved and reported.

mod buffered;
mod direct;
mod parallel;

pub use buffered::BufferedWriter;
pub use direct::DirectWriter;
pub use parallel::ParallelWriter;

use crate::{
    catalog::TargetTable,
    error::SinkError,
    table::{DuplicateRow, TableStore},
};
use async_trait::async_trait;
use model::{execution::policy::OnDuplicate, records::record::Record};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriterKind {
    #[default]
    Direct,
    Buffered,
    Parallel,
}

impl WriterKind {
    pub const CHOICES: [&'static str; 3] = ["DIRECT", "BUFFERED", "PARALLEL"];

    pub fn from_choice(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "DIRECT" => Some(WriterKind::Direct),
            "BUFFERED" => Some(WriterKind::Buffered),
            "PARALLEL" => Some(WriterKind::Parallel),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WriterKind::Direct => "DIRECT",
            WriterKind::Buffered => "BUFFERED",
            WriterKind::Parallel => "PARALLEL",
        }
    }
}

impl fmt::Display for WriterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the writer knows about a record right after it was handed over.
#[derive(Debug, Default)]
pub struct WriteOutcome {
    /// Whether the record counts as loaded. Deferred writers always accept
    /// and later report [`DuplicateKind::Unloaded`](crate::table::DuplicateKind) rows.
    pub accepted: bool,
    pub duplicates: Vec<DuplicateRow>,
}

/// Duplicates not yet reported and the final table size.
#[derive(Debug, Default)]
pub struct WriterSummary {
    pub duplicates: Vec<DuplicateRow>,
    pub table_rows: usize,
}

#[async_trait]
pub trait Writer: Send {
    fn kind(&self) -> WriterKind;

    /// Hands over the record read as input record `ordinal`.
    async fn insert(&mut self, ordinal: u64, record: Record) -> Result<WriteOutcome, SinkError>;

    /// Resolves whatever is pending and persists the table.
    async fn finish(self: Box<Self>) -> Result<WriterSummary, SinkError>;

    /// Drops pending work without persisting anything.
    async fn abort(self: Box<Self>);
}

/// Opens the destination table and wraps it in the requested writer.
pub fn create_writer(
    kind: WriterKind,
    table: &TargetTable,
    on_duplicate: OnDuplicate,
) -> Result<Box<dyn Writer>, SinkError> {
    let store = TableStore::open(table, on_duplicate)?;
    let writer: Box<dyn Writer> = match kind {
        WriterKind::Direct => Box::new(DirectWriter::new(store)),
        WriterKind::Buffered => Box::new(BufferedWriter::new(store)),
        WriterKind::Parallel => Box::new(ParallelWriter::spawn(store)),
    };
    Ok(writer)
}

/// Rejections found after the record was acknowledged turn into removals.
pub(crate) fn deferred(mut duplicates: Vec<DuplicateRow>) -> Vec<DuplicateRow> {
    use crate::table::DuplicateKind;

    for dup in &mut duplicates {
        if dup.kind == DuplicateKind::Rejected {
            dup.kind = DuplicateKind::Unloaded;
        }
    }
    duplicates
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_choices() {
        assert_eq!(WriterKind::from_choice("parallel"), Some(WriterKind::Parallel));
        assert_eq!(WriterKind::from_choice("bulk"), None);
        assert_eq!(WriterKind::default().to_string(), "DIRECT");
    }

    #[tokio::test]
    async fn test_create_writer_reads_table() {
        let (_dir, table) = test_support::table("1,a\n");
        let mut writer = create_writer(WriterKind::Direct, &table, OnDuplicate::Error).unwrap();
        assert_eq!(writer.kind(), WriterKind::Direct);
        let outcome = writer.insert(1, test_support::record(1, "b")).await.unwrap();
        assert!(!outcome.accepted);
        writer.abort().await;
    }
}
