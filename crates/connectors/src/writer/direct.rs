use super::{WriteOutcome, Writer, WriterKind, WriterSummary};
use crate::{error::SinkError, table::TableStore};
use async_trait::async_trait;
use model::records::record::Record;
use tracing::debug;

/// Inserts each record immediately; duplicates are known per record.
pub struct DirectWriter {
    store: TableStore,
}

impl DirectWriter {
    pub fn new(store: TableStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Writer for DirectWriter {
    fn kind(&self) -> WriterKind {
        WriterKind::Direct
    }

    async fn insert(&mut self, ordinal: u64, record: Record) -> Result<WriteOutcome, SinkError> {
        let outcome = self.store.insert(ordinal, record.into_values())?;
        Ok(WriteOutcome {
            accepted: outcome.accepted,
            duplicates: outcome.duplicates,
        })
    }

    async fn finish(self: Box<Self>) -> Result<WriterSummary, SinkError> {
        self.store.persist()?;
        Ok(WriterSummary {
            duplicates: Vec::new(),
            table_rows: self.store.len(),
        })
    }

    async fn abort(self: Box<Self>) {
        debug!(loaded = self.store.loaded(), "Direct writer aborted, nothing persisted");
    }
}
