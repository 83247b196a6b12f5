use super::{WriteOutcome, Writer, WriterKind, WriterSummary, deferred};
use crate::{
    error::SinkError,
    table::{DuplicateRow, TableStore},
};
use async_trait::async_trait;
use model::records::record::Record;
use tracing::debug;

const BATCH_SIZE: usize = 1000;

/// Collects records and inserts them a batch at a time. Duplicates found
/// while flushing are reported with the insert that triggered the flush.
pub struct BufferedWriter {
    store: TableStore,
    buffer: Vec<(u64, Record)>,
    batch_size: usize,
}

impl BufferedWriter {
    pub fn new(store: TableStore) -> Self {
        Self::with_batch_size(store, BATCH_SIZE)
    }

    pub fn with_batch_size(store: TableStore, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            store,
            buffer: Vec::with_capacity(batch_size),
            batch_size,
        }
    }

    fn flush(&mut self) -> Result<Vec<DuplicateRow>, SinkError> {
        let mut duplicates = Vec::new();
        let batch = std::mem::take(&mut self.buffer);
        debug!(records = batch.len(), "Flushing buffered batch");
        for (ordinal, record) in batch {
            let outcome = self.store.insert(ordinal, record.into_values())?;
            duplicates.extend(deferred(outcome.duplicates));
        }
        Ok(duplicates)
    }
}

#[async_trait]
impl Writer for BufferedWriter {
    fn kind(&self) -> WriterKind {
        WriterKind::Buffered
    }

    async fn insert(&mut self, ordinal: u64, record: Record) -> Result<WriteOutcome, SinkError> {
        self.buffer.push((ordinal, record));
        let duplicates = if self.buffer.len() >= self.batch_size {
            self.flush()?
        } else {
            Vec::new()
        };
        Ok(WriteOutcome {
            accepted: true,
            duplicates,
        })
    }

    async fn finish(mut self: Box<Self>) -> Result<WriterSummary, SinkError> {
        let duplicates = self.flush()?;
        self.store.persist()?;
        Ok(WriterSummary {
            duplicates,
            table_rows: self.store.len(),
        })
    }

    async fn abort(self: Box<Self>) {
        debug!(pending = self.buffer.len(), "Buffered writer aborted");
    }
}
