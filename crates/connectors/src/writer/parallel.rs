use super::{WriteOutcome, Writer, WriterKind, WriterSummary, deferred};
use crate::{error::SinkError, table::TableStore};
use async_trait::async_trait;
use model::records::record::Record;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, warn};

const CHANNEL_CAPACITY: usize = 1024;

/// Runs the table store on a blocking worker fed through a bounded channel.
/// Duplicates are only known once the worker drains, so they are all
/// reported in the final summary.
pub struct ParallelWriter {
    sender: mpsc::Sender<(u64, Record)>,
    worker: JoinHandle<Result<WriterSummary, SinkError>>,
    aborted: Arc<AtomicBool>,
}

impl ParallelWriter {
    pub fn spawn(store: TableStore) -> Self {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let aborted = Arc::new(AtomicBool::new(false));
        let flag = aborted.clone();
        let worker = tokio::task::spawn_blocking(move || run_worker(store, receiver, &flag));
        Self {
            sender,
            worker,
            aborted,
        }
    }
}

fn run_worker(
    mut store: TableStore,
    mut receiver: mpsc::Receiver<(u64, Record)>,
    aborted: &AtomicBool,
) -> Result<WriterSummary, SinkError> {
    let mut duplicates = Vec::new();
    while let Some((ordinal, record)) = receiver.blocking_recv() {
        if aborted.load(Ordering::Acquire) {
            break;
        }
        let outcome = store.insert(ordinal, record.into_values())?;
        duplicates.extend(deferred(outcome.duplicates));
    }
    if aborted.load(Ordering::Acquire) {
        debug!(loaded = store.loaded(), "Parallel writer aborted, nothing persisted");
        return Ok(WriterSummary::default());
    }
    store.persist()?;
    debug!(duplicates = duplicates.len(), "Parallel writer drained");
    Ok(WriterSummary {
        duplicates,
        table_rows: store.len(),
    })
}

#[async_trait]
impl Writer for ParallelWriter {
    fn kind(&self) -> WriterKind {
        WriterKind::Parallel
    }

    async fn insert(&mut self, ordinal: u64, record: Record) -> Result<WriteOutcome, SinkError> {
        self.sender
            .send((ordinal, record))
            .await
            .map_err(|_| SinkError::ChannelClosed)?;
        Ok(WriteOutcome {
            accepted: true,
            duplicates: Vec::new(),
        })
    }

    async fn finish(self: Box<Self>) -> Result<WriterSummary, SinkError> {
        let Self { sender, worker, .. } = *self;
        drop(sender);
        worker
            .await
            .map_err(|e| SinkError::WorkerFailed(e.to_string()))?
    }

    async fn abort(self: Box<Self>) {
        let Self {
            sender,
            worker,
            aborted,
        } = *self;
        aborted.store(true, Ordering::Release);
        drop(sender);
        match worker.await {
            Ok(Err(e)) => warn!(error = %e, "Parallel writer failed while aborting"),
            Err(e) => warn!(error = %e, "Parallel writer task failed while aborting"),
            Ok(Ok(_)) => {}
        }
    }
}
