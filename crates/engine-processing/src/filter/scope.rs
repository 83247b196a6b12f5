use crate::error::RecordError;
use expression_engine::Session;
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Runs one transform call as an abortable unit of work over the session
/// state. A failed call leaves the session exactly as it was before the
/// call; a successful one keeps its changes.
pub struct IsolatedScope {
    session: Session,
    cancel: CancellationToken,
}

impl IsolatedScope {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            session: Session::new(),
            cancel,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Entering or leaving the scope on a cancelled load is a structural
    /// failure; anything raised inside, panics included, is the record's.
    pub fn run<T>(
        &mut self,
        body: impl FnOnce(&mut Session) -> Result<T, String>,
    ) -> Result<T, RecordError> {
        if self.cancel.is_cancelled() {
            return Err(RecordError::Cancelled);
        }

        let snapshot = self.session.snapshot();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(&mut self.session)))
            .unwrap_or_else(|payload| Err(panic_message(payload)));

        if self.cancel.is_cancelled() {
            self.session.restore(snapshot);
            return Err(RecordError::Cancelled);
        }

        outcome.map_err(|message| {
            debug!(error = %message, "Transform call rolled back");
            self.session.restore(snapshot);
            RecordError::Transform(message)
        })
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "transform function panicked".to_string())
}
