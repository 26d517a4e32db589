//! A minimal two-phase commit driver.
//!
//! Stands in for the ambient transaction manager: it calls every
//! participant in sort key order and aborts all of them as soon as one
//! fails.

use docjar_core::{CoreError, CoreResult, TransactionId, TransactionParticipant};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Drives two-phase commit over a set of participants.
#[derive(Default)]
pub struct TwoPhaseDriver {
    participants: Vec<Arc<dyn TransactionParticipant>>,
    next_tx: AtomicU64,
}

impl TwoPhaseDriver {
    /// A driver with no participants.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a participant.
    pub fn join(&mut self, participant: Arc<dyn TransactionParticipant>) {
        self.participants.push(participant);
        self.participants.sort_by_key(|p| p.sort_key());
    }

    /// The participants, in call order.
    pub fn participants(&self) -> &[Arc<dyn TransactionParticipant>] {
        &self.participants
    }

    fn next_id(&self) -> TransactionId {
        TransactionId::new(self.next_tx.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Commits the current transaction of every participant.
    ///
    /// On failure every participant is aborted and the first error is
    /// returned; abort failures are logged.
    pub fn commit(&self) -> CoreResult<TransactionId> {
        let tx = self.next_id();
        match self.prepare_and_finish(tx) {
            Ok(()) => {
                debug!(%tx, "transaction committed");
                Ok(tx)
            }
            Err(err) => {
                warn!(%tx, error = %err, "transaction failed, aborting");
                self.abort_all(tx, |p, tx| p.tpc_abort(tx));
                Err(err)
            }
        }
    }

    /// Aborts the current transaction of every participant.
    pub fn abort(&self) -> CoreResult<TransactionId> {
        let tx = self.next_id();
        match self.abort_all(tx, |p, tx| p.abort(tx)) {
            Some(err) => Err(err),
            None => Ok(tx),
        }
    }

    fn prepare_and_finish(&self, tx: TransactionId) -> CoreResult<()> {
        for p in &self.participants {
            p.tpc_begin(tx)?;
        }
        for p in &self.participants {
            p.commit(tx)?;
        }
        for p in &self.participants {
            p.tpc_vote(tx)?;
        }
        for p in &self.participants {
            p.tpc_finish(tx)?;
        }
        Ok(())
    }

    fn abort_all(
        &self,
        tx: TransactionId,
        abort: impl Fn(&dyn TransactionParticipant, TransactionId) -> CoreResult<()>,
    ) -> Option<CoreError> {
        let mut first = None;
        for p in &self.participants {
            if let Err(err) = abort(p.as_ref(), tx) {
                warn!(%tx, error = %err, "participant failed to abort");
                first.get_or_insert(err);
            }
        }
        first
    }
}
