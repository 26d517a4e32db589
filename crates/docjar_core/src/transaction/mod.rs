//! Transaction coordination.
//!
//! A [`Coordinator`] tracks the objects touched in the current
//! transaction and takes part in two-phase commit through the
//! [`TransactionParticipant`] trait. The driver calls:
//!
//! - `tpc_begin`, then `commit` and `tpc_vote` on every participant,
//!   then `tpc_finish` when all of them voted yes
//! - `tpc_abort` on every participant as soon as one of them fails
//!
//! Participants are called in [`TransactionParticipant::sort_key`] order.

mod coordinator;
mod state;

pub use coordinator::{Coordinator, CoordinatorBuilder, JoinHook, WeakCoordinator, SORT_KEY_NAME};

use crate::error::CoreResult;
use crate::types::{SortKey, TransactionId};

/// A resource taking part in two-phase commit.
pub trait TransactionParticipant: Send + Sync {
    /// Starts the commit protocol.
    ///
    /// # Errors
    ///
    /// Returns an error if the participant cannot take part.
    fn tpc_begin(&self, tx: TransactionId) -> CoreResult<()>;

    /// Validates pending work without writing it.
    ///
    /// # Errors
    ///
    /// Returns an error, typically a conflict, if the transaction must
    /// not commit.
    fn commit(&self, tx: TransactionId) -> CoreResult<()>;

    /// Last chance to refuse the commit.
    ///
    /// # Errors
    ///
    /// Returns an error if the participant votes no.
    fn tpc_vote(&self, tx: TransactionId) -> CoreResult<()>;

    /// Makes pending work durable and ends the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn tpc_finish(&self, tx: TransactionId) -> CoreResult<()>;

    /// Undoes the transaction outside the commit protocol.
    ///
    /// # Errors
    ///
    /// Returns the first failure hit while undoing.
    fn abort(&self, tx: TransactionId) -> CoreResult<()>;

    /// Undoes the transaction during the commit protocol.
    ///
    /// # Errors
    ///
    /// Returns the first failure hit while undoing.
    fn tpc_abort(&self, tx: TransactionId) -> CoreResult<()>;

    /// Orders this participant relative to the others.
    fn sort_key(&self) -> SortKey;
}
