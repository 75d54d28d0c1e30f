use std::sync::Arc;

use serde::Serialize;

use crate::domain::{Cents, DailyAggregates, Transaction};

/// Everything a presentation layer needs to render the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerSnapshot {
    pub balance: Cents,
    pub transactions: Vec<Transaction>,
    pub trend: DailyAggregates,
}

/// Notifications published to subscribers of a `LedgerService`.
#[derive(Debug, Clone)]
pub enum LedgerEvent {
    /// The transaction sequence changed; carries the state after the change.
    Changed(Arc<LedgerSnapshot>),
    /// A background write failed. The in-memory ledger is unaffected.
    PersistenceFailed { message: String },
}
