use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone, Utc};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::domain::{Cents, DEFAULT_WINDOW_DAYS, DailyAggregates, Ledger, Transaction};
use crate::storage::{DEFAULT_STORAGE_KEY, Store};

use super::writer::Writer;
use super::{AppError, LedgerEvent, LedgerSnapshot};

const EVENT_CAPACITY: usize = 64;

/// Settings for a `LedgerService`.
#[derive(Debug, Clone)]
pub struct LedgerOptions {
    /// Key the serialized transaction sequence is stored under.
    pub storage_key: String,
    /// Number of days covered by `trend()` and change snapshots.
    pub trend_window_days: usize,
}

impl Default for LedgerOptions {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            trend_window_days: DEFAULT_WINDOW_DAYS,
        }
    }
}

/// Application service providing high-level operations for the ledger.
/// This is the primary interface for any presentation layer.
///
/// Mutations are applied to memory synchronously; the full transaction
/// sequence is then queued for a background write and a `Changed` event is
/// published. A failed write does not roll back memory: it is reported as a
/// `PersistenceFailed` event and by the next `flush`.
pub struct LedgerService<S: Store> {
    ledger: Ledger,
    options: LedgerOptions,
    store: Arc<S>,
    writer: Writer,
    events: broadcast::Sender<LedgerEvent>,
}

impl<S: Store> LedgerService<S> {
    /// Load the ledger from `store` with default options.
    pub async fn open(store: S) -> Result<Self, AppError> {
        Self::open_with(store, LedgerOptions::default()).await
    }

    /// Load the ledger from `store`.
    ///
    /// A malformed payload yields an empty ledger; only a failure to read
    /// from the store is an error.
    pub async fn open_with(store: S, options: LedgerOptions) -> Result<Self, AppError> {
        let store = Arc::new(store);
        let payload = store.load(&options.storage_key).await?;
        let ledger = Ledger::from_payload(payload.as_deref(), Utc::now());
        info!(
            "Loaded {} transactions from '{}'",
            ledger.len(),
            options.storage_key
        );

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let writer = Writer::spawn(
            Arc::clone(&store),
            options.storage_key.clone(),
            events.clone(),
        );

        Ok(Self {
            ledger,
            options,
            store,
            writer,
            events,
        })
    }

    pub fn options(&self) -> &LedgerOptions {
        &self.options
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Register for change and persistence-failure notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    // ========================
    // Mutations
    // ========================

    /// Record a new income (`is_income`) or expense dated now.
    pub fn add_transaction(
        &mut self,
        amount: Cents,
        category: &str,
        is_income: bool,
    ) -> Result<Transaction, AppError> {
        let transaction = self
            .ledger
            .add(amount, category, is_income, Utc::now())?
            .clone();
        self.commit();
        Ok(transaction)
    }

    /// Delete a transaction by id. Unknown ids are ignored.
    pub fn delete_transaction(&mut self, id: &str) -> Option<Transaction> {
        let removed = self.ledger.delete(id)?;
        self.commit();
        Some(removed)
    }

    /// Delete every transaction. Returns how many were removed.
    pub fn clear_all(&mut self) -> usize {
        let removed = self.ledger.clear();
        self.commit();
        removed
    }

    /// Wait until every queued write has been stored.
    pub async fn flush(&self) -> Result<(), AppError> {
        self.writer.flush().await?;
        Ok(())
    }

    // ========================
    // Queries
    // ========================

    pub fn balance(&self) -> Cents {
        self.ledger.balance()
    }

    pub fn transactions(&self) -> &[Transaction] {
        self.ledger.transactions()
    }

    pub fn get_transaction(&self, id: &str) -> Option<&Transaction> {
        self.ledger.find(id)
    }

    pub fn daily_aggregates<Tz: TimeZone>(
        &self,
        window_days: usize,
        reference: &DateTime<Tz>,
    ) -> DailyAggregates {
        self.ledger.daily_aggregates(window_days, reference)
    }

    /// Daily totals for the configured window ending today (local time).
    pub fn trend(&self) -> DailyAggregates {
        self.daily_aggregates(self.options.trend_window_days, &Local::now())
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            balance: self.balance(),
            transactions: self.transactions().to_vec(),
            trend: self.trend(),
        }
    }

    /// Queue the current sequence for persistence and notify subscribers.
    fn commit(&self) {
        match self.ledger.to_payload() {
            Ok(payload) => {
                if let Err(e) = self.writer.enqueue(payload) {
                    self.report_persistence_failure(e);
                }
            }
            Err(e) => self.report_persistence_failure(e.into()),
        }

        if self.events.receiver_count() > 0 {
            let _ = self
                .events
                .send(LedgerEvent::Changed(Arc::new(self.snapshot())));
        }
    }

    fn report_persistence_failure(&self, err: anyhow::Error) {
        warn!("Could not queue transactions for persistence: {:#}", err);
        let _ = self.events.send(LedgerEvent::PersistenceFailed {
            message: format!("{:#}", err),
        });
    }
}
