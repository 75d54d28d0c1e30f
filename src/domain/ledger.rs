use chrono::{DateTime, SubsecRound, TimeZone, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{
    Cents, DailyAggregates, IdGenerator, MAX_AMOUNT, Transaction, TransactionId,
    compute_daily_aggregates, parse_cents, parse_timestamp,
};

/// Compute the balance from a list of transactions.
/// Balance = sum of income amounts - sum of expense amounts
///
/// Saturates at the `Cents` bounds instead of overflowing; a `Ledger` never
/// holds transactions whose totals get that far.
pub fn compute_balance(transactions: &[Transaction]) -> Cents {
    transactions.iter().fold(0, |balance: Cents, transaction| {
        balance.saturating_add(transaction.signed_amount())
    })
}

/// Parse user-entered text into a positive amount of cents.
pub fn parse_amount(input: &str) -> Result<Cents, LedgerError> {
    let cents = parse_cents(input)
        .map_err(|e| LedgerError::Validation(format!("amount '{}': {}", input.trim(), e)))?;
    check_amount(cents)?;
    Ok(cents)
}

fn check_amount(amount: Cents) -> Result<(), LedgerError> {
    if amount <= 0 {
        return Err(LedgerError::Validation(
            "amount must be positive".to_string(),
        ));
    }
    if amount > MAX_AMOUNT {
        return Err(LedgerError::Validation(format!(
            "amount must not exceed {} cents",
            MAX_AMOUNT
        )));
    }
    Ok(())
}

/// Income and expense sums, each kept within `Cents`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Totals {
    income: Cents,
    expense: Cents,
}

impl Totals {
    /// The totals after recording `amount`, or `None` on overflow.
    fn with(self, amount: Cents, is_income: bool) -> Option<Self> {
        if is_income {
            Some(Self {
                income: self.income.checked_add(amount)?,
                ..self
            })
        } else {
            Some(Self {
                expense: self.expense.checked_add(amount)?,
                ..self
            })
        }
    }

    fn balance(self) -> Cents {
        // Both sums are non-negative, so the difference cannot overflow
        self.income - self.expense
    }
}

/// The ordered collection of recorded transactions plus their derived balance.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    transactions: Vec<Transaction>,
    balance: Cents,
    totals: Totals,
    ids: IdGenerator,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ledger from already validated transactions.
    pub fn from_transactions(transactions: Vec<Transaction>) -> Self {
        let mut ids = IdGenerator::new();
        for transaction in &transactions {
            ids.observe(&transaction.id);
        }
        let mut ledger = Self {
            transactions,
            ids,
            ..Self::default()
        };
        ledger.recompute_balance();
        ledger
    }

    /// Restore a ledger from a persisted payload.
    ///
    /// Never fails: an absent or malformed payload yields an empty ledger,
    /// records missing required fields or carrying a non-positive amount are
    /// dropped, as is any record that would push the totals past `Cents`.
    /// Unusable dates are replaced by `now`.
    pub fn from_payload(payload: Option<&str>, now: DateTime<Utc>) -> Self {
        let Some(payload) = payload else {
            return Self::new();
        };
        let now = now.trunc_subsecs(3);

        let records: Vec<serde_json::Value> = match serde_json::from_str(payload) {
            Ok(records) => records,
            Err(e) => {
                warn!("Stored transactions are not a JSON array, starting empty: {}", e);
                return Self::new();
            }
        };

        let mut transactions = Vec::with_capacity(records.len());
        let mut totals = Totals::default();
        for (index, value) in records.into_iter().enumerate() {
            let record = match serde_json::from_value::<StoredTransaction>(value) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping stored transaction #{}: {}", index, e);
                    continue;
                }
            };
            if record.amount <= 0 {
                warn!(
                    "Skipping stored transaction {}: amount {} is not positive",
                    record.id, record.amount
                );
                continue;
            }
            let Some(next) = totals.with(record.amount, record.is_income) else {
                warn!(
                    "Skipping stored transaction {}: totals would overflow",
                    record.id
                );
                continue;
            };
            totals = next;
            transactions.push(record.into_transaction(now));
        }

        Self::from_transactions(transactions)
    }

    /// Serialize the full transaction sequence for persistence.
    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.transactions)
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn balance(&self) -> Cents {
        self.balance
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn find(&self, id: &str) -> Option<&Transaction> {
        self.transactions.iter().find(|t| t.id == id)
    }

    /// Record a new transaction dated `now`.
    ///
    /// Rejects amounts outside `1..=MAX_AMOUNT`, blank categories, expenses
    /// larger than the current balance and anything that would overflow the
    /// totals; nothing changes when an error is returned.
    pub fn add(
        &mut self,
        amount: Cents,
        category: &str,
        is_income: bool,
        now: DateTime<Utc>,
    ) -> Result<&Transaction, LedgerError> {
        check_amount(amount)?;
        let category = category.trim();
        if category.is_empty() {
            return Err(LedgerError::Validation(
                "category must not be empty".to_string(),
            ));
        }
        if !is_income && amount > self.balance {
            return Err(LedgerError::InsufficientBalance {
                balance: self.balance,
                required: amount,
            });
        }
        let totals = self.totals.with(amount, is_income).ok_or_else(|| {
            LedgerError::Validation("amount would overflow the ledger totals".to_string())
        })?;

        // Stored dates carry millisecond precision
        let now = now.trunc_subsecs(3);
        let transaction = Transaction {
            id: self.ids.next_id(now),
            amount,
            category: category.to_string(),
            is_income,
            date: now,
        };
        debug!(
            "Recording {} of {} cents in '{}' ({})",
            if is_income { "income" } else { "expense" },
            amount,
            transaction.category,
            transaction.id
        );

        self.transactions.push(transaction);
        self.totals = totals;
        self.balance = totals.balance();
        Ok(&self.transactions[self.transactions.len() - 1])
    }

    /// Remove the transaction with the given id, if present.
    pub fn delete(&mut self, id: &str) -> Option<Transaction> {
        let position = self.transactions.iter().position(|t| t.id == id)?;
        let removed = self.transactions.remove(position);
        self.recompute_balance();
        debug!("Deleted transaction {}", removed.id);
        Some(removed)
    }

    /// Remove every transaction. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.transactions.len();
        self.transactions.clear();
        self.recompute_balance();
        debug!("Cleared {} transactions", removed);
        removed
    }

    pub fn daily_aggregates<Tz: TimeZone>(
        &self,
        window_days: usize,
        reference: &DateTime<Tz>,
    ) -> DailyAggregates {
        compute_daily_aggregates(&self.transactions, window_days, reference)
    }

    fn recompute_balance(&mut self) {
        let income = self
            .transactions
            .iter()
            .filter(|t| t.is_income)
            .fold(0, |sum: Cents, t| sum.saturating_add(t.amount));
        let expense = self
            .transactions
            .iter()
            .filter(|t| !t.is_income)
            .fold(0, |sum: Cents, t| sum.saturating_add(t.amount));
        self.totals = Totals { income, expense };
        self.balance = self.totals.balance();
    }
}

/// A record as found in storage. The date is kept loose so that a bad value
/// can be replaced instead of discarding the whole record.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTransaction {
    id: TransactionId,
    #[serde(with = "super::money::units")]
    amount: Cents,
    category: String,
    is_income: bool,
    #[serde(default)]
    date: Option<serde_json::Value>,
}

impl StoredTransaction {
    fn into_transaction(self, now: DateTime<Utc>) -> Transaction {
        let date = match &self.date {
            Some(serde_json::Value::String(raw)) => match parse_timestamp(raw) {
                Ok(date) => date,
                Err(e) => {
                    warn!("Transaction {}: {}, using current time", self.id, e);
                    now
                }
            },
            other => {
                warn!(
                    "Transaction {}: unusable date {:?}, using current time",
                    self.id, other
                );
                now
            }
        };

        Transaction {
            id: self.id,
            amount: self.amount,
            category: self.category,
            is_income: self.is_income,
            date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Missing or invalid amount or category.
    Validation(String),
    /// An expense larger than the current balance.
    InsufficientBalance { balance: Cents, required: Cents },
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::Validation(reason) => write!(f, "Invalid transaction: {}", reason),
            LedgerError::InsufficientBalance { balance, required } => write!(
                f,
                "Insufficient balance: {} cents available, {} cents required",
                balance, required
            ),
        }
    }
}

impl std::error::Error for LedgerError {}
