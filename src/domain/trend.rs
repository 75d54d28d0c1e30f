use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{Cents, Transaction};

/// Default length of the trailing trend window.
pub const DEFAULT_WINDOW_DAYS: usize = 7;

/// Longest trend window; larger requests are clamped to it.
pub const MAX_WINDOW_DAYS: usize = 366;

/// Per-day income and expense totals over a trailing window, oldest day first.
/// All vectors have the same length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyAggregates {
    /// Calendar day of each bucket; `None` if the day cannot be represented.
    pub days: Vec<Option<NaiveDate>>,
    /// `day/month` label per bucket, empty for an unrepresentable day.
    pub labels: Vec<String>,
    pub income: Vec<Cents>,
    pub expense: Vec<Cents>,
}

impl DailyAggregates {
    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn total_income(&self) -> Cents {
        self.income.iter().fold(0, |sum: Cents, v| sum.saturating_add(*v))
    }

    pub fn total_expense(&self) -> Cents {
        self.expense.iter().fold(0, |sum: Cents, v| sum.saturating_add(*v))
    }

    /// Largest single bucket, income or expense.
    pub fn peak(&self) -> Cents {
        self.income
            .iter()
            .chain(self.expense.iter())
            .copied()
            .max()
            .unwrap_or(0)
    }
}

/// Sum transactions per calendar day for the `window_days` days ending on the
/// reference's day, inclusive.
///
/// Days are calendar days in the reference's time zone. Transactions outside
/// the window are ignored. A window longer than `MAX_WINDOW_DAYS` is clamped,
/// and a transaction that would overflow its day's bucket is skipped with a
/// warning.
pub fn compute_daily_aggregates<Tz: TimeZone>(
    transactions: &[Transaction],
    window_days: usize,
    reference: &DateTime<Tz>,
) -> DailyAggregates {
    let window_days = if window_days > MAX_WINDOW_DAYS {
        warn!(
            "Trend window of {} days clamped to {}",
            window_days, MAX_WINDOW_DAYS
        );
        MAX_WINDOW_DAYS
    } else {
        window_days
    };
    let last_day = reference.date_naive();
    let days: Vec<Option<NaiveDate>> = (0..window_days)
        .rev()
        .map(|offset| {
            u64::try_from(offset)
                .ok()
                .and_then(|offset| last_day.checked_sub_days(Days::new(offset)))
        })
        .collect();

    let labels = days
        .iter()
        .map(|day| match day {
            Some(day) => format!("{}/{}", day.day(), day.month()),
            None => String::new(),
        })
        .collect();

    let mut income: Vec<Cents> = vec![0; window_days];
    let mut expense: Vec<Cents> = vec![0; window_days];
    let timezone = reference.timezone();

    for transaction in transactions {
        let day = transaction.date.with_timezone(&timezone).date_naive();

        let Some(index) = days.iter().position(|d| *d == Some(day)) else {
            continue;
        };
        let bucket = if transaction.is_income {
            &mut income[index]
        } else {
            &mut expense[index]
        };
        match bucket.checked_add(transaction.amount) {
            Some(sum) => *bucket = sum,
            None => warn!(
                "Skipping transaction {} in trend: total for {} would overflow",
                transaction.id, day
            ),
        }
    }

    DailyAggregates {
        days,
        labels,
        income,
        expense,
    }
}
