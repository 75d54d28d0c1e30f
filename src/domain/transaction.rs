use std::fmt;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::Cents;

pub type TransactionId = String;

/// A single recorded income or expense event.
/// Transactions are immutable - corrections are made by deleting and re-adding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    /// Amount in cents (always positive for transactions created through the ledger)
    #[serde(with = "super::money::units")]
    pub amount: Cents,
    pub category: String,
    /// Credit when true, debit when false
    pub is_income: bool,
    /// When the transaction was recorded
    #[serde(with = "iso_timestamp")]
    pub date: DateTime<Utc>,
}

impl Transaction {
    /// Signed contribution of this transaction to the balance.
    pub fn signed_amount(&self) -> Cents {
        if self.is_income {
            self.amount
        } else {
            -self.amount
        }
    }
}

/// Issues transaction ids derived from the creation timestamp.
///
/// Ids are the creation time in milliseconds since the Unix epoch. When two
/// transactions are created within the same millisecond (or the clock goes
/// backwards) the next free integer is used, so ids stay unique and increasing.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    last: i64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure ids already present in the ledger are never issued again.
    pub fn observe(&mut self, id: &str) {
        if let Ok(value) = id.parse::<i64>() {
            self.last = self.last.max(value);
        }
    }

    pub fn next_id(&mut self, now: DateTime<Utc>) -> TransactionId {
        let millis = now.timestamp_millis();
        self.last = if millis > self.last {
            millis
        } else {
            self.last.saturating_add(1)
        };
        self.last.to_string()
    }
}

/// Format a timestamp the way it is persisted: `2024-01-15T10:30:00.000Z`.
pub fn format_timestamp(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp.
///
/// Accepts RFC 3339 with any offset, a date-time without offset (local time)
/// and a bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, DateParseError> {
    let trimmed = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            if let Some(local) = naive.and_local_timezone(Local).earliest() {
                return Ok(local.with_timezone(&Utc));
            }
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    Err(DateParseError {
        input: input.to_string(),
    })
}

/// A stored date that could not be understood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateParseError {
    pub input: String,
}

impl fmt::Display for DateParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid date '{}'", self.input)
    }
}

impl std::error::Error for DateParseError {}

mod iso_timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw).map_err(D::Error::custom)
    }
}
