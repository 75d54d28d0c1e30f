use thiserror::Error;

use crate::domain::{Cents, LedgerError, format_cents};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid transaction: {0}")]
    Validation(String),

    #[error(
        "Insufficient balance: {} available, {} required",
        amount(.balance),
        amount(.required)
    )]
    InsufficientBalance { balance: Cents, required: Cents },

    #[error("Persistence error: {0:#}")]
    Persistence(#[from] anyhow::Error),
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Validation(reason) => AppError::Validation(reason),
            LedgerError::InsufficientBalance { balance, required } => {
                AppError::InsufficientBalance { balance, required }
            }
        }
    }
}

fn amount(cents: &Cents) -> String {
    format_cents(*cents)
}
