use thiserror::Error;

use crate::domain::{Cents, format_cents};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Account already exists: {0}")]
    AccountExists(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

/// A transfer or registration request violating one of the ledger rules.
/// Each variant names the rule that failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Source and target account are the same: {0}")]
    SameAccount(String),

    #[error("Transfer amount must be positive, got {}", format_cents(*.0))]
    NonPositiveAmount(Cents),

    #[error(
        "Insufficient funds: balance {}, required {}",
        format_cents(*.balance),
        format_cents(*.required)
    )]
    InsufficientFunds { balance: Cents, required: Cents },

    #[error("Account number is reserved: {0}")]
    ReservedAccountNr(String),
}
