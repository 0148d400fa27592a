use serde::{Deserialize, Serialize};

use super::Cents;

/// Reserved origin for initial balance grants. It appears as the `from` side
/// of grant entries but is never materialized as a stored account, so granting
/// does not decrement any balance.
pub const MINT_ACCOUNT_NR: &str = "00000000";

/// Returns true if `account_nr` is the reserved mint identifier.
pub fn is_mint(account_nr: &str) -> bool {
    account_nr == MINT_ACCOUNT_NR
}

/// A monetary account. `amount` is the current balance and always equals the
/// signed sum of the ledger entries recorded from this account's perspective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Opaque identifier of the owning user, assigned by the registration flow.
    pub owner_id: String,
    /// Unique account number; the primary lookup key.
    pub account_nr: String,
    /// Current balance in cents.
    pub amount: Cents,
}

impl Account {
    pub fn new(owner_id: impl Into<String>, account_nr: impl Into<String>, amount: Cents) -> Self {
        Self {
            owner_id: owner_id.into(),
            account_nr: account_nr.into(),
            amount,
        }
    }
}
