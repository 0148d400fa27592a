use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Cents, MINT_ACCOUNT_NR};

/// One row of the append-only ledger. Entries are immutable once written -
/// corrections happen through new transfers, never through updates.
///
/// Every transfer produces two entries sharing the same `(from, target)` pair
/// and date: a debit leg recorded from the sender's perspective (negative
/// `amount`) and a credit leg from the receiver's (positive `amount`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEntry {
    /// Source account number.
    pub from: String,
    /// Destination account number.
    pub target: String,
    /// Signed quantity: negative on the debit leg, positive on the credit leg.
    pub amount: Cents,
    /// Balance of the owning account immediately after applying `amount`.
    pub total: Cents,
    /// When the transfer happened. Caller-suppliable to support backdated
    /// entries and bulk imports.
    pub date: DateTime<Utc>,
}

impl TransactionEntry {
    /// Initial balance grant for a freshly created account, originating from
    /// the mint.
    pub fn grant(account_nr: impl Into<String>, amount: Cents, date: DateTime<Utc>) -> Self {
        Self {
            from: MINT_ACCOUNT_NR.to_string(),
            target: account_nr.into(),
            amount,
            total: amount,
            date,
        }
    }

    /// Build both legs of one transfer. `from_total` and `target_total` are
    /// the post-transfer balances of the respective accounts.
    pub fn transfer_legs(
        from: &str,
        target: &str,
        amount: Cents,
        from_total: Cents,
        target_total: Cents,
        date: DateTime<Utc>,
    ) -> (Self, Self) {
        debug_assert!(amount > 0, "transfer amount must be positive");
        let debit = Self {
            from: from.to_string(),
            target: target.to_string(),
            amount: -amount,
            total: from_total,
            date,
        };
        let credit = Self {
            from: from.to_string(),
            target: target.to_string(),
            amount,
            total: target_total,
            date,
        };
        (debit, credit)
    }

    /// Returns true for the sender-perspective half of a transfer.
    pub fn is_debit(&self) -> bool {
        self.amount < 0
    }
}
