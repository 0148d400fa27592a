use std::collections::HashMap;

use super::{Account, Cents, TransactionEntry};

/// True when `entry` is the leg recorded from `account_nr`'s perspective:
/// the debit leg for the sender, the credit leg for the receiver.
pub fn owns_entry(account_nr: &str, entry: &TransactionEntry) -> bool {
    (entry.from == account_nr && entry.amount <= 0)
        || (entry.target == account_nr && entry.amount >= 0)
}

/// Derive an account balance by folding the ledger entries it owns.
/// This is the system of record; the stored balance must always match it.
pub fn derive_balance(account_nr: &str, entries: &[TransactionEntry]) -> Cents {
    entries
        .iter()
        .filter(|entry| owns_entry(account_nr, entry))
        .map(|entry| entry.amount)
        .sum()
}

/// A stored balance that no longer matches the ledger fold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceDrift {
    pub account_nr: String,
    pub stored: Cents,
    pub derived: Cents,
}

/// Result of checking the ledger against the stored balances.
#[derive(Debug, Clone)]
pub struct IntegrityReport {
    pub account_count: i64,
    pub entry_count: i64,
    /// Entries naming an account that is neither stored nor the mint.
    pub foreign_entry_refs: i64,
    pub drift: Vec<BalanceDrift>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.drift.is_empty() && self.foreign_entry_refs == 0
    }
}

/// Compare stored balances against ledger-derived ones. Accounts absent from
/// `derived` own no ledger entries and fold to zero.
pub fn build_integrity_report(
    accounts: &[Account],
    derived: &HashMap<String, Cents>,
    account_count: i64,
    entry_count: i64,
    foreign_entry_refs: i64,
) -> IntegrityReport {
    let drift = accounts
        .iter()
        .filter_map(|account| {
            let derived_amount = derived.get(&account.account_nr).copied().unwrap_or(0);
            (derived_amount != account.amount).then(|| BalanceDrift {
                account_nr: account.account_nr.clone(),
                stored: account.amount,
                derived: derived_amount,
            })
        })
        .collect();

    IntegrityReport {
        account_count,
        entry_count,
        foreign_entry_refs,
        drift,
    }
}
