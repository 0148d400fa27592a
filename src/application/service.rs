use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::domain::{
    Account, BalanceDrift, Cents, IntegrityReport, TransactionEntry, build_integrity_report,
    is_mint,
};
use crate::storage::{Repository, TransferOutcome};

use super::{AppError, ValidationError};

/// Application service providing the account and ledger operations.
/// This is the primary interface for any client (HTTP layer, registration
/// flow, admin tooling, ...); callers are expected to have authenticated the
/// owner already.
pub struct LedgerService {
    repo: Repository,
    initial_balance: Cents,
}

/// Filter for a transaction history query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryFilter {
    /// Maximum number of entries to return; zero or negative means no
    /// explicit window.
    pub count: i64,
    /// Entries to skip before the window, applied when positive.
    pub skip: i64,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
}

/// Echo of a history query plus the total number of matching entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryQuery {
    /// Total entries matching the filter, ignoring `count` and `skip`.
    pub result_count: i64,
    pub count: i64,
    pub skip: i64,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
}

/// One page of an account's transaction history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPage {
    pub query: HistoryQuery,
    pub result: Vec<TransactionEntry>,
}

impl LedgerService {
    /// Create a new ledger service with the given repository.
    pub fn new(repo: Repository, initial_balance: Cents) -> Self {
        Self {
            repo,
            initial_balance,
        }
    }

    /// Initialize a new database from the configuration (connect + migrate).
    pub async fn init(config: &Config) -> Result<Self, AppError> {
        let repo = Repository::init(&config.database_url_create()).await?;
        Ok(Self::new(repo, config.account.initial_balance))
    }

    /// Connect to an existing database.
    pub async fn connect(config: &Config) -> Result<Self, AppError> {
        let repo = Repository::connect(&config.database_url()).await?;
        Ok(Self::new(repo, config.account.initial_balance))
    }

    // ========================
    // Account operations
    // ========================

    /// Allocate the next free account number from the durable sequence, for
    /// the registration flow.
    pub async fn allocate_account_nr(&self) -> Result<String, AppError> {
        Ok(self.repo.next_account_nr().await?)
    }

    /// Register a new account under `account_nr`, funded with the configured
    /// initial balance. The balance grant is recorded in the ledger and the
    /// account is persisted as one atomic unit.
    ///
    /// An empty `owner_id` or `account_nr` fails with
    /// [`AppError::AccountNotFound`]; a taken account number fails with
    /// [`AppError::AccountExists`].
    pub async fn add_account(&self, owner_id: &str, account_nr: &str) -> Result<Account, AppError> {
        if owner_id.is_empty() || account_nr.is_empty() {
            return Err(AppError::AccountNotFound(account_nr.to_string()));
        }
        if is_mint(account_nr) {
            return Err(ValidationError::ReservedAccountNr(account_nr.to_string()).into());
        }
        if self.repo.find_account(account_nr).await?.is_some() {
            return Err(AppError::AccountExists(account_nr.to_string()));
        }

        let (account, grant) = self.new_account_with_grant(owner_id, account_nr);
        match self.repo.register_account(&account, &grant).await {
            Ok(()) => {
                info!(account_nr, owner_id, "account registered");
                Ok(account)
            }
            // Two registrations raced past the lookup above; the unique
            // index decides.
            Err(err) if Repository::is_unique_violation(&err) => {
                Err(AppError::AccountExists(account_nr.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Get an account by its account number.
    pub async fn get_account(&self, account_nr: &str) -> Result<Account, AppError> {
        if account_nr.is_empty() {
            return Err(AppError::AccountNotFound(account_nr.to_string()));
        }
        self.repo
            .find_account(account_nr)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(account_nr.to_string()))
    }

    /// Build the account value and its initial balance grant. Persistence is
    /// the caller's concern.
    fn new_account_with_grant(&self, owner_id: &str, account_nr: &str) -> (Account, TransactionEntry) {
        let account = Account::new(owner_id, account_nr, self.initial_balance);
        let grant = TransactionEntry::grant(account_nr, self.initial_balance, Utc::now());
        (account, grant)
    }

    // ========================
    // Transfer operations
    // ========================

    /// Transfer `amount` from one account to another. Writes the debit and
    /// credit legs to the ledger and updates both balances atomically.
    /// Returns the debit leg.
    ///
    /// `date` stamps both legs and defaults to now; callers may backdate it
    /// for bulk imports.
    pub async fn add_transaction(
        &self,
        from: &str,
        target: &str,
        amount: Cents,
        date: Option<DateTime<Utc>>,
    ) -> Result<TransactionEntry, AppError> {
        let from_account = self.get_account(from).await?;
        self.get_account(target).await?;

        if from == target {
            return Err(ValidationError::SameAccount(from.to_string()).into());
        }
        if amount <= 0 {
            return Err(ValidationError::NonPositiveAmount(amount).into());
        }
        if from_account.amount < amount {
            return Err(ValidationError::InsufficientFunds {
                balance: from_account.amount,
                required: amount,
            }
            .into());
        }

        let date = date.unwrap_or_else(Utc::now);
        match self.repo.execute_transfer(from, target, amount, date).await? {
            TransferOutcome::Completed { debit, credit: _ } => {
                info!(from, target, amount, "transfer recorded");
                Ok(debit)
            }
            // The balance guard lost against a concurrent transfer; report
            // the balance found now rather than the stale read above.
            TransferOutcome::InsufficientFunds => {
                let balance = self
                    .repo
                    .find_account(from)
                    .await?
                    .map(|account| account.amount)
                    .unwrap_or(from_account.amount);
                Err(ValidationError::InsufficientFunds {
                    balance,
                    required: amount,
                }
                .into())
            }
        }
    }

    /// Query the transaction history of an account, newest first.
    ///
    /// Without a positive `count` and without a complete date-range pair the
    /// query would scan the whole ledger, so an empty page with the echoed
    /// parameters is returned instead. An incomplete date range (one bound
    /// only) does not filter.
    pub async fn get_transactions(
        &self,
        account_nr: &str,
        filter: HistoryFilter,
    ) -> Result<HistoryPage, AppError> {
        let range = match (filter.from_date, filter.to_date) {
            (Some(from), Some(to)) => Some((from, to)),
            _ => None,
        };

        if filter.count <= 0 && range.is_none() {
            return Ok(HistoryPage {
                query: HistoryQuery {
                    result_count: 0,
                    count: filter.count,
                    skip: filter.skip,
                    from_date: filter.from_date,
                    to_date: filter.to_date,
                },
                result: Vec::new(),
            });
        }

        let (from_date, to_date) = match range {
            Some((from, to)) => (Some(from), Some(to)),
            None => (None, None),
        };

        let result_count = self.repo.count_entries(account_nr, from_date, to_date).await?;
        let result = self
            .repo
            .query_entries(account_nr, from_date, to_date, filter.skip, filter.count)
            .await?;
        debug!(account_nr, result_count, "transaction history queried");

        Ok(HistoryPage {
            query: HistoryQuery {
                result_count,
                count: filter.count,
                skip: filter.skip,
                from_date: filter.from_date,
                to_date: filter.to_date,
            },
            result,
        })
    }

    // ========================
    // Integrity operations
    // ========================

    /// Check every stored balance against the ledger fold and return a report.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let stats = self.repo.get_integrity_stats().await?;
        let accounts = self.repo.list_accounts().await?;
        let derived = self.repo.derived_balances().await?;

        Ok(build_integrity_report(
            &accounts,
            &derived,
            stats.account_count,
            stats.entry_count,
            stats.foreign_entry_refs,
        ))
    }

    /// Rewrite drifted stored balances from the ledger fold. Recovery pass for
    /// stores corrupted out-of-band (crash, manual edits). Returns the drifts
    /// that were repaired.
    pub async fn reconcile(&self) -> Result<Vec<BalanceDrift>, AppError> {
        let report = self.check_integrity().await?;
        for drift in &report.drift {
            warn!(
                account_nr = %drift.account_nr,
                stored = drift.stored,
                derived = drift.derived,
                "repairing drifted balance"
            );
            let affected = self.repo.update_balance(&drift.account_nr, drift.derived).await?;
            if affected == 0 {
                warn!(account_nr = %drift.account_nr, "account vanished during reconcile");
            }
        }
        Ok(report.drift)
    }
}
