use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::domain::{Account, Cents, MINT_ACCOUNT_NR, TransactionEntry};

use super::MIGRATION_001_INITIAL;

/// Raw counts used for integrity checking.
#[derive(Debug, Clone)]
pub struct IntegrityStats {
    pub account_count: i64,
    pub entry_count: i64,
    pub foreign_entry_refs: i64,
}

/// Outcome of an atomic transfer attempt.
#[derive(Debug, Clone)]
pub enum TransferOutcome {
    /// Both legs appended and both balances updated.
    Completed {
        debit: TransactionEntry,
        credit: TransactionEntry,
    },
    /// The balance guard failed; nothing was written.
    InsufficientFunds,
}

/// Repository for persisting and querying accounts and ledger entries.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        // A pooled `:memory:` database is per-connection; a single shared
        // connection keeps every handle on the same data.
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect(database_url)
                .await
                .context("Failed to connect to in-memory database")?
        } else {
            SqlitePool::connect(database_url)
                .await
                .context("Failed to connect to database")?
        };
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Returns true if `err` stems from a uniqueness constraint, e.g. a
    /// duplicate account number.
    pub fn is_unique_violation(err: &anyhow::Error) -> bool {
        err.downcast_ref::<sqlx::Error>()
            .and_then(|e| e.as_database_error())
            .is_some_and(|db| db.kind() == sqlx::error::ErrorKind::UniqueViolation)
    }

    // ========================
    // Account operations
    // ========================

    /// Persist a new account. Fails if the account number is already taken.
    pub async fn insert_account(&self, account: &Account) -> Result<()> {
        sqlx::query("INSERT INTO accounts (account_nr, owner_id, amount) VALUES (?, ?, ?)")
            .bind(&account.account_nr)
            .bind(&account.owner_id)
            .bind(account.amount)
            .execute(&self.pool)
            .await
            .context("Failed to insert account")?;
        Ok(())
    }

    /// Persist a new account together with its initial balance grant, as one
    /// atomic unit. A duplicate account number rolls back the grant as well.
    pub async fn register_account(&self, account: &Account, grant: &TransactionEntry) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin registration")?;

        insert_entry(&mut tx, grant).await?;

        sqlx::query("INSERT INTO accounts (account_nr, owner_id, amount) VALUES (?, ?, ?)")
            .bind(&account.account_nr)
            .bind(&account.owner_id)
            .bind(account.amount)
            .execute(&mut *tx)
            .await
            .context("Failed to insert account")?;

        tx.commit().await.context("Failed to commit registration")?;
        Ok(())
    }

    /// Get an account by its account number.
    pub async fn find_account(&self, account_nr: &str) -> Result<Option<Account>> {
        let row = sqlx::query("SELECT account_nr, owner_id, amount FROM accounts WHERE account_nr = ?")
            .bind(account_nr)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch account")?;

        Ok(row.map(|row| Self::row_to_account(&row)))
    }

    /// List all accounts, ordered by account number.
    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query("SELECT account_nr, owner_id, amount FROM accounts ORDER BY account_nr")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list accounts")?;

        Ok(rows.iter().map(Self::row_to_account).collect())
    }

    /// Unconditionally set an account's balance. Returns the number of
    /// affected rows (0 or 1) so the caller can detect a missing account.
    pub async fn update_balance(&self, account_nr: &str, amount: Cents) -> Result<u64> {
        let result = sqlx::query("UPDATE accounts SET amount = ? WHERE account_nr = ?")
            .bind(amount)
            .bind(account_nr)
            .execute(&self.pool)
            .await
            .context("Failed to update balance")?;

        Ok(result.rows_affected())
    }

    /// Allocate the next account number from the durable sequence.
    pub async fn next_account_nr(&self) -> Result<String> {
        let row = sqlx::query(
            r#"
            UPDATE sequence_counter
            SET value = value + 1
            WHERE name = 'account_nr'
            RETURNING value
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to allocate account number")?;

        let value: i64 = row.get("value");
        Ok(value.to_string())
    }

    // ========================
    // Ledger entry operations
    // ========================

    /// Append one entry to the ledger. Entries are never updated or deleted.
    pub async fn append_entry(&self, entry: &TransactionEntry) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire connection")?;
        insert_entry(&mut conn, entry).await
    }

    /// Execute a transfer as one atomic unit: debit the source under a balance
    /// guard, credit the target, and append both ledger legs. Either all four
    /// writes commit or none do.
    pub async fn execute_transfer(
        &self,
        from: &str,
        target: &str,
        amount: Cents,
        date: DateTime<Utc>,
    ) -> Result<TransferOutcome> {
        let mut tx = self.pool.begin().await.context("Failed to begin transfer")?;

        // The balance check and the decrement are one statement, so
        // concurrent transfers cannot overdraw the source account.
        let debited = sqlx::query(
            "UPDATE accounts SET amount = amount - ? WHERE account_nr = ? AND amount >= ? RETURNING amount",
        )
        .bind(amount)
        .bind(from)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to debit source account")?;

        let Some(row) = debited else {
            tx.rollback().await.context("Failed to roll back transfer")?;
            return Ok(TransferOutcome::InsufficientFunds);
        };
        let from_total: Cents = row.get("amount");

        let credited =
            sqlx::query("UPDATE accounts SET amount = amount + ? WHERE account_nr = ? RETURNING amount")
                .bind(amount)
                .bind(target)
                .fetch_optional(&mut *tx)
                .await
                .context("Failed to credit target account")?;

        let Some(row) = credited else {
            tx.rollback().await.context("Failed to roll back transfer")?;
            anyhow::bail!("target account {target} disappeared mid-transfer");
        };
        let target_total: Cents = row.get("amount");

        let (debit, credit) =
            TransactionEntry::transfer_legs(from, target, amount, from_total, target_total, date);
        insert_entry(&mut tx, &debit).await?;
        insert_entry(&mut tx, &credit).await?;

        tx.commit().await.context("Failed to commit transfer")?;
        Ok(TransferOutcome::Completed { debit, credit })
    }

    /// Query the entries recorded from `account_nr`'s perspective, newest
    /// first. The date range is applied only when both bounds are given and is
    /// inclusive; `skip` and `limit` apply when positive.
    pub async fn query_entries(
        &self,
        account_nr: &str,
        from_date: Option<DateTime<Utc>>,
        to_date: Option<DateTime<Utc>>,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<TransactionEntry>> {
        let mut query = String::from(
            "SELECT from_account, target_account, amount, total, date FROM entries \
             WHERE ((from_account = ? AND amount <= 0) OR (target_account = ? AND amount >= 0))",
        );

        let from_date_str = from_date.map(|dt| dt.to_rfc3339());
        let to_date_str = to_date.map(|dt| dt.to_rfc3339());
        let ranged = from_date_str.is_some() && to_date_str.is_some();

        if ranged {
            query.push_str(" AND date >= ? AND date <= ?");
        }

        query.push_str(" ORDER BY date DESC, seq DESC");

        if limit > 0 {
            query.push_str(&format!(" LIMIT {}", limit));
        } else {
            query.push_str(" LIMIT -1");
        }
        if skip > 0 {
            query.push_str(&format!(" OFFSET {}", skip));
        }

        let mut sql_query = sqlx::query(&query).bind(account_nr).bind(account_nr);
        if let (Some(from), Some(to)) = (&from_date_str, &to_date_str) {
            sql_query = sql_query.bind(from).bind(to);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to query ledger entries")?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    /// Count the entries matching the same filter as `query_entries`,
    /// independent of any pagination window.
    pub async fn count_entries(
        &self,
        account_nr: &str,
        from_date: Option<DateTime<Utc>>,
        to_date: Option<DateTime<Utc>>,
    ) -> Result<i64> {
        let mut query = String::from(
            "SELECT COUNT(*) as count FROM entries \
             WHERE ((from_account = ? AND amount <= 0) OR (target_account = ? AND amount >= 0))",
        );

        let from_date_str = from_date.map(|dt| dt.to_rfc3339());
        let to_date_str = to_date.map(|dt| dt.to_rfc3339());
        let ranged = from_date_str.is_some() && to_date_str.is_some();

        if ranged {
            query.push_str(" AND date >= ? AND date <= ?");
        }

        let mut sql_query = sqlx::query(&query).bind(account_nr).bind(account_nr);
        if let (Some(from), Some(to)) = (&from_date_str, &to_date_str) {
            sql_query = sql_query.bind(from).bind(to);
        }

        let row = sql_query
            .fetch_one(&self.pool)
            .await
            .context("Failed to count ledger entries")?;

        Ok(row.get("count"))
    }

    // ========================
    // Integrity operations
    // ========================

    /// Derive every account's balance from the ledger in a single query.
    /// Accounts owning no entries are absent from the map (balance 0).
    pub async fn derived_balances(&self) -> Result<HashMap<String, Cents>> {
        let rows = sqlx::query(
            r#"
            SELECT account, SUM(amount) as balance
            FROM (
                SELECT from_account AS account, amount FROM entries WHERE amount <= 0
                UNION ALL
                SELECT target_account AS account, amount FROM entries WHERE amount >= 0
            )
            GROUP BY account
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to derive balances")?;

        let mut balances = HashMap::new();
        for row in rows {
            let account: String = row.get("account");
            let balance: Cents = row.get("balance");
            balances.insert(account, balance);
        }
        Ok(balances)
    }

    /// Raw counts for integrity checking.
    pub async fn get_integrity_stats(&self) -> Result<IntegrityStats> {
        let account_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM accounts")
            .fetch_one(&self.pool)
            .await?
            .get("count");

        let entry_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM entries")
            .fetch_one(&self.pool)
            .await?
            .get("count");

        let foreign_entry_refs: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) as count
            FROM entries e
            WHERE (e.from_account <> ?
                   AND NOT EXISTS (SELECT 1 FROM accounts a WHERE a.account_nr = e.from_account))
               OR (e.target_account <> ?
                   AND NOT EXISTS (SELECT 1 FROM accounts a WHERE a.account_nr = e.target_account))
            "#,
        )
        .bind(MINT_ACCOUNT_NR)
        .bind(MINT_ACCOUNT_NR)
        .fetch_one(&self.pool)
        .await?
        .get("count");

        Ok(IntegrityStats {
            account_count,
            entry_count,
            foreign_entry_refs,
        })
    }

    fn row_to_account(row: &SqliteRow) -> Account {
        Account {
            account_nr: row.get("account_nr"),
            owner_id: row.get("owner_id"),
            amount: row.get("amount"),
        }
    }

    fn row_to_entry(row: &SqliteRow) -> Result<TransactionEntry> {
        let date_str: String = row.get("date");

        Ok(TransactionEntry {
            from: row.get("from_account"),
            target: row.get("target_account"),
            amount: row.get("amount"),
            total: row.get("total"),
            date: DateTime::parse_from_rfc3339(&date_str)
                .context("Invalid entry date")?
                .with_timezone(&Utc),
        })
    }
}

async fn insert_entry(conn: &mut SqliteConnection, entry: &TransactionEntry) -> Result<()> {
    sqlx::query(
        "INSERT INTO entries (from_account, target_account, amount, total, date) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&entry.from)
    .bind(&entry.target)
    .bind(entry.amount)
    .bind(entry.total)
    .bind(entry.date.to_rfc3339())
    .execute(conn)
    .await
    .context("Failed to append ledger entry")?;
    Ok(())
}
