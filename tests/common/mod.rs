// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use passbook::application::{HistoryFilter, LedgerService};
use passbook::config::{AccountConfig, Config, DbConfig};
use passbook::domain::Cents;
use tempfile::TempDir;

/// Default grant for accounts created through the test helpers.
pub const INITIAL_BALANCE: Cents = 10_000;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    test_service_with_balance(INITIAL_BALANCE).await
}

/// Helper to create a test service granting `initial_balance` to new accounts
pub async fn test_service_with_balance(initial_balance: Cents) -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let config = test_config(&temp_dir, initial_balance);
    let service = LedgerService::init(&config).await?;
    Ok((service, temp_dir))
}

/// Config pointing at a database file inside `temp_dir`
pub fn test_config(temp_dir: &TempDir, initial_balance: Cents) -> Config {
    let db_path = temp_dir.path().join("test.db");
    Config {
        db: DbConfig {
            in_memory: false,
            path: db_path.to_str().unwrap().to_string(),
        },
        account: AccountConfig { initial_balance },
    }
}

/// Helper to parse a date string into DateTime<Utc>
pub fn parse_date(date_str: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

/// History filter asking for the `count` most recent entries
pub fn recent(count: i64) -> HistoryFilter {
    HistoryFilter {
        count,
        ..Default::default()
    }
}
