use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::Cents;

/// Runtime configuration. Every field has a default, so a partial config
/// file (or none at all) works.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db: DbConfig,
    pub account: AccountConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Keep all state in memory instead of a database file.
    pub in_memory: bool,
    /// Database file path, ignored when `in_memory` is set.
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Balance granted to every newly registered account.
    pub initial_balance: Cents,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            in_memory: false,
            path: "passbook.db".to_string(),
        }
    }
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            initial_balance: 100_000,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file {}", path.as_ref().display()))?;
        serde_json::from_str(&raw).context("Failed to parse config file")
    }

    /// Connection URL for an existing database.
    pub fn database_url(&self) -> String {
        if self.db.in_memory {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}", self.db.path)
        }
    }

    /// Connection URL that creates the database file if missing.
    pub fn database_url_create(&self) -> String {
        if self.db.in_memory {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", self.db.path)
        }
    }
}
