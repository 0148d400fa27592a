pub mod application;
pub mod config;
pub mod domain;
pub mod storage;

pub use application::{AppError, HistoryFilter, HistoryPage, LedgerService, ValidationError};
pub use config::Config;
pub use domain::*;
pub use storage::Repository;
