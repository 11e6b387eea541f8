//! Demobank Store - Interchangeable storage backends
//!
//! Two implementations of the ledger storage contract:
//! - `MemoryStore`: volatile, for tests and throwaway demo sessions
//! - `SqliteStore`: durable SQLite database
//!
//! The backend is selected once at startup from [`StorageConfig`]; business
//! logic never branches on which one is in use.

pub mod config;
pub mod memory;
pub mod sqlite;

pub use config::StorageConfig;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use demobank_ledger::{LedgerError, LedgerStore, StoreError, UnitOfWork};

/// The backend chosen at process start.
pub enum Store {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
}

impl Store {
    /// Construct the backend named by `config`.
    ///
    /// For SQLite the parent directory is created if missing.
    pub fn open(config: &StorageConfig) -> Result<Self, StoreError> {
        match config {
            StorageConfig::Memory => Ok(Store::Memory(MemoryStore::new())),
            StorageConfig::Sqlite { path } => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)
                            .map_err(|e| StoreError::Backend(e.to_string()))?;
                    }
                }
                Ok(Store::Sqlite(SqliteStore::new(path)?))
            }
        }
    }
}

impl LedgerStore for Store {
    fn with_unit_of_work<R>(
        &self,
        op: &mut dyn FnMut(&mut dyn UnitOfWork) -> Result<R, LedgerError>,
    ) -> Result<R, LedgerError> {
        match self {
            Store::Memory(store) => store.with_unit_of_work(op),
            Store::Sqlite(store) => store.with_unit_of_work(op),
        }
    }
}
