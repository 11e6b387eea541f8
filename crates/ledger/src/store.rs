//! Storage contract - accounts and the transaction log behind one
//! transactional unit of work
//!
//! The engine never talks to a backend directly; it runs every operation
//! inside [`LedgerStore::with_unit_of_work`], which commits on `Ok` and
//! rolls the whole scope back on `Err`. The backend's own isolation
//! (row/database locking or equivalent) is the sole concurrency-control
//! mechanism: a balance read and the write that depends on it always share
//! one scope.

use crate::account::{Account, AccountStatus};
use crate::error::LedgerError;
use crate::transaction::Transaction;
use demobank_core::Money;
use thiserror::Error;

/// Errors surfaced by storage backends
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Concurrent update detected: {0}")]
    Conflict(String),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Corrupted stored record: {0}")]
    Corrupted(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// All reads and writes available inside one transactional scope.
///
/// Mutations performed through a unit of work become visible only when the
/// surrounding [`LedgerStore::with_unit_of_work`] call commits.
pub trait UnitOfWork {
    // === Accounts ===

    fn insert_account(&mut self, account: &Account) -> Result<(), StoreError>;

    fn account(&mut self, id: &str) -> Result<Account, StoreError>;

    /// Accounts owned by `user_id`, in insertion order.
    fn accounts_by_owner(&mut self, user_id: &str) -> Result<Vec<Account>, StoreError>;

    fn all_accounts(&mut self) -> Result<Vec<Account>, StoreError>;

    /// Compare-and-set the stored balance.
    ///
    /// With `expected` given, the write only happens while the stored
    /// balance still equals it; otherwise [`StoreError::Conflict`].
    /// `None` skips the check (administrative override). This is the only
    /// balance write path; it must run in the same unit of work as the
    /// paired transaction mutation.
    fn set_balance(
        &mut self,
        id: &str,
        expected: Option<&Money>,
        new_balance: &Money,
    ) -> Result<Account, StoreError>;

    /// Toggle the withdrawal freeze flag; balance and transactions untouched.
    fn set_withdrawals_allowed(&mut self, id: &str, allowed: bool) -> Result<Account, StoreError>;

    fn set_status(&mut self, id: &str, status: AccountStatus) -> Result<Account, StoreError>;

    // === Transaction log ===

    fn insert_transaction(&mut self, tx: &Transaction) -> Result<(), StoreError>;

    fn transaction(&mut self, id: &str) -> Result<Transaction, StoreError>;

    fn update_transaction(&mut self, tx: &Transaction) -> Result<(), StoreError>;

    /// History for display: `display_date` descending, at most `limit` rows.
    fn transactions_by_display_order(
        &mut self,
        account_id: &str,
        limit: usize,
    ) -> Result<Vec<Transaction>, StoreError>;

    /// Full history in true creation order, for ledger replay.
    fn transactions_in_creation_order(
        &mut self,
        account_id: &str,
    ) -> Result<Vec<Transaction>, StoreError>;

    /// All pending transactions across accounts, display order.
    fn pending_transactions(&mut self) -> Result<Vec<Transaction>, StoreError>;

    /// Every transaction across accounts, display order.
    fn all_transactions(&mut self) -> Result<Vec<Transaction>, StoreError>;
}

/// A storage backend able to run transactional units of work.
pub trait LedgerStore: Send + Sync {
    /// Run `op` against a unit of work with all-or-nothing semantics.
    ///
    /// Commits when `op` returns `Ok`; any `Err` (domain or storage) rolls
    /// back every mutation made inside the scope. Concurrent units of work
    /// on the same store serialize here.
    fn with_unit_of_work<R>(
        &self,
        op: &mut dyn FnMut(&mut dyn UnitOfWork) -> Result<R, LedgerError>,
    ) -> Result<R, LedgerError>;
}

// Sessions share one backend; each engine holds an Arc to the same store.
impl<S: LedgerStore + ?Sized> LedgerStore for std::sync::Arc<S> {
    fn with_unit_of_work<R>(
        &self,
        op: &mut dyn FnMut(&mut dyn UnitOfWork) -> Result<R, LedgerError>,
    ) -> Result<R, LedgerError> {
        (**self).with_unit_of_work(op)
    }
}
