//! Ledger errors
//!
//! Every failure is scoped to the single operation that produced it and is
//! returned as a value; nothing in the ledger core is fatal to the process.
//! Messages stay short and carry nothing the caller did not already supply.

use crate::store::StoreError;
use demobank_core::money::MoneyError;
use thiserror::Error;

/// Errors returned by ledger engine operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Not authorized to perform this operation")]
    Unauthorized,

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Account is not active: {0}")]
    AccountNotActive(String),

    #[error("Transaction already processed: {0}")]
    AlreadyProcessed(String),

    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: String, required: String },

    #[error("Withdrawals are frozen for this account")]
    WithdrawalsFrozen,

    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] MoneyError),

    #[error("Concurrent update conflict: {0}; retry the operation")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AccountNotFound(id) => LedgerError::AccountNotFound(id),
            StoreError::TransactionNotFound(id) => LedgerError::TransactionNotFound(id),
            StoreError::Conflict(detail) => LedgerError::Conflict(detail),
            other => LedgerError::Store(other),
        }
    }
}
