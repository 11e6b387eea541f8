//! In-memory storage backend
//!
//! State lives behind one mutex; a unit of work mutates a scratch copy and
//! swaps it in only on success. Holding the lock for the whole scope gives
//! the same serialization guarantee the SQLite backend gets from its
//! database transaction.

use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use demobank_core::Money;
use demobank_ledger::{
    Account, AccountStatus, LedgerError, LedgerStore, StoreError, Transaction, TransactionStatus,
    UnitOfWork,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    // Insertion order is the creation order contract, so plain vectors.
    accounts: Vec<Account>,
    transactions: Vec<Transaction>,
}

/// Volatile store for tests and throwaway demo sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryStore {
    fn with_unit_of_work<R>(
        &self,
        op: &mut dyn FnMut(&mut dyn UnitOfWork) -> Result<R, LedgerError>,
    ) -> Result<R, LedgerError> {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let mut scratch = guard.clone();
        let mut uow = MemoryUnitOfWork {
            state: &mut scratch,
        };
        let outcome = op(&mut uow);
        match outcome {
            Ok(value) => {
                *guard = scratch;
                Ok(value)
            }
            // The scratch copy is discarded untouched: full rollback.
            Err(err) => Err(err),
        }
    }
}

struct MemoryUnitOfWork<'a> {
    state: &'a mut MemoryState,
}

impl MemoryUnitOfWork<'_> {
    fn account_mut(&mut self, id: &str) -> Result<&mut Account, StoreError> {
        self.state
            .accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| StoreError::AccountNotFound(id.to_string()))
    }

    fn sorted_by_display_date(mut records: Vec<Transaction>) -> Vec<Transaction> {
        records.sort_by(|a, b| b.display_date.cmp(&a.display_date));
        records
    }
}

impl UnitOfWork for MemoryUnitOfWork<'_> {
    fn insert_account(&mut self, account: &Account) -> Result<(), StoreError> {
        if self
            .state
            .accounts
            .iter()
            .any(|a| a.id == account.id || a.account_number == account.account_number)
        {
            return Err(StoreError::Duplicate(account.id.clone()));
        }
        self.state.accounts.push(account.clone());
        Ok(())
    }

    fn account(&mut self, id: &str) -> Result<Account, StoreError> {
        self.state
            .accounts
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| StoreError::AccountNotFound(id.to_string()))
    }

    fn accounts_by_owner(&mut self, user_id: &str) -> Result<Vec<Account>, StoreError> {
        Ok(self
            .state
            .accounts
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    fn all_accounts(&mut self) -> Result<Vec<Account>, StoreError> {
        Ok(self.state.accounts.clone())
    }

    fn set_balance(
        &mut self,
        id: &str,
        expected: Option<&Money>,
        new_balance: &Money,
    ) -> Result<Account, StoreError> {
        let account = self.account_mut(id)?;
        if let Some(expected) = expected {
            if account.balance != *expected {
                return Err(StoreError::Conflict(id.to_string()));
            }
        }
        account.balance = *new_balance;
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    fn set_withdrawals_allowed(&mut self, id: &str, allowed: bool) -> Result<Account, StoreError> {
        let account = self.account_mut(id)?;
        account.allow_withdrawals = allowed;
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    fn set_status(&mut self, id: &str, status: AccountStatus) -> Result<Account, StoreError> {
        let account = self.account_mut(id)?;
        account.status = status;
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    fn insert_transaction(&mut self, tx: &Transaction) -> Result<(), StoreError> {
        if self.state.transactions.iter().any(|t| t.id == tx.id) {
            return Err(StoreError::Duplicate(tx.id.clone()));
        }
        self.state.transactions.push(tx.clone());
        Ok(())
    }

    fn transaction(&mut self, id: &str) -> Result<Transaction, StoreError> {
        self.state
            .transactions
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| StoreError::TransactionNotFound(id.to_string()))
    }

    fn update_transaction(&mut self, tx: &Transaction) -> Result<(), StoreError> {
        let slot = self
            .state
            .transactions
            .iter_mut()
            .find(|t| t.id == tx.id)
            .ok_or_else(|| StoreError::TransactionNotFound(tx.id.clone()))?;
        *slot = tx.clone();
        Ok(())
    }

    fn transactions_by_display_order(
        &mut self,
        account_id: &str,
        limit: usize,
    ) -> Result<Vec<Transaction>, StoreError> {
        let records: Vec<Transaction> = self
            .state
            .transactions
            .iter()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect();
        let mut sorted = Self::sorted_by_display_date(records);
        sorted.truncate(limit);
        Ok(sorted)
    }

    fn transactions_in_creation_order(
        &mut self,
        account_id: &str,
    ) -> Result<Vec<Transaction>, StoreError> {
        Ok(self
            .state
            .transactions
            .iter()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect())
    }

    fn pending_transactions(&mut self) -> Result<Vec<Transaction>, StoreError> {
        let records: Vec<Transaction> = self
            .state
            .transactions
            .iter()
            .filter(|t| t.status == TransactionStatus::Pending)
            .cloned()
            .collect();
        Ok(Self::sorted_by_display_date(records))
    }

    fn all_transactions(&mut self) -> Result<Vec<Transaction>, StoreError> {
        Ok(Self::sorted_by_display_date(self.state.transactions.clone()))
    }
}
