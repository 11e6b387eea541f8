//! Ledger engine - atomic state transitions over accounts and transactions
//!
//! One engine operation = one unit of work against the store. Either the
//! transaction-record change and the balance change both commit, or neither
//! does. The engine consults the [`AuthorizationGate`] for policy branches
//! (owner-only vs admin-only) and implements no locking of its own; the
//! store's unit-of-work isolation serializes concurrent operations on the
//! same account.

use std::sync::Arc;

use demobank_core::money::MoneyError;
use demobank_core::{Currency, Money};

use crate::account::{Account, AccountKind, AccountStatus};
use crate::auth::{AuthorizationGate, Identity};
use crate::error::LedgerError;
use crate::store::LedgerStore;
use crate::transaction::{Transaction, TransactionKind, TransactionStatus};

/// Result of a completed deposit
#[derive(Debug, Clone, PartialEq)]
pub struct DepositOutcome {
    pub transaction: Transaction,
    pub new_balance: Money,
}

/// Result of replaying an account's completed history.
///
/// The replay starts from the recorded opening balance and walks completed
/// transactions in true creation order; administrative display-date edits
/// have no effect on it. A direct balance override leaves the stored balance
/// diverged from the replayed one, which is exactly what this report exists
/// to surface.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditReport {
    pub account_id: String,
    pub stored_balance: Money,
    pub replayed_balance: Money,
    pub completed_count: usize,
}

impl AuditReport {
    pub fn is_consistent(&self) -> bool {
        self.stored_balance == self.replayed_balance
    }
}

/// The ledger core. All balance mutations in Demobank go through here.
pub struct LedgerEngine<S: LedgerStore> {
    store: S,
    gate: Arc<dyn AuthorizationGate>,
}

impl<S: LedgerStore> LedgerEngine<S> {
    pub fn new(store: S, gate: Arc<dyn AuthorizationGate>) -> Self {
        Self { store, gate }
    }

    fn identity(&self) -> Result<Identity, LedgerError> {
        self.gate.current_identity().ok_or(LedgerError::Unauthorized)
    }

    fn require_admin(&self) -> Result<Identity, LedgerError> {
        let identity = self.identity()?;
        if !identity.is_admin() {
            return Err(LedgerError::Unauthorized);
        }
        Ok(identity)
    }

    /// Open an account for the caller with a zero balance.
    pub fn open_account(
        &self,
        kind: AccountKind,
        currency: Currency,
    ) -> Result<Account, LedgerError> {
        let identity = self.identity()?;
        let account = Account::open(identity.user_id, kind, currency);

        let created = self.store.with_unit_of_work(&mut |uow| {
            uow.insert_account(&account)?;
            Ok(account.clone())
        })?;

        tracing::info!(account = %created.id, user = %created.user_id, "account opened");
        Ok(created)
    }

    /// Open an account for any user with a starting balance. Admin only.
    pub fn provision_account(
        &self,
        owner: &str,
        kind: AccountKind,
        currency: Currency,
        opening_balance: Money,
    ) -> Result<Account, LedgerError> {
        self.require_admin()?;
        if opening_balance.is_negative() {
            return Err(LedgerError::InvalidAmount(MoneyError::NotPositive(
                opening_balance.value(),
            )));
        }
        let account = Account::provisioned(owner, kind, currency, opening_balance);

        let created = self.store.with_unit_of_work(&mut |uow| {
            uow.insert_account(&account)?;
            Ok(account.clone())
        })?;

        tracing::info!(
            account = %created.id,
            user = %created.user_id,
            opening_balance = %created.opening_balance,
            "account provisioned"
        );
        Ok(created)
    }

    /// Deposit funds. The record is created pending and advanced to
    /// completed within the same unit of work; deposits never remain
    /// visibly pending.
    pub fn deposit(
        &self,
        account_id: &str,
        amount: Money,
        description: Option<String>,
    ) -> Result<DepositOutcome, LedgerError> {
        let identity = self.identity()?;
        amount.require_operation_amount()?;

        let outcome = self.store.with_unit_of_work(&mut |uow| {
            let account = uow.account(account_id)?;
            check_access(&account, &identity)?;
            if !account.is_active() {
                return Err(LedgerError::AccountNotActive(account.id.clone()));
            }

            let mut record = Transaction::new(
                &account.id,
                TransactionKind::Deposit,
                amount,
                Some(description.clone().unwrap_or_else(|| "Deposit".to_string())),
            );
            uow.insert_transaction(&record)?;

            let new_balance = record
                .apply_effect(&account.balance)
                .ok_or(LedgerError::InvalidAmount(MoneyError::Overflow))?;
            let updated = uow.set_balance(&account.id, Some(&account.balance), &new_balance)?;

            record.status = TransactionStatus::Completed;
            record.balance_after = Some(updated.balance);
            uow.update_transaction(&record)?;

            Ok(DepositOutcome {
                transaction: record,
                new_balance: updated.balance,
            })
        })?;

        tracing::info!(
            account = %account_id,
            amount = %amount,
            balance = %outcome.new_balance,
            "deposit completed"
        );
        Ok(outcome)
    }

    /// Request a withdrawal. The record stays pending and the balance is
    /// not debited until an administrator approves it. Fails without
    /// creating a record when funds are already insufficient.
    pub fn request_withdrawal(
        &self,
        account_id: &str,
        amount: Money,
        description: Option<String>,
    ) -> Result<Transaction, LedgerError> {
        let identity = self.identity()?;
        amount.require_operation_amount()?;

        let record = self.store.with_unit_of_work(&mut |uow| {
            let account = uow.account(account_id)?;
            if !account.is_owned_by(&identity.user_id) {
                return Err(LedgerError::AccountNotFound(account_id.to_string()));
            }
            if !account.is_active() {
                return Err(LedgerError::AccountNotActive(account.id.clone()));
            }
            if !account.allow_withdrawals {
                return Err(LedgerError::WithdrawalsFrozen);
            }
            if account.balance < amount {
                return Err(LedgerError::InsufficientFunds {
                    available: account.balance.to_string(),
                    required: amount.to_string(),
                });
            }

            let mut record = Transaction::new(
                &account.id,
                TransactionKind::Withdrawal,
                amount,
                Some(
                    description
                        .clone()
                        .unwrap_or_else(|| "Withdrawal request".to_string()),
                ),
            );
            // Request-time snapshot; the balance itself is untouched.
            record.balance_after = Some(account.balance);
            uow.insert_transaction(&record)?;

            Ok(record)
        })?;

        tracing::info!(
            account = %account_id,
            transaction = %record.id,
            amount = %amount,
            "withdrawal requested"
        );
        Ok(record)
    }

    /// Approve a pending transaction and apply its balance effect. Admin
    /// only. For debits the sufficient-funds check is repeated at approval
    /// time, since the balance may have drifted since the request; a failed
    /// check aborts the whole unit of work with no partial effect.
    pub fn approve_transaction(
        &self,
        transaction_id: &str,
        custom_date: Option<String>,
    ) -> Result<Transaction, LedgerError> {
        self.require_admin()?;

        let record = self.store.with_unit_of_work(&mut |uow| {
            let mut record = uow.transaction(transaction_id)?;
            if record.status.is_terminal() {
                return Err(LedgerError::AlreadyProcessed(record.id.clone()));
            }

            let account = uow.account(&record.account_id)?;
            if record.kind.is_debit() && account.balance < record.amount {
                return Err(LedgerError::InsufficientFunds {
                    available: account.balance.to_string(),
                    required: record.amount.to_string(),
                });
            }

            let new_balance = record
                .apply_effect(&account.balance)
                .ok_or(LedgerError::InvalidAmount(MoneyError::Overflow))?;
            let updated = uow.set_balance(&account.id, Some(&account.balance), &new_balance)?;

            record.status = TransactionStatus::Completed;
            record.balance_after = Some(updated.balance);
            if let Some(date) = custom_date.clone() {
                record.display_date = date;
            }
            uow.update_transaction(&record)?;

            Ok(record)
        })?;

        tracing::info!(
            transaction = %record.id,
            account = %record.account_id,
            "transaction approved"
        );
        Ok(record)
    }

    /// Reject a pending transaction. Admin only. No balance change: a
    /// pending withdrawal was never debited, so there is nothing to reverse.
    pub fn reject_transaction(&self, transaction_id: &str) -> Result<Transaction, LedgerError> {
        self.require_admin()?;

        let record = self.store.with_unit_of_work(&mut |uow| {
            let mut record = uow.transaction(transaction_id)?;
            if record.status.is_terminal() {
                return Err(LedgerError::AlreadyProcessed(record.id.clone()));
            }

            record.status = TransactionStatus::Failed;
            uow.update_transaction(&record)?;

            Ok(record)
        })?;

        tracing::info!(transaction = %record.id, "transaction rejected");
        Ok(record)
    }

    /// Insert a completed transaction directly, with a caller-supplied
    /// display date. Admin only. The sufficient-funds check is bypassed by
    /// design; a debit entry may drive the balance negative.
    pub fn admin_entry(
        &self,
        account_id: &str,
        kind: TransactionKind,
        amount: Money,
        description: Option<String>,
        display_date: String,
    ) -> Result<Transaction, LedgerError> {
        self.require_admin()?;
        amount.require_operation_amount()?;

        let record = self.store.with_unit_of_work(&mut |uow| {
            let account = uow.account(account_id)?;

            let mut record = Transaction::new(
                &account.id,
                kind,
                amount,
                Some(
                    description
                        .clone()
                        .unwrap_or_else(|| "Admin entry".to_string()),
                ),
            );
            let new_balance = record
                .apply_effect(&account.balance)
                .ok_or(LedgerError::InvalidAmount(MoneyError::Overflow))?;

            record.status = TransactionStatus::Completed;
            record.balance_after = Some(new_balance);
            record.display_date = display_date.clone();
            uow.insert_transaction(&record)?;
            uow.set_balance(&account.id, Some(&account.balance), &new_balance)?;

            Ok(record)
        })?;

        tracing::warn!(
            account = %account_id,
            transaction = %record.id,
            kind = %kind,
            "administrative entry inserted"
        );
        Ok(record)
    }

    /// Write the account balance directly, bypassing the transaction log.
    /// Admin only. Privileged escape hatch: subsequent [`Self::audit_account`]
    /// calls will report the drift it creates.
    pub fn set_account_balance(
        &self,
        account_id: &str,
        new_balance: Money,
    ) -> Result<Account, LedgerError> {
        self.require_admin()?;

        let account = self
            .store
            .with_unit_of_work(&mut |uow| Ok(uow.set_balance(account_id, None, &new_balance)?))?;

        tracing::warn!(
            account = %account.id,
            balance = %account.balance,
            "balance overridden outside the transaction log"
        );
        Ok(account)
    }

    /// Toggle the withdrawal freeze flag. Admin only. Blocks new withdrawal
    /// requests; pending ones are not rolled back.
    pub fn toggle_withdrawals(
        &self,
        account_id: &str,
        allowed: bool,
    ) -> Result<Account, LedgerError> {
        self.require_admin()?;

        let account = self
            .store
            .with_unit_of_work(&mut |uow| Ok(uow.set_withdrawals_allowed(account_id, allowed)?))?;

        tracing::info!(account = %account.id, allowed, "withdrawal flag updated");
        Ok(account)
    }

    /// Change the account lifecycle status. Admin only.
    pub fn set_account_status(
        &self,
        account_id: &str,
        status: AccountStatus,
    ) -> Result<Account, LedgerError> {
        self.require_admin()?;

        let account = self
            .store
            .with_unit_of_work(&mut |uow| Ok(uow.set_status(account_id, status)?))?;

        tracing::info!(account = %account.id, status = %status, "account status updated");
        Ok(account)
    }

    /// Overwrite a transaction's display date. Admin only. Arbitrary text
    /// is accepted; status, balances and the immutable creation instant are
    /// untouched, so history shown in display order may stop matching
    /// causal order.
    pub fn update_display_date(
        &self,
        transaction_id: &str,
        display_date: String,
    ) -> Result<Transaction, LedgerError> {
        self.require_admin()?;

        let record = self.store.with_unit_of_work(&mut |uow| {
            let mut record = uow.transaction(transaction_id)?;
            record.display_date = display_date.clone();
            uow.update_transaction(&record)?;
            Ok(record)
        })?;

        tracing::info!(transaction = %record.id, "display date updated");
        Ok(record)
    }

    /// Fetch one account. Owner or admin.
    pub fn account(&self, account_id: &str) -> Result<Account, LedgerError> {
        let identity = self.identity()?;
        self.store.with_unit_of_work(&mut |uow| {
            let account = uow.account(account_id)?;
            check_access(&account, &identity)?;
            Ok(account)
        })
    }

    /// The caller's accounts, in insertion order.
    pub fn my_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        let identity = self.identity()?;
        self.store
            .with_unit_of_work(&mut |uow| Ok(uow.accounts_by_owner(&identity.user_id)?))
    }

    /// Every account in the system. Admin only.
    pub fn all_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        self.require_admin()?;
        self.store.with_unit_of_work(&mut |uow| Ok(uow.all_accounts()?))
    }

    /// Transaction history for display, `display_date` descending. Owner or
    /// admin. Display order is an administrative choice and is not
    /// guaranteed to match causal order.
    pub fn list_transactions(
        &self,
        account_id: &str,
        limit: usize,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let identity = self.identity()?;
        self.store.with_unit_of_work(&mut |uow| {
            let account = uow.account(account_id)?;
            check_access(&account, &identity)?;
            Ok(uow.transactions_by_display_order(&account.id, limit)?)
        })
    }

    /// All pending transactions across accounts. Admin only.
    pub fn pending_transactions(&self) -> Result<Vec<Transaction>, LedgerError> {
        self.require_admin()?;
        self.store
            .with_unit_of_work(&mut |uow| Ok(uow.pending_transactions()?))
    }

    /// Every transaction across accounts. Admin only.
    pub fn all_transactions(&self) -> Result<Vec<Transaction>, LedgerError> {
        self.require_admin()?;
        self.store
            .with_unit_of_work(&mut |uow| Ok(uow.all_transactions()?))
    }

    /// Replay an account's completed history and compare with the stored
    /// balance. Owner or admin.
    pub fn audit_account(&self, account_id: &str) -> Result<AuditReport, LedgerError> {
        let identity = self.identity()?;
        self.store.with_unit_of_work(&mut |uow| {
            let account = uow.account(account_id)?;
            check_access(&account, &identity)?;

            let history = uow.transactions_in_creation_order(&account.id)?;
            let mut replayed = account.opening_balance;
            let mut completed_count = 0;
            for record in history
                .iter()
                .filter(|t| t.status == TransactionStatus::Completed)
            {
                replayed = record
                    .apply_effect(&replayed)
                    .ok_or(LedgerError::InvalidAmount(MoneyError::Overflow))?;
                completed_count += 1;
            }

            Ok(AuditReport {
                account_id: account.id,
                stored_balance: account.balance,
                replayed_balance: replayed,
                completed_count,
            })
        })
    }
}

/// Owner-or-admin access check. Non-owners learn nothing beyond "not found",
/// matching what the lookup itself would have told them.
fn check_access(account: &Account, identity: &Identity) -> Result<(), LedgerError> {
    if identity.is_admin() || account.is_owned_by(&identity.user_id) {
        Ok(())
    } else {
        Err(LedgerError::AccountNotFound(account.id.clone()))
    }
}
