//! Transaction - Record of a balance-affecting event
//!
//! State machine: `pending → completed | failed`. Deposits are created
//! pending and advanced to completed within the same unit of work;
//! withdrawals stay pending until an administrator approves or rejects them.

use chrono::{DateTime, Utc};
use demobank_core::Money;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

/// Kind of balance effect. The sign is implied by the kind; `amount` is
/// always a positive magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    Transfer,
}

impl TransactionKind {
    /// Whether this kind subtracts from the account balance
    pub fn is_debit(&self) -> bool {
        matches!(self, TransactionKind::Withdrawal | TransactionKind::Transfer)
    }
}

/// Lifecycle status; `completed` and `failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    /// Terminal states admit no further transitions
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

/// A single entry in an account's transaction log.
///
/// `created_at` is the immutable creation instant and fixes the record's
/// position for ledger replay. `display_date` is a mutable presentation
/// field: administrators may overwrite it with arbitrary text, so history
/// ordered by it is not guaranteed to match causal order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub account_id: String,
    pub kind: TransactionKind,
    /// Strictly positive magnitude; sign comes from `kind`.
    pub amount: Money,
    pub description: Option<String>,
    /// Balance snapshot once the record reached its accounting effect.
    /// For a pending withdrawal this holds the request-time balance, which
    /// the request did not change.
    pub balance_after: Option<Money>,
    pub status: TransactionStatus,
    /// Immutable creation instant; replay ordering key.
    pub created_at: DateTime<Utc>,
    /// Mutable presentation ordering key, RFC 3339 text by default.
    pub display_date: String,
}

impl Transaction {
    /// Create a pending transaction record.
    pub fn new(
        account_id: impl Into<String>,
        kind: TransactionKind,
        amount: Money,
        description: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.into(),
            kind,
            amount,
            description,
            balance_after: None,
            status: TransactionStatus::Pending,
            created_at: now,
            display_date: now.to_rfc3339(),
        }
    }

    /// Apply this record's signed effect to `balance`.
    ///
    /// Returns None on arithmetic overflow. No sufficient-funds judgement is
    /// made here; the result may be negative.
    pub fn apply_effect(&self, balance: &Money) -> Option<Money> {
        if self.kind.is_debit() {
            balance.checked_sub(&self.amount)
        } else {
            balance.checked_add(&self.amount)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn money(value: rust_decimal::Decimal) -> Money {
        Money::new(value)
    }

    #[test]
    fn test_new_is_pending_with_display_date() {
        let tx = Transaction::new(
            "acc-1",
            TransactionKind::Deposit,
            money(dec!(10)),
            Some("Deposit".to_string()),
        );

        assert_eq!(tx.status, TransactionStatus::Pending);
        assert!(tx.balance_after.is_none());
        assert_eq!(tx.display_date, tx.created_at.to_rfc3339());
    }

    #[test]
    fn test_signed_effect_per_kind() {
        let balance = money(dec!(100));

        let deposit = Transaction::new("acc-1", TransactionKind::Deposit, money(dec!(25.5)), None);
        assert_eq!(deposit.apply_effect(&balance).unwrap(), money(dec!(125.5)));

        let withdrawal =
            Transaction::new("acc-1", TransactionKind::Withdrawal, money(dec!(60)), None);
        assert_eq!(withdrawal.apply_effect(&balance).unwrap(), money(dec!(40)));

        let transfer = Transaction::new("acc-1", TransactionKind::Transfer, money(dec!(130)), None);
        let after = transfer.apply_effect(&balance).unwrap();
        assert!(after.is_negative());
        assert_eq!(after, money(dec!(-30)));
    }

    #[test]
    fn test_terminal_states() {
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(TransactionStatus::Completed.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_text_roundtrip() {
        assert_eq!(TransactionStatus::Pending.to_string(), "pending");
        assert_eq!(
            "completed".parse::<TransactionStatus>().unwrap(),
            TransactionStatus::Completed
        );
        assert_eq!(TransactionKind::Withdrawal.to_string(), "withdrawal");
        assert_eq!(
            "transfer".parse::<TransactionKind>().unwrap(),
            TransactionKind::Transfer
        );
    }
}
