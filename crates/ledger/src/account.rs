//! Account - Balance-holding entity owned by one user

use chrono::{DateTime, Utc};
use demobank_core::{Currency, Money};
use rand::Rng;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

/// Lifecycle status of an account.
///
/// Closure is a status change; accounts are never hard-deleted by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Suspended,
    Closed,
}

/// Product kind of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Checking,
    Savings,
}

/// A balance-holding account.
///
/// # Invariants
/// - `balance` is only ever written through [`crate::store::UnitOfWork::set_balance`]
///   inside the unit of work that also records the paired transaction
///   (administrative override excepted).
/// - `allow_withdrawals` is independent of `status`: an active account can
///   still be withdrawal-frozen.
/// - `opening_balance` is fixed at creation and is the starting point for
///   ledger replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    /// Owning user; a user may own several accounts.
    pub user_id: String,
    /// Unique 10-digit display number.
    pub account_number: String,
    pub kind: AccountKind,
    pub balance: Money,
    pub opening_balance: Money,
    pub currency: Currency,
    pub status: AccountStatus,
    pub allow_withdrawals: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Open a fresh account with a zero balance.
    pub fn open(user_id: impl Into<String>, kind: AccountKind, currency: Currency) -> Self {
        Self::provisioned(user_id, kind, currency, Money::ZERO)
    }

    /// Open an account with a starting balance (administrative provisioning).
    pub fn provisioned(
        user_id: impl Into<String>,
        kind: AccountKind,
        currency: Currency,
        opening_balance: Money,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            account_number: generate_account_number(),
            kind,
            balance: opening_balance,
            opening_balance,
            currency,
            status: AccountStatus::Active,
            allow_withdrawals: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the account accepts balance-affecting customer operations
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Whether `user_id` owns this account
    #[inline]
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

/// Generate a 10-digit account number
fn generate_account_number() -> String {
    let digits: u64 = rand::thread_rng().gen_range(0..10_000_000_000);
    format!("{:010}", digits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_open_defaults() {
        let account = Account::open("user-1", AccountKind::Checking, Currency::Usd);

        assert_eq!(account.status, AccountStatus::Active);
        assert!(account.allow_withdrawals);
        assert!(account.balance.is_zero());
        assert!(account.opening_balance.is_zero());
        assert!(account.is_owned_by("user-1"));
        assert!(!account.is_owned_by("user-2"));
    }

    #[test]
    fn test_provisioned_records_opening_balance() {
        let opening = Money::new(dec!(5000));
        let account =
            Account::provisioned("user-1", AccountKind::Savings, Currency::Usd, opening);

        assert_eq!(account.balance, opening);
        assert_eq!(account.opening_balance, opening);
    }

    #[test]
    fn test_account_number_is_ten_digits() {
        let account = Account::open("user-1", AccountKind::Checking, Currency::Usd);

        assert_eq!(account.account_number.len(), 10);
        assert!(account.account_number.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_status_text_roundtrip() {
        assert_eq!(AccountStatus::Active.to_string(), "active");
        assert_eq!(
            "suspended".parse::<AccountStatus>().unwrap(),
            AccountStatus::Suspended
        );
        assert_eq!(AccountKind::Checking.to_string(), "checking");
        assert_eq!("savings".parse::<AccountKind>().unwrap(), AccountKind::Savings);
    }
}
