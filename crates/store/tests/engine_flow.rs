//! Engine scenario tests
//!
//! These run every ledger flow against both storage backends through the
//! same assertions: deposits, withdrawal requests, approvals, rejections,
//! freezes, admin overrides, auditing and authorization.

use std::sync::Arc;

use demobank_core::{Currency, Money};
use demobank_ledger::{
    Account, AccountKind, AccountStatus, Identity, LedgerEngine, LedgerError, SessionGate,
    TransactionKind, TransactionStatus,
};
use demobank_store::{MemoryStore, SqliteStore, Store};

fn money(text: &str) -> Money {
    text.parse().unwrap()
}

/// Run `test` once per backend.
fn with_backends(test: impl Fn(Arc<Store>)) {
    test(Arc::new(Store::Memory(MemoryStore::new())));
    test(Arc::new(Store::Sqlite(SqliteStore::in_memory().unwrap())));
}

fn engine_for(store: &Arc<Store>, identity: Option<Identity>) -> LedgerEngine<Arc<Store>> {
    LedgerEngine::new(Arc::clone(store), Arc::new(SessionGate::new(identity)))
}

fn admin(store: &Arc<Store>) -> LedgerEngine<Arc<Store>> {
    engine_for(store, Some(Identity::admin("ops")))
}

fn customer(store: &Arc<Store>, user: &str) -> LedgerEngine<Arc<Store>> {
    engine_for(store, Some(Identity::customer(user)))
}

fn provisioned(store: &Arc<Store>, user: &str, balance: &str) -> Account {
    admin(store)
        .provision_account(user, AccountKind::Checking, Currency::Usd, money(balance))
        .unwrap()
}

#[test]
fn test_deposit_completes_immediately() {
    with_backends(|store| {
        let account = provisioned(&store, "alice", "40");
        let alice = customer(&store, "alice");

        let outcome = alice.deposit(&account.id, money("25.50"), None).unwrap();
        assert_eq!(outcome.new_balance, money("65.5000"));
        assert_eq!(outcome.transaction.status, TransactionStatus::Completed);
        assert_eq!(outcome.transaction.balance_after, Some(money("65.5000")));

        // Never visibly pending: the admin pending queue stays empty.
        assert!(admin(&store).pending_transactions().unwrap().is_empty());
        assert_eq!(alice.account(&account.id).unwrap().balance, money("65.5000"));
    });
}

#[test]
fn test_pending_withdrawal_does_not_touch_balance() {
    with_backends(|store| {
        let account = provisioned(&store, "alice", "100");
        let alice = customer(&store, "alice");

        let request = alice
            .request_withdrawal(&account.id, money("60"), None)
            .unwrap();

        assert_eq!(request.status, TransactionStatus::Pending);
        assert_eq!(request.balance_after, Some(money("100.0000")));
        assert_eq!(alice.account(&account.id).unwrap().balance, money("100.0000"));
    });
}

#[test]
fn test_approval_applies_effect() {
    with_backends(|store| {
        let account = provisioned(&store, "alice", "100");
        let alice = customer(&store, "alice");
        let ops = admin(&store);

        let request = alice
            .request_withdrawal(&account.id, money("60"), None)
            .unwrap();
        let approved = ops.approve_transaction(&request.id, None).unwrap();

        assert_eq!(approved.status, TransactionStatus::Completed);
        assert_eq!(approved.balance_after, Some(money("40.0000")));
        assert_eq!(alice.account(&account.id).unwrap().balance, money("40.0000"));
    });
}

#[test]
fn test_insufficient_funds_at_request_creates_nothing() {
    with_backends(|store| {
        let account = provisioned(&store, "alice", "50");
        let alice = customer(&store, "alice");

        let result = alice.request_withdrawal(&account.id, money("60"), None);
        assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));

        assert_eq!(alice.account(&account.id).unwrap().balance, money("50.0000"));
        assert!(admin(&store).all_transactions().unwrap().is_empty());
    });
}

#[test]
fn test_insufficient_funds_at_approval_time() {
    with_backends(|store| {
        let account = provisioned(&store, "alice", "100");
        let alice = customer(&store, "alice");
        let ops = admin(&store);

        let request = alice
            .request_withdrawal(&account.id, money("60"), None)
            .unwrap();

        // Balance drifts below the requested amount before approval.
        ops.set_account_balance(&account.id, money("10")).unwrap();

        let result = ops.approve_transaction(&request.id, None);
        assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));

        // Whole unit of work rolled back: balance and record unchanged.
        assert_eq!(ops.account(&account.id).unwrap().balance, money("10.0000"));
        let pending = ops.pending_transactions().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, request.id);
    });
}

#[test]
fn test_rejection_is_a_balance_noop() {
    with_backends(|store| {
        let account = provisioned(&store, "alice", "100");
        let alice = customer(&store, "alice");
        let ops = admin(&store);

        let request = alice
            .request_withdrawal(&account.id, money("60"), None)
            .unwrap();
        let rejected = ops.reject_transaction(&request.id).unwrap();

        assert_eq!(rejected.status, TransactionStatus::Failed);
        assert_eq!(alice.account(&account.id).unwrap().balance, money("100.0000"));
    });
}

#[test]
fn test_terminal_transactions_cannot_be_reprocessed() {
    with_backends(|store| {
        let account = provisioned(&store, "alice", "100");
        let alice = customer(&store, "alice");
        let ops = admin(&store);

        let request = alice
            .request_withdrawal(&account.id, money("60"), None)
            .unwrap();
        ops.approve_transaction(&request.id, None).unwrap();

        assert!(matches!(
            ops.approve_transaction(&request.id, None),
            Err(LedgerError::AlreadyProcessed(_))
        ));
        assert!(matches!(
            ops.reject_transaction(&request.id),
            Err(LedgerError::AlreadyProcessed(_))
        ));

        // No double debit happened.
        assert_eq!(ops.account(&account.id).unwrap().balance, money("40.0000"));
    });
}

#[test]
fn test_freeze_blocks_new_requests_only() {
    with_backends(|store| {
        let account = provisioned(&store, "alice", "100");
        let alice = customer(&store, "alice");
        let ops = admin(&store);

        let pending = alice
            .request_withdrawal(&account.id, money("10"), None)
            .unwrap();

        ops.toggle_withdrawals(&account.id, false).unwrap();

        let result = alice.request_withdrawal(&account.id, money("10"), None);
        assert!(matches!(result, Err(LedgerError::WithdrawalsFrozen)));

        // Deposits are unaffected and the earlier request is not rolled back.
        alice.deposit(&account.id, money("5"), None).unwrap();
        assert_eq!(
            ops.pending_transactions().unwrap().first().map(|t| t.id.clone()),
            Some(pending.id.clone())
        );

        // Unfreezing restores requests.
        ops.toggle_withdrawals(&account.id, true).unwrap();
        alice
            .request_withdrawal(&account.id, money("10"), None)
            .unwrap();
    });
}

#[test]
fn test_inactive_account_rejects_operations() {
    with_backends(|store| {
        let account = provisioned(&store, "alice", "100");
        let alice = customer(&store, "alice");
        let ops = admin(&store);

        ops.set_account_status(&account.id, AccountStatus::Suspended)
            .unwrap();

        assert!(matches!(
            alice.deposit(&account.id, money("5"), None),
            Err(LedgerError::AccountNotActive(_))
        ));
        assert!(matches!(
            alice.request_withdrawal(&account.id, money("5"), None),
            Err(LedgerError::AccountNotActive(_))
        ));
    });
}

#[test]
fn test_authorization_boundaries() {
    with_backends(|store| {
        let account = provisioned(&store, "alice", "100");
        let alice = customer(&store, "alice");
        let mallory = customer(&store, "mallory");
        let anonymous = engine_for(&store, None);

        // No session at all.
        assert!(matches!(
            anonymous.deposit(&account.id, money("5"), None),
            Err(LedgerError::Unauthorized)
        ));

        // Customers cannot run admin operations.
        let request = alice
            .request_withdrawal(&account.id, money("10"), None)
            .unwrap();
        assert!(matches!(
            alice.approve_transaction(&request.id, None),
            Err(LedgerError::Unauthorized)
        ));
        assert!(matches!(
            alice.set_account_balance(&account.id, money("1")),
            Err(LedgerError::Unauthorized)
        ));

        // Non-owners learn nothing beyond "not found".
        assert!(matches!(
            mallory.account(&account.id),
            Err(LedgerError::AccountNotFound(_))
        ));
        assert!(matches!(
            mallory.request_withdrawal(&account.id, money("10"), None),
            Err(LedgerError::AccountNotFound(_))
        ));
    });
}

#[test]
fn test_amount_bounds_are_enforced() {
    with_backends(|store| {
        let account = provisioned(&store, "alice", "100");
        let alice = customer(&store, "alice");

        assert!(matches!(
            alice.deposit(&account.id, money("0"), None),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            alice.deposit(&account.id, money("1000000.0001"), None),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            admin(&store).admin_entry(
                &account.id,
                TransactionKind::Deposit,
                money("-5"),
                None,
                "2024-01-01T00:00:00+00:00".to_string(),
            ),
            Err(LedgerError::InvalidAmount(_))
        ));
    });
}

#[test]
fn test_admin_entry_bypasses_funds_check() {
    with_backends(|store| {
        let account = provisioned(&store, "alice", "10");
        let ops = admin(&store);

        let entry = ops
            .admin_entry(
                &account.id,
                TransactionKind::Withdrawal,
                money("60"),
                Some("Chargeback".to_string()),
                "2020-06-01T00:00:00+00:00".to_string(),
            )
            .unwrap();

        assert_eq!(entry.status, TransactionStatus::Completed);
        assert_eq!(entry.balance_after, Some(money("-50.0000")));
        assert_eq!(entry.display_date, "2020-06-01T00:00:00+00:00");

        let balance = ops.account(&account.id).unwrap().balance;
        assert!(balance.is_negative());
        assert_eq!(balance, money("-50.0000"));

        // The backdated entry still replays: the ledger stays consistent.
        let report = ops.audit_account(&account.id).unwrap();
        assert!(report.is_consistent());
    });
}

#[test]
fn test_replay_reproduces_stored_balance() {
    with_backends(|store| {
        let account = provisioned(&store, "alice", "100");
        let alice = customer(&store, "alice");
        let ops = admin(&store);

        alice.deposit(&account.id, money("25.50"), None).unwrap();
        let request = alice
            .request_withdrawal(&account.id, money("60"), None)
            .unwrap();
        ops.approve_transaction(&request.id, None).unwrap();
        let failed = alice
            .request_withdrawal(&account.id, money("30"), None)
            .unwrap();
        ops.reject_transaction(&failed.id).unwrap();
        ops.admin_entry(
            &account.id,
            TransactionKind::Transfer,
            money("5.5"),
            None,
            "2019-01-01T00:00:00+00:00".to_string(),
        )
        .unwrap();

        // 100 + 25.50 - 60 - 5.50; the rejected request contributes nothing.
        let report = ops.audit_account(&account.id).unwrap();
        assert!(report.is_consistent());
        assert_eq!(report.stored_balance, money("60.0000"));
        assert_eq!(report.completed_count, 3);
    });
}

#[test]
fn test_balance_override_shows_up_in_audit() {
    with_backends(|store| {
        let account = provisioned(&store, "alice", "100");
        let ops = admin(&store);

        ops.set_account_balance(&account.id, money("999")).unwrap();

        let report = ops.audit_account(&account.id).unwrap();
        assert!(!report.is_consistent());
        assert_eq!(report.stored_balance, money("999.0000"));
        assert_eq!(report.replayed_balance, money("100.0000"));
    });
}

#[test]
fn test_redating_changes_display_order_not_replay() {
    with_backends(|store| {
        let account = provisioned(&store, "alice", "0");
        let alice = customer(&store, "alice");
        let ops = admin(&store);

        let first = alice.deposit(&account.id, money("10"), None).unwrap();
        alice.deposit(&account.id, money("20"), None).unwrap();

        // Push the older deposit to the top of the displayed history with an
        // arbitrary (not even parseable) date string.
        ops.update_display_date(&first.transaction.id, "Z-sorts-last".to_string())
            .unwrap();

        let history = alice.list_transactions(&account.id, 50).unwrap();
        assert_eq!(history[0].id, first.transaction.id);

        // Replay ignores the cosmetic edit.
        let report = ops.audit_account(&account.id).unwrap();
        assert!(report.is_consistent());
        assert_eq!(report.stored_balance, money("30.0000"));
    });
}

#[test]
fn test_history_limit_and_ownership() {
    with_backends(|store| {
        let account = provisioned(&store, "alice", "0");
        let alice = customer(&store, "alice");

        for _ in 0..5 {
            alice.deposit(&account.id, money("1"), None).unwrap();
        }

        assert_eq!(alice.list_transactions(&account.id, 3).unwrap().len(), 3);
        assert_eq!(alice.list_transactions(&account.id, 50).unwrap().len(), 5);

        // Admin sees the same history without owning the account.
        assert_eq!(
            admin(&store).list_transactions(&account.id, 50).unwrap().len(),
            5
        );
    });
}

#[test]
fn test_accounts_listing() {
    with_backends(|store| {
        let ops = admin(&store);
        let checking = provisioned(&store, "alice", "10");
        let savings = ops
            .provision_account("alice", AccountKind::Savings, Currency::Usd, money("20"))
            .unwrap();
        provisioned(&store, "bob", "30");

        let alice = customer(&store, "alice");
        let mine = alice.my_accounts().unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].id, checking.id);
        assert_eq!(mine[1].id, savings.id);

        assert_eq!(ops.all_accounts().unwrap().len(), 3);
        assert!(matches!(
            alice.all_accounts(),
            Err(LedgerError::Unauthorized)
        ));
    });
}

#[test]
fn test_concurrent_deposits_serialize() {
    with_backends(|store| {
        let account = provisioned(&store, "alice", "100");

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let store = Arc::clone(&store);
                let account_id = account.id.clone();
                scope.spawn(move || {
                    let alice = customer(&store, "alice");
                    for _ in 0..5 {
                        alice.deposit(&account_id, money("1"), None).unwrap();
                    }
                });
            }
        });

        let ops = admin(&store);
        assert_eq!(ops.account(&account.id).unwrap().balance, money("120.0000"));
        let report = ops.audit_account(&account.id).unwrap();
        assert!(report.is_consistent());
        assert_eq!(report.completed_count, 20);
    });
}
