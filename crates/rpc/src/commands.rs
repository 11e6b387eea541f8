//! CLI commands
//!
//! Thin renderers over the engine: parse nothing, decide nothing, print the
//! result. The 2-decimal currency formatting lives here on purpose; stored
//! values keep their full 4-digit scale.

use demobank_core::{Currency, Money};
use demobank_ledger::{Account, AccountKind, AccountStatus, Transaction, TransactionKind};

use crate::context::AppContext;

/// Presentation formatting: two decimals, full scale stays in storage.
fn display_amount(amount: &Money) -> String {
    format!("{:.2}", amount.value())
}

fn print_account_line(account: &Account) {
    println!(
        "  {}  #{}  {:8}  {:9}  {} {}  withdrawals: {}",
        account.id,
        account.account_number,
        account.kind.to_string(),
        account.status.to_string(),
        display_amount(&account.balance),
        account.currency,
        if account.allow_withdrawals { "allowed" } else { "frozen" },
    );
}

fn print_transaction_line(tx: &Transaction) {
    let balance_after = tx
        .balance_after
        .as_ref()
        .map(display_amount)
        .unwrap_or_else(|| "-".to_string());
    println!(
        "  {}  {:10}  {:9}  {:>12}  after: {:>12}  {}",
        tx.id,
        tx.kind.to_string(),
        tx.status.to_string(),
        display_amount(&tx.amount),
        balance_after,
        tx.display_date,
    );
}

pub fn open_account(
    ctx: &AppContext,
    kind: AccountKind,
    currency: Currency,
) -> Result<(), anyhow::Error> {
    let account = ctx.engine.open_account(kind, currency)?;
    println!(
        "✅ Opened {} account #{} ({})",
        account.kind, account.account_number, account.id
    );
    Ok(())
}

pub fn provision(
    ctx: &AppContext,
    owner: &str,
    kind: AccountKind,
    currency: Currency,
    opening_balance: Money,
) -> Result<(), anyhow::Error> {
    let account = ctx
        .engine
        .provision_account(owner, kind, currency, opening_balance)?;
    println!(
        "✅ Provisioned {} account #{} for {} with {} {}",
        account.kind,
        account.account_number,
        owner,
        display_amount(&account.balance),
        account.currency,
    );
    Ok(())
}

pub fn deposit(
    ctx: &AppContext,
    account_id: &str,
    amount: Money,
    description: Option<String>,
) -> Result<(), anyhow::Error> {
    let outcome = ctx.engine.deposit(account_id, amount, description)?;
    println!(
        "✅ Deposited {} (balance: {}, transaction: {})",
        display_amount(&amount),
        display_amount(&outcome.new_balance),
        outcome.transaction.id,
    );
    Ok(())
}

pub fn withdraw(
    ctx: &AppContext,
    account_id: &str,
    amount: Money,
    description: Option<String>,
) -> Result<(), anyhow::Error> {
    let request = ctx
        .engine
        .request_withdrawal(account_id, amount, description)?;
    println!(
        "✅ Withdrawal of {} requested (transaction: {}). Contact the bank to approve withdrawals.",
        display_amount(&amount),
        request.id,
    );
    Ok(())
}

pub fn approve(
    ctx: &AppContext,
    transaction_id: &str,
    custom_date: Option<String>,
) -> Result<(), anyhow::Error> {
    let record = ctx.engine.approve_transaction(transaction_id, custom_date)?;
    let balance_after = record
        .balance_after
        .as_ref()
        .map(display_amount)
        .unwrap_or_else(|| "-".to_string());
    println!("✅ Approved {} (balance after: {})", record.id, balance_after);
    Ok(())
}

pub fn reject(ctx: &AppContext, transaction_id: &str) -> Result<(), anyhow::Error> {
    let record = ctx.engine.reject_transaction(transaction_id)?;
    println!("✅ Rejected {} (no balance change)", record.id);
    Ok(())
}

pub fn admin_entry(
    ctx: &AppContext,
    account_id: &str,
    kind: TransactionKind,
    amount: Money,
    description: Option<String>,
    date: String,
) -> Result<(), anyhow::Error> {
    let record = ctx
        .engine
        .admin_entry(account_id, kind, amount, description, date)?;
    let balance_after = record
        .balance_after
        .as_ref()
        .map(display_amount)
        .unwrap_or_else(|| "-".to_string());
    println!(
        "✅ Inserted {} entry {} dated {} (balance after: {})",
        record.kind, record.id, record.display_date, balance_after,
    );
    Ok(())
}

pub fn set_balance(
    ctx: &AppContext,
    account_id: &str,
    balance: Money,
) -> Result<(), anyhow::Error> {
    let account = ctx.engine.set_account_balance(account_id, balance)?;
    println!(
        "✅ Balance of {} set to {} (outside the transaction log)",
        account.id,
        display_amount(&account.balance),
    );
    Ok(())
}

pub fn set_withdrawals(
    ctx: &AppContext,
    account_id: &str,
    allowed: bool,
) -> Result<(), anyhow::Error> {
    let account = ctx.engine.toggle_withdrawals(account_id, allowed)?;
    println!(
        "✅ Account {} {}",
        account.id,
        if allowed { "unfrozen" } else { "frozen" },
    );
    Ok(())
}

pub fn set_status(
    ctx: &AppContext,
    account_id: &str,
    status: AccountStatus,
) -> Result<(), anyhow::Error> {
    let account = ctx.engine.set_account_status(account_id, status)?;
    println!("✅ Account {} is now {}", account.id, account.status);
    Ok(())
}

pub fn redate(
    ctx: &AppContext,
    transaction_id: &str,
    date: String,
) -> Result<(), anyhow::Error> {
    let record = ctx.engine.update_display_date(transaction_id, date)?;
    println!("✅ Transaction {} now displays as {}", record.id, record.display_date);
    Ok(())
}

pub fn accounts(ctx: &AppContext) -> Result<(), anyhow::Error> {
    let accounts = ctx.engine.my_accounts()?;
    if accounts.is_empty() {
        println!("No accounts.");
        return Ok(());
    }
    for account in &accounts {
        print_account_line(account);
    }
    Ok(())
}

pub fn all_accounts(ctx: &AppContext) -> Result<(), anyhow::Error> {
    let accounts = ctx.engine.all_accounts()?;
    println!("{} account(s):", accounts.len());
    for account in &accounts {
        print_account_line(account);
    }
    Ok(())
}

pub fn history(ctx: &AppContext, account_id: &str, limit: usize) -> Result<(), anyhow::Error> {
    let records = ctx.engine.list_transactions(account_id, limit)?;
    if records.is_empty() {
        println!("No transactions.");
        return Ok(());
    }
    for record in &records {
        print_transaction_line(record);
    }
    Ok(())
}

pub fn pending(ctx: &AppContext) -> Result<(), anyhow::Error> {
    let records = ctx.engine.pending_transactions()?;
    println!("{} pending transaction(s):", records.len());
    for record in &records {
        print_transaction_line(record);
    }
    Ok(())
}

pub fn all_history(ctx: &AppContext) -> Result<(), anyhow::Error> {
    let records = ctx.engine.all_transactions()?;
    println!("{} transaction(s):", records.len());
    for record in &records {
        print_transaction_line(record);
    }
    Ok(())
}

pub fn audit(ctx: &AppContext, account_id: &str) -> Result<(), anyhow::Error> {
    let report = ctx.engine.audit_account(account_id)?;
    if report.is_consistent() {
        println!(
            "✅ Ledger consistent: {} completed transaction(s) replay to {}",
            report.completed_count,
            display_amount(&report.stored_balance),
        );
    } else {
        println!(
            "⚠️ Ledger drift on {}: stored {} but replay gives {} over {} completed transaction(s)",
            report.account_id,
            display_amount(&report.stored_balance),
            display_amount(&report.replayed_balance),
            report.completed_count,
        );
    }
    Ok(())
}
