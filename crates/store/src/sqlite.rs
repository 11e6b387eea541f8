//! SQLite storage backend
//!
//! Monetary values and timestamps are stored as TEXT; enums as their
//! lowercase names. Every unit of work runs inside an IMMEDIATE database
//! transaction, so concurrent writers serialize on the database write lock
//! and a failed scope rolls back completely.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, Transaction as SqlTransaction, TransactionBehavior};

use demobank_core::Money;
use demobank_ledger::{
    Account, AccountStatus, LedgerError, LedgerStore, StoreError, Transaction, TransactionStatus,
    UnitOfWork,
};

/// Durable store backed by a SQLite database file
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", "ON").map_err(db_err)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LedgerStore for SqliteStore {
    fn with_unit_of_work<R>(
        &self,
        op: &mut dyn FnMut(&mut dyn UnitOfWork) -> Result<R, LedgerError>,
    ) -> Result<R, LedgerError> {
        let mut conn = self.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err)
            .map_err(LedgerError::from)?;

        let outcome = {
            let mut uow = SqliteUnitOfWork { tx: &tx };
            op(&mut uow)
        };

        match outcome {
            Ok(value) => {
                tx.commit().map_err(db_err)?;
                Ok(value)
            }
            Err(err) => {
                let _ = tx.rollback();
                Err(err)
            }
        }
    }
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS accounts (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            account_number TEXT NOT NULL UNIQUE,
            kind TEXT NOT NULL,
            balance TEXT NOT NULL,
            opening_balance TEXT NOT NULL,
            currency TEXT NOT NULL,
            status TEXT NOT NULL,
            allow_withdrawals INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )
    .map_err(db_err)?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_accounts_user ON accounts(user_id)",
        [],
    )
    .map_err(db_err)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            account_id TEXT NOT NULL REFERENCES accounts(id),
            kind TEXT NOT NULL,
            amount TEXT NOT NULL,
            description TEXT,
            balance_after TEXT,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            display_date TEXT NOT NULL
        )",
        [],
    )
    .map_err(db_err)?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_account ON transactions(account_id)",
        [],
    )
    .map_err(db_err)?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_status ON transactions(status)",
        [],
    )
    .map_err(db_err)?;

    Ok(())
}

struct SqliteUnitOfWork<'a, 'c> {
    tx: &'a SqlTransaction<'c>,
}

const ACCOUNT_COLUMNS: &str = "id, user_id, account_number, kind, balance, opening_balance, \
                               currency, status, allow_withdrawals, created_at, updated_at";

const TRANSACTION_COLUMNS: &str =
    "id, account_id, kind, amount, description, balance_after, status, created_at, display_date";

type RawAccount = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    i64,
    String,
    String,
);

type RawTransaction = (
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    String,
    String,
    String,
);

impl UnitOfWork for SqliteUnitOfWork<'_, '_> {
    fn insert_account(&mut self, account: &Account) -> Result<(), StoreError> {
        self.tx
            .execute(
                "INSERT INTO accounts
                 (id, user_id, account_number, kind, balance, opening_balance,
                  currency, status, allow_withdrawals, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    account.id,
                    account.user_id,
                    account.account_number,
                    account.kind.to_string(),
                    account.balance.to_string(),
                    account.opening_balance.to_string(),
                    account.currency.code(),
                    account.status.to_string(),
                    account.allow_withdrawals,
                    account.created_at.to_rfc3339(),
                    account.updated_at.to_rfc3339(),
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn account(&mut self, id: &str) -> Result<Account, StoreError> {
        let mut stmt = self
            .tx
            .prepare(&format!(
                "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"
            ))
            .map_err(db_err)?;

        let raw = stmt
            .query_row(params![id], read_account_row)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::AccountNotFound(id.to_string()),
                other => db_err(other),
            })?;

        parse_account(raw)
    }

    fn accounts_by_owner(&mut self, user_id: &str) -> Result<Vec<Account>, StoreError> {
        let mut stmt = self
            .tx
            .prepare(&format!(
                "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE user_id = ?1 ORDER BY rowid ASC"
            ))
            .map_err(db_err)?;

        let raws: Vec<RawAccount> = stmt
            .query_map(params![user_id], read_account_row)
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        raws.into_iter().map(parse_account).collect()
    }

    fn all_accounts(&mut self) -> Result<Vec<Account>, StoreError> {
        let mut stmt = self
            .tx
            .prepare(&format!(
                "SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY rowid ASC"
            ))
            .map_err(db_err)?;

        let raws: Vec<RawAccount> = stmt
            .query_map([], read_account_row)
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        raws.into_iter().map(parse_account).collect()
    }

    fn set_balance(
        &mut self,
        id: &str,
        expected: Option<&Money>,
        new_balance: &Money,
    ) -> Result<Account, StoreError> {
        let current = self.account(id)?;
        if let Some(expected) = expected {
            if current.balance != *expected {
                return Err(StoreError::Conflict(id.to_string()));
            }
        }

        self.tx
            .execute(
                "UPDATE accounts SET balance = ?1, updated_at = ?2 WHERE id = ?3",
                params![new_balance.to_string(), Utc::now().to_rfc3339(), id],
            )
            .map_err(db_err)?;

        self.account(id)
    }

    fn set_withdrawals_allowed(&mut self, id: &str, allowed: bool) -> Result<Account, StoreError> {
        let rows = self
            .tx
            .execute(
                "UPDATE accounts SET allow_withdrawals = ?1, updated_at = ?2 WHERE id = ?3",
                params![allowed, Utc::now().to_rfc3339(), id],
            )
            .map_err(db_err)?;
        if rows == 0 {
            return Err(StoreError::AccountNotFound(id.to_string()));
        }
        self.account(id)
    }

    fn set_status(&mut self, id: &str, status: AccountStatus) -> Result<Account, StoreError> {
        let rows = self
            .tx
            .execute(
                "UPDATE accounts SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.to_string(), Utc::now().to_rfc3339(), id],
            )
            .map_err(db_err)?;
        if rows == 0 {
            return Err(StoreError::AccountNotFound(id.to_string()));
        }
        self.account(id)
    }

    fn insert_transaction(&mut self, tx: &Transaction) -> Result<(), StoreError> {
        self.tx
            .execute(
                "INSERT INTO transactions
                 (id, account_id, kind, amount, description, balance_after,
                  status, created_at, display_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    tx.id,
                    tx.account_id,
                    tx.kind.to_string(),
                    tx.amount.to_string(),
                    tx.description,
                    tx.balance_after.map(|m| m.to_string()),
                    tx.status.to_string(),
                    tx.created_at.to_rfc3339(),
                    tx.display_date,
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn transaction(&mut self, id: &str) -> Result<Transaction, StoreError> {
        let mut stmt = self
            .tx
            .prepare(&format!(
                "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?1"
            ))
            .map_err(db_err)?;

        let raw = stmt
            .query_row(params![id], read_transaction_row)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    StoreError::TransactionNotFound(id.to_string())
                }
                other => db_err(other),
            })?;

        parse_transaction(raw)
    }

    fn update_transaction(&mut self, tx: &Transaction) -> Result<(), StoreError> {
        // account_id and created_at are immutable once written.
        let rows = self
            .tx
            .execute(
                "UPDATE transactions
                 SET kind = ?1, amount = ?2, description = ?3, balance_after = ?4,
                     status = ?5, display_date = ?6
                 WHERE id = ?7",
                params![
                    tx.kind.to_string(),
                    tx.amount.to_string(),
                    tx.description,
                    tx.balance_after.map(|m| m.to_string()),
                    tx.status.to_string(),
                    tx.display_date,
                    tx.id,
                ],
            )
            .map_err(db_err)?;
        if rows == 0 {
            return Err(StoreError::TransactionNotFound(tx.id.clone()));
        }
        Ok(())
    }

    fn transactions_by_display_order(
        &mut self,
        account_id: &str,
        limit: usize,
    ) -> Result<Vec<Transaction>, StoreError> {
        let mut stmt = self
            .tx
            .prepare(&format!(
                "SELECT {TRANSACTION_COLUMNS} FROM transactions
                 WHERE account_id = ?1 ORDER BY display_date DESC LIMIT ?2"
            ))
            .map_err(db_err)?;

        let raws: Vec<RawTransaction> = stmt
            .query_map(params![account_id, limit as i64], read_transaction_row)
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        raws.into_iter().map(parse_transaction).collect()
    }

    fn transactions_in_creation_order(
        &mut self,
        account_id: &str,
    ) -> Result<Vec<Transaction>, StoreError> {
        let mut stmt = self
            .tx
            .prepare(&format!(
                "SELECT {TRANSACTION_COLUMNS} FROM transactions
                 WHERE account_id = ?1 ORDER BY rowid ASC"
            ))
            .map_err(db_err)?;

        let raws: Vec<RawTransaction> = stmt
            .query_map(params![account_id], read_transaction_row)
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        raws.into_iter().map(parse_transaction).collect()
    }

    fn pending_transactions(&mut self) -> Result<Vec<Transaction>, StoreError> {
        let mut stmt = self
            .tx
            .prepare(&format!(
                "SELECT {TRANSACTION_COLUMNS} FROM transactions
                 WHERE status = ?1 ORDER BY display_date DESC"
            ))
            .map_err(db_err)?;

        let raws: Vec<RawTransaction> = stmt
            .query_map(
                params![TransactionStatus::Pending.to_string()],
                read_transaction_row,
            )
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        raws.into_iter().map(parse_transaction).collect()
    }

    fn all_transactions(&mut self) -> Result<Vec<Transaction>, StoreError> {
        let mut stmt = self
            .tx
            .prepare(&format!(
                "SELECT {TRANSACTION_COLUMNS} FROM transactions ORDER BY display_date DESC"
            ))
            .map_err(db_err)?;

        let raws: Vec<RawTransaction> = stmt
            .query_map([], read_transaction_row)
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        raws.into_iter().map(parse_transaction).collect()
    }
}

fn read_account_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawAccount> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
    ))
}

fn parse_account(raw: RawAccount) -> Result<Account, StoreError> {
    Ok(Account {
        id: raw.0,
        user_id: raw.1,
        account_number: raw.2,
        kind: parse_field(&raw.3, "account kind")?,
        balance: parse_money(&raw.4)?,
        opening_balance: parse_money(&raw.5)?,
        currency: parse_field(&raw.6, "currency")?,
        status: parse_field(&raw.7, "account status")?,
        allow_withdrawals: raw.8 != 0,
        created_at: parse_instant(&raw.9)?,
        updated_at: parse_instant(&raw.10)?,
    })
}

fn read_transaction_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawTransaction> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
    ))
}

fn parse_transaction(raw: RawTransaction) -> Result<Transaction, StoreError> {
    Ok(Transaction {
        id: raw.0,
        account_id: raw.1,
        kind: parse_field(&raw.2, "transaction kind")?,
        amount: parse_money(&raw.3)?,
        description: raw.4,
        balance_after: raw.5.as_deref().map(parse_money).transpose()?,
        status: parse_field(&raw.6, "transaction status")?,
        created_at: parse_instant(&raw.7)?,
        display_date: raw.8,
    })
}

fn parse_money(text: &str) -> Result<Money, StoreError> {
    text.parse()
        .map_err(|_| StoreError::Corrupted(format!("money value: {text}")))
}

fn parse_instant(text: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| StoreError::Corrupted(format!("timestamp: {text}")))
}

fn parse_field<T: std::str::FromStr>(text: &str, what: &str) -> Result<T, StoreError> {
    text.parse()
        .map_err(|_| StoreError::Corrupted(format!("{what}: {text}")))
}

fn db_err(err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                StoreError::Conflict("database busy".to_string())
            }
            ErrorCode::ConstraintViolation => StoreError::Duplicate(err.to_string()),
            _ => StoreError::Backend(err.to_string()),
        },
        _ => StoreError::Backend(err.to_string()),
    }
}
