//! Defines the append-only transaction log: the base transaction records, their
//! kind-specific detail records and the queries that read them back.

use rusqlite::{Connection, Row, params, params_from_iter, types::Type};
use serde::Serialize;
use time::{Date, OffsetDateTime};

use crate::{
    Error, Money,
    account::{Account, map_row_to_account_with_offset},
    database_id::{AccountId, TransactionId},
};

// ============================================================================
// MODELS
// ============================================================================

/// The fields shared by every kind of transaction.
///
/// Base transactions are immutable once written and are always stored
/// together with exactly one [TransactionDetail].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaseTransaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The account the transaction was recorded against. For transfers this is the sender.
    pub account_id: AccountId,
    /// The magnitude of the transaction, always greater than zero.
    ///
    /// The kind of the transaction decides whether the amount is added to or
    /// subtracted from the account balance.
    pub amount: Money,
    /// A free-text description of what the transaction was for.
    pub note: String,
    /// When the transaction happened.
    pub date: Date,
    /// When the transaction was recorded.
    pub created_at: OffsetDateTime,
}

/// What kind of transaction a [BaseTransaction] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionDetail {
    /// Money spent, decreases the account balance.
    Expense,
    /// Money earned, increases the account balance.
    Income,
    /// Money moved from the base account to `recipient_account_id`.
    Transfer {
        /// The account that receives the money. It may belong to any user.
        recipient_account_id: AccountId,
    },
}

/// A transaction read back from the log, with its detail and a snapshot of
/// the account it was recorded against.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    /// The shared transaction fields.
    #[serde(flatten)]
    pub transaction: BaseTransaction,
    /// The kind of the transaction.
    #[serde(flatten)]
    pub detail: TransactionDetail,
    /// The account the transaction was recorded against, as it is now.
    pub account: Account,
}

// ============================================================================
// DATABASE
// ============================================================================

/// Create the tables for base transactions and each kind of transaction detail.
pub fn create_transaction_tables(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS base_transaction (
            id INTEGER PRIMARY KEY,
            account_id INTEGER NOT NULL,
            amount INTEGER NOT NULL CHECK (amount > 0),
            note TEXT NOT NULL,
            date TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(account_id) REFERENCES account(id) ON UPDATE CASCADE ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_base_transaction_account_id
            ON base_transaction(account_id);

        CREATE TABLE IF NOT EXISTS expense_transaction (
            id INTEGER PRIMARY KEY,
            FOREIGN KEY(id) REFERENCES base_transaction(id) ON UPDATE CASCADE ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS income_transaction (
            id INTEGER PRIMARY KEY,
            FOREIGN KEY(id) REFERENCES base_transaction(id) ON UPDATE CASCADE ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS transfer_transaction (
            id INTEGER PRIMARY KEY,
            recipient_account_id INTEGER NOT NULL,
            FOREIGN KEY(id) REFERENCES base_transaction(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(recipient_account_id) REFERENCES account(id) ON UPDATE CASCADE ON DELETE CASCADE
        );",
    )
}

fn is_foreign_key_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                ..
            },
            _,
        )
    )
}

/// Append a transaction and its detail to the log inside the open SQL `transaction`.
///
/// This is the only way to write to the log. Taking a single detail value
/// means a base record can never receive zero or two details, and because
/// both rows are written in the caller's SQL transaction a base record is
/// never visible without its detail.
///
/// # Errors
/// Returns an:
/// - [Error::NonPositiveAmount] if `amount` is zero or negative,
/// - [Error::AccountNotFound] if the account, or the recipient of a transfer, does not exist,
/// - [Error::SqlError] if there is some other SQL error.
pub(crate) fn append_transaction(
    transaction: &rusqlite::Transaction,
    account_id: AccountId,
    amount: Money,
    note: &str,
    date: Date,
    detail: TransactionDetail,
) -> Result<BaseTransaction, Error> {
    let base = append_base(transaction, account_id, amount, note, date)?;

    match detail {
        TransactionDetail::Expense => attach_expense_detail(transaction, base.id)?,
        TransactionDetail::Income => attach_income_detail(transaction, base.id)?,
        TransactionDetail::Transfer {
            recipient_account_id,
        } => attach_transfer_detail(transaction, base.id, recipient_account_id)?,
    }

    Ok(base)
}

fn append_base(
    transaction: &rusqlite::Transaction,
    account_id: AccountId,
    amount: Money,
    note: &str,
    date: Date,
) -> Result<BaseTransaction, Error> {
    if !amount.is_positive() {
        return Err(Error::NonPositiveAmount(amount));
    }

    let created_at = OffsetDateTime::now_utc();

    transaction
        .prepare(
            "INSERT INTO base_transaction (account_id, amount, note, date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING id, account_id, amount, note, date, created_at",
        )?
        .query_row(
            params![account_id, amount, note, date, created_at],
            map_row_to_base_transaction,
        )
        .map_err(|error| {
            if is_foreign_key_violation(&error) {
                Error::AccountNotFound(account_id)
            } else {
                error.into()
            }
        })
}

fn attach_expense_detail(
    transaction: &rusqlite::Transaction,
    base_id: TransactionId,
) -> Result<(), Error> {
    transaction.execute("INSERT INTO expense_transaction (id) VALUES (?1)", [base_id])?;

    Ok(())
}

fn attach_income_detail(
    transaction: &rusqlite::Transaction,
    base_id: TransactionId,
) -> Result<(), Error> {
    transaction.execute("INSERT INTO income_transaction (id) VALUES (?1)", [base_id])?;

    Ok(())
}

fn attach_transfer_detail(
    transaction: &rusqlite::Transaction,
    base_id: TransactionId,
    recipient_account_id: AccountId,
) -> Result<(), Error> {
    transaction
        .execute(
            "INSERT INTO transfer_transaction (id, recipient_account_id) VALUES (?1, ?2)",
            [base_id, recipient_account_id],
        )
        .map_err(|error| {
            if is_foreign_key_violation(&error) {
                Error::AccountNotFound(recipient_account_id)
            } else {
                error.into()
            }
        })?;

    Ok(())
}

fn map_row_to_base_transaction(row: &Row) -> Result<BaseTransaction, rusqlite::Error> {
    Ok(BaseTransaction {
        id: row.get(0)?,
        account_id: row.get(1)?,
        amount: row.get(2)?,
        note: row.get(3)?,
        date: row.get(4)?,
        created_at: row.get(5)?,
    })
}

const KIND_COLUMN: usize = 6;
const ACCOUNT_COLUMN_OFFSET: usize = 8;

fn map_row_to_transaction_record(row: &Row) -> Result<TransactionRecord, rusqlite::Error> {
    let transaction = map_row_to_base_transaction(row)?;

    let kind: String = row.get(KIND_COLUMN)?;
    let detail = match kind.as_str() {
        "expense" => TransactionDetail::Expense,
        "income" => TransactionDetail::Income,
        "transfer" => TransactionDetail::Transfer {
            recipient_account_id: row.get(KIND_COLUMN + 1)?,
        },
        _ => {
            return Err(rusqlite::Error::InvalidColumnType(
                KIND_COLUMN,
                kind,
                Type::Text,
            ));
        }
    };

    let account = map_row_to_account_with_offset(row, ACCOUNT_COLUMN_OFFSET)?;

    Ok(TransactionRecord {
        transaction,
        detail,
        account,
    })
}

/// Get every transaction recorded against one of `account_ids`, newest first.
///
/// Transactions are ordered by date, then by ID, both descending.
/// Base records that do not have exactly one detail are never returned.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn list_for_accounts(
    account_ids: &[AccountId],
    connection: &Connection,
) -> Result<Vec<TransactionRecord>, Error> {
    if account_ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; account_ids.len()].join(", ");
    let query = format!(
        "SELECT
            base.id, base.account_id, base.amount, base.note, base.date, base.created_at,
            CASE
                WHEN expense.id IS NOT NULL THEN 'expense'
                WHEN income.id IS NOT NULL THEN 'income'
                ELSE 'transfer'
            END,
            transfer.recipient_account_id,
            account.id, account.user_id, account.name, account.account_type, account.balance
        FROM base_transaction base
        INNER JOIN account ON account.id = base.account_id
        LEFT JOIN expense_transaction expense ON expense.id = base.id
        LEFT JOIN income_transaction income ON income.id = base.id
        LEFT JOIN transfer_transaction transfer ON transfer.id = base.id
        WHERE base.account_id IN ({placeholders})
            AND (expense.id IS NOT NULL) + (income.id IS NOT NULL) + (transfer.id IS NOT NULL) = 1
        ORDER BY base.date DESC, base.id DESC"
    );

    connection
        .prepare(&query)?
        .query_map(
            params_from_iter(account_ids.iter()),
            map_row_to_transaction_record,
        )?
        .map(|maybe_record| maybe_record.map_err(Error::from))
        .collect()
}
