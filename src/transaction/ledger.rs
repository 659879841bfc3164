//! The ledger applies transactions to account balances.
//!
//! Each operation runs in a single `IMMEDIATE` SQLite transaction: the write
//! lock is taken up front, the log entry and every balance change are written,
//! and then the whole unit is committed. If any step fails the SQL transaction
//! is dropped without committing, which rolls back every earlier step.

use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error, Money, UserID,
    account::{Account, adjust_balance, get_account, get_account_for_user},
    database_id::AccountId,
    transaction::core::{BaseTransaction, TransactionDetail, append_transaction},
};

/// The data needed to record an expense or an income.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    /// The account to record the transaction against.
    pub account_id: AccountId,
    /// How much money was spent or earned, must be greater than zero.
    pub amount: Money,
    /// A free-text description.
    #[serde(default)]
    pub note: String,
    /// When the transaction happened.
    pub date: Date,
}

/// The data needed to record a transfer between two accounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransfer {
    /// The account the money leaves. Must be owned by the user recording the transfer.
    pub sender_account_id: AccountId,
    /// The account the money arrives in. May be owned by any user.
    pub recipient_account_id: AccountId,
    /// How much money was moved, must be greater than zero.
    pub amount: Money,
    /// A free-text description.
    #[serde(default)]
    pub note: String,
    /// When the transfer happened.
    pub date: Date,
}

/// The result of a committed ledger operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    /// The new log entry.
    #[serde(flatten)]
    pub transaction: BaseTransaction,
    /// The kind of the new log entry.
    #[serde(flatten)]
    pub detail: TransactionDetail,
    /// Every account whose balance changed, after the change.
    pub updated_accounts: Vec<Account>,
}

fn require_positive(amount: Money) -> Result<(), Error> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(Error::NonPositiveAmount(amount))
    }
}

/// Record money spent from one of `user_id`'s accounts and decrease its balance by the amount.
///
/// # Errors
/// Returns an:
/// - [Error::NonPositiveAmount] if the amount is zero or negative,
/// - [Error::AccountNotFound] if the account does not exist or belongs to another user,
/// - [Error::Conflict] if another connection held the database for longer than the busy timeout,
/// - [Error::SqlError] if there is some other SQL error.
///
/// Nothing is written if an error is returned.
pub fn record_expense(
    user_id: UserID,
    expense: &NewTransaction,
    connection: &mut Connection,
) -> Result<LedgerEntry, Error> {
    record_single_account(
        user_id,
        expense,
        TransactionDetail::Expense,
        -expense.amount,
        connection,
    )
}

/// Record money earned into one of `user_id`'s accounts and increase its balance by the amount.
///
/// # Errors
/// Returns the same errors as [record_expense]. Nothing is written if an error is returned.
pub fn record_income(
    user_id: UserID,
    income: &NewTransaction,
    connection: &mut Connection,
) -> Result<LedgerEntry, Error> {
    record_single_account(
        user_id,
        income,
        TransactionDetail::Income,
        income.amount,
        connection,
    )
}

fn record_single_account(
    user_id: UserID,
    new_transaction: &NewTransaction,
    detail: TransactionDetail,
    balance_delta: Money,
    connection: &mut Connection,
) -> Result<LedgerEntry, Error> {
    require_positive(new_transaction.amount)?;

    let sql_transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;

    get_account_for_user(new_transaction.account_id, user_id, &sql_transaction)?;

    let transaction = append_transaction(
        &sql_transaction,
        new_transaction.account_id,
        new_transaction.amount,
        &new_transaction.note,
        new_transaction.date,
        detail,
    )?;
    let account = adjust_balance(new_transaction.account_id, balance_delta, &sql_transaction)?;

    sql_transaction.commit()?;

    tracing::info!(
        "Recorded {:?} {} of {} against account {}",
        detail,
        transaction.id,
        transaction.amount,
        account.id
    );

    Ok(LedgerEntry {
        transaction,
        detail,
        updated_accounts: vec![account],
    })
}

/// Move money from one of `user_id`'s accounts to any other account.
///
/// The sender's balance decreases and the recipient's balance increases by the
/// same amount, so the sum of all balances is unchanged. Either both balances
/// and the log entry are written, or nothing is.
///
/// # Errors
/// Returns an:
/// - [Error::NonPositiveAmount] if the amount is zero or negative,
/// - [Error::SelfTransfer] if the sender and recipient are the same account,
/// - [Error::SenderAccountNotFound] if the sender does not exist or belongs to another user,
/// - [Error::RecipientAccountNotFound] if the recipient does not exist,
/// - [Error::Conflict] if another connection held the database for longer than the busy timeout,
/// - [Error::SqlError] if there is some other SQL error.
pub fn record_transfer(
    user_id: UserID,
    transfer: &NewTransfer,
    connection: &mut Connection,
) -> Result<LedgerEntry, Error> {
    let sender_id = transfer.sender_account_id;
    let recipient_id = transfer.recipient_account_id;

    require_positive(transfer.amount)?;

    if sender_id == recipient_id {
        return Err(Error::SelfTransfer(sender_id));
    }

    let sql_transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;

    get_account_for_user(sender_id, user_id, &sql_transaction).map_err(|error| match error {
        Error::AccountNotFound(_) => Error::SenderAccountNotFound(sender_id),
        error => error,
    })?;
    get_account(recipient_id, &sql_transaction).map_err(|error| match error {
        Error::AccountNotFound(_) => Error::RecipientAccountNotFound(recipient_id),
        error => error,
    })?;

    let detail = TransactionDetail::Transfer {
        recipient_account_id: recipient_id,
    };
    let transaction = append_transaction(
        &sql_transaction,
        sender_id,
        transfer.amount,
        &transfer.note,
        transfer.date,
        detail,
    )?;
    let sender = adjust_balance(sender_id, -transfer.amount, &sql_transaction)?;
    let recipient = adjust_balance(recipient_id, transfer.amount, &sql_transaction)?;

    sql_transaction.commit()?;

    if sender.user_id != recipient.user_id {
        tracing::info!(
            "Transfer {} moved money between users {} and {}",
            transaction.id,
            sender.user_id,
            recipient.user_id
        );
    }
    tracing::info!(
        "Recorded transfer {} of {} from account {sender_id} to account {recipient_id}",
        transaction.id,
        transaction.amount
    );

    Ok(LedgerEntry {
        transaction,
        detail,
        updated_accounts: vec![sender, recipient],
    })
}
