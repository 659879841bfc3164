//! Read-only views over the accounts and transactions of a user.

use rusqlite::Connection;

use crate::{
    Error, UserID,
    account::{Account, get_accounts_for_user},
    database_id::AccountId,
    transaction::core::{TransactionRecord, list_for_accounts},
};

/// Get every account owned by `user_id`, ordered by ID.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn accounts_for_user(user_id: UserID, connection: &Connection) -> Result<Vec<Account>, Error> {
    get_accounts_for_user(user_id, connection)
}

/// Get every transaction recorded against an account owned by `user_id`, newest first.
///
/// A user without accounts has no transactions, which is not an error.
/// Transfers into the user's accounts from accounts owned by other users are
/// listed under the sender only.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn transactions_for_user(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<TransactionRecord>, Error> {
    let account_ids: Vec<AccountId> = get_accounts_for_user(user_id, connection)?
        .iter()
        .map(|account| account.id)
        .collect();

    if account_ids.is_empty() {
        return Ok(Vec::new());
    }

    list_for_accounts(&account_ids, connection)
}
