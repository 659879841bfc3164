//! Sets up the application's SQLite database.

use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::{
    Error, account::create_account_table, auth::create_session_table,
    transaction::create_transaction_tables, user::create_user_table,
};

/// How long a connection waits for another connection's write lock before
/// giving up with [Error::Conflict].
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Set the per-connection options the application relies on.
///
/// Foreign keys are enforced and writers wait up to [BUSY_TIMEOUT] for each other.
///
/// # Errors
/// Returns an error if a pragma could not be set.
pub fn configure_connection(connection: &Connection) -> Result<(), Error> {
    connection.pragma_update(None, "foreign_keys", "ON")?;
    connection.busy_timeout(BUSY_TIMEOUT)?;

    Ok(())
}

/// Configure `connection` and create the tables for the domain models if they do not exist.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    configure_connection(connection)?;

    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_session_table(&transaction)?;
    create_account_table(&transaction)?;
    create_transaction_tables(&transaction)?;

    transaction.commit()?;

    Ok(())
}
