//! Defines the account model and the database queries that own account balances.

use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};

use crate::{Error, Money, UserID, database_id::AccountId};

/// A financial account owned by a user, e.g. a checking account or a credit card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    /// The id for the account.
    pub id: AccountId,
    /// The user that owns the account.
    pub user_id: UserID,
    /// The display name of the account.
    pub name: String,
    /// A free-form category such as "checking", "savings" or "credit".
    #[serde(rename = "type")]
    pub account_type: String,
    /// The current balance.
    ///
    /// This is the initial balance plus the effect of every transaction
    /// recorded against the account, unless it was overridden with
    /// [update_account].
    pub balance: Money,
}

/// The data needed to create an account.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewAccount {
    /// The display name of the account.
    pub name: String,
    /// A free-form category such as "checking", "savings" or "credit".
    #[serde(rename = "type")]
    pub account_type: String,
    /// The balance of the account when it is created, zero if not given.
    #[serde(default)]
    pub balance: Money,
}

/// A set of direct changes to an account. Fields that are `None` are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AccountChanges {
    /// The new display name.
    pub name: Option<String>,
    /// The new account type.
    #[serde(rename = "type")]
    pub account_type: Option<String>,
    /// The new balance, replacing the current balance outright.
    pub balance: Option<Money>,
}

fn require_non_empty<'a>(field_name: &'static str, value: &'a str) -> Result<&'a str, Error> {
    let value = value.trim();

    if value.is_empty() {
        Err(Error::EmptyField(field_name))
    } else {
        Ok(value)
    }
}

pub fn create_account_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS account (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            account_type TEXT NOT NULL,
            balance INTEGER NOT NULL CHECK (typeof(balance) = 'integer'),
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_account_user_id ON account(user_id)",
        (),
    )?;

    Ok(())
}

const ACCOUNT_COLUMNS: &str = "id, user_id, name, account_type, balance";

pub fn map_row_to_account(row: &Row) -> Result<Account, rusqlite::Error> {
    map_row_to_account_with_offset(row, 0)
}

/// Read an account from `row` starting at column `offset`.
///
/// Useful when the account columns follow the columns of a joined table.
pub fn map_row_to_account_with_offset(
    row: &Row,
    offset: usize,
) -> Result<Account, rusqlite::Error> {
    let id = row.get(offset)?;
    let user_id = UserID::new(row.get(offset + 1)?);
    let name = row.get(offset + 2)?;
    let account_type = row.get(offset + 3)?;
    let balance = row.get(offset + 4)?;

    Ok(Account {
        id,
        user_id,
        name,
        account_type,
        balance,
    })
}

/// Create a new account for `user_id`.
///
/// Names do not need to be unique.
///
/// # Errors
/// Returns an [Error::EmptyField] if the name or type is empty, or an
/// [Error::SqlError] if there is some other SQL error.
pub fn create_account(
    user_id: UserID,
    new_account: &NewAccount,
    connection: &Connection,
) -> Result<Account, Error> {
    let name = require_non_empty("name", &new_account.name)?;
    let account_type = require_non_empty("type", &new_account.account_type)?;

    let account = connection
        .prepare(&format!(
            "INSERT INTO account (user_id, name, account_type, balance)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING {ACCOUNT_COLUMNS}"
        ))?
        .query_row(
            params![user_id.as_i64(), name, account_type, new_account.balance],
            map_row_to_account,
        )?;

    Ok(account)
}

/// Get the account with `account_id`, regardless of who owns it.
///
/// # Errors
/// Returns an [Error::AccountNotFound] if the account does not exist.
pub fn get_account(account_id: AccountId, connection: &Connection) -> Result<Account, Error> {
    connection
        .prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM account WHERE id = ?1"
        ))?
        .query_row([account_id], map_row_to_account)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::AccountNotFound(account_id),
            error => error.into(),
        })
}

/// Get the account with `account_id` if it is owned by `user_id`.
///
/// # Errors
/// Returns an [Error::AccountNotFound] if the account does not exist or
/// belongs to another user. The two cases are not distinguished so that
/// users cannot discover the accounts of other users.
pub fn get_account_for_user(
    account_id: AccountId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Account, Error> {
    match get_account(account_id, connection) {
        Ok(account) if account.user_id == user_id => Ok(account),
        Ok(_) => Err(Error::AccountNotFound(account_id)),
        Err(error) => Err(error),
    }
}

/// Get all accounts owned by `user_id`, ordered by ID.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn get_accounts_for_user(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<Account>, Error> {
    connection
        .prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM account WHERE user_id = ?1 ORDER BY id"
        ))?
        .query_map([user_id.as_i64()], map_row_to_account)?
        .map(|maybe_account| maybe_account.map_err(Error::from))
        .collect()
}

/// Overwrite the name, type and/or balance of an account owned by `user_id`.
///
/// This is an unchecked escape hatch that does not go through the ledger.
/// Setting the balance directly means the balance may no longer equal the
/// initial balance plus the recorded transactions, which is accepted.
///
/// # Errors
/// Returns an:
/// - [Error::EmptyField] if a new name or type is given but empty,
/// - [Error::AccountNotFound] if the account does not exist or belongs to another user,
/// - [Error::SqlError] if there is some other SQL error.
pub fn update_account(
    account_id: AccountId,
    user_id: UserID,
    changes: &AccountChanges,
    connection: &Connection,
) -> Result<Account, Error> {
    let name = changes
        .name
        .as_deref()
        .map(|name| require_non_empty("name", name))
        .transpose()?;
    let account_type = changes
        .account_type
        .as_deref()
        .map(|account_type| require_non_empty("type", account_type))
        .transpose()?;

    let account = connection
        .prepare(&format!(
            "UPDATE account
             SET name = COALESCE(?1, name),
                 account_type = COALESCE(?2, account_type),
                 balance = COALESCE(?3, balance)
             WHERE id = ?4 AND user_id = ?5
             RETURNING {ACCOUNT_COLUMNS}"
        ))?
        .query_row(
            params![
                name,
                account_type,
                changes.balance,
                account_id,
                user_id.as_i64()
            ],
            map_row_to_account,
        )
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::AccountNotFound(account_id),
            error => error.into(),
        })?;

    if let Some(balance) = changes.balance {
        tracing::warn!(
            "Balance of account {account_id} was set directly to {balance}, \
            it may no longer match the account's transactions"
        );
    }

    Ok(account)
}

/// Add `delta` to the balance of `account_id` and return the updated account.
///
/// The addition happens inside a single SQL statement, so the latest
/// committed balance is always used and concurrent adjustments are never lost.
///
/// # Errors
/// Returns an [Error::AccountNotFound] if the account does not exist, or an
/// [Error::SqlError] if there is some other SQL error, including when the new
/// balance would overflow.
pub fn adjust_balance(
    account_id: AccountId,
    delta: Money,
    connection: &Connection,
) -> Result<Account, Error> {
    connection
        .prepare(&format!(
            "UPDATE account SET balance = balance + ?1 WHERE id = ?2 RETURNING {ACCOUNT_COLUMNS}"
        ))?
        .query_row(params![delta, account_id], map_row_to_account)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::AccountNotFound(account_id),
            error => error.into(),
        })
}


#[cfg(test)]
mod account_tests {
    use std::str::FromStr;

    use email_address::EmailAddress;
    use rusqlite::Connection;

    use crate::{Error, Money, PasswordHash, UserID, db::initialize, user::create_user};

    use super::{
        AccountChanges, NewAccount, adjust_balance, create_account, get_account,
        get_account_for_user, get_accounts_for_user, update_account,
    };

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    fn must_create_user(email: &str, connection: &Connection) -> UserID {
        create_user(
            "Test User",
            &EmailAddress::from_str(email).unwrap(),
            PasswordHash::new_unchecked("hunter2"),
            connection,
        )
        .unwrap()
        .id
    }

    fn new_account(name: &str, balance: i64) -> NewAccount {
        NewAccount {
            name: name.to_owned(),
            account_type: "checking".to_owned(),
            balance: Money::from_cents(balance),
        }
    }

    #[test]
    fn can_create_account() {
        let conn = get_test_connection();
        let user_id = must_create_user("foo@bar.baz", &conn);

        let account = create_account(user_id, &new_account("  Everyday ", 123_45), &conn).unwrap();

        assert!(account.id > 0);
        assert_eq!(account.user_id, user_id);
        assert_eq!(account.name, "Everyday");
        assert_eq!(account.account_type, "checking");
        assert_eq!(account.balance, Money::from_cents(123_45));
        assert_eq!(get_account(account.id, &conn), Ok(account));
    }

    #[test]
    fn create_account_allows_duplicate_names() {
        let conn = get_test_connection();
        let user_id = must_create_user("foo@bar.baz", &conn);

        let first = create_account(user_id, &new_account("Savings", 0), &conn).unwrap();
        let second = create_account(user_id, &new_account("Savings", 0), &conn).unwrap();

        assert_ne!(first.id, second.id);
    }

    #[test]
    fn create_account_fails_on_empty_name_or_type() {
        let conn = get_test_connection();
        let user_id = must_create_user("foo@bar.baz", &conn);

        let empty_name = create_account(user_id, &new_account(" ", 0), &conn);
        let empty_type = create_account(
            user_id,
            &NewAccount {
                account_type: "".to_owned(),
                ..new_account("Savings", 0)
            },
            &conn,
        );

        assert_eq!(empty_name, Err(Error::EmptyField("name")));
        assert_eq!(empty_type, Err(Error::EmptyField("type")));
    }

    #[test]
    fn get_accounts_for_user_only_returns_own_accounts() {
        let conn = get_test_connection();
        let alice = must_create_user("alice@example.com", &conn);
        let bob = must_create_user("bob@example.com", &conn);
        let want = vec![
            create_account(alice, &new_account("A1", 0), &conn).unwrap(),
            create_account(alice, &new_account("A2", 0), &conn).unwrap(),
        ];
        create_account(bob, &new_account("B1", 0), &conn).unwrap();

        let got = get_accounts_for_user(alice, &conn).unwrap();

        assert_eq!(want, got);
    }

    #[test]
    fn get_accounts_for_user_with_no_accounts_is_empty() {
        let conn = get_test_connection();
        let user_id = must_create_user("foo@bar.baz", &conn);

        assert_eq!(get_accounts_for_user(user_id, &conn), Ok(vec![]));
    }

    #[test]
    fn get_account_for_user_hides_other_users_accounts() {
        let conn = get_test_connection();
        let alice = must_create_user("alice@example.com", &conn);
        let bob = must_create_user("bob@example.com", &conn);
        let account = create_account(alice, &new_account("A1", 0), &conn).unwrap();

        assert_eq!(
            get_account_for_user(account.id, bob, &conn),
            Err(Error::AccountNotFound(account.id))
        );
        assert_eq!(get_account_for_user(account.id, alice, &conn), Ok(account));
    }

    #[test]
    fn update_account_changes_only_given_fields() {
        let conn = get_test_connection();
        let user_id = must_create_user("foo@bar.baz", &conn);
        let account = create_account(user_id, &new_account("Old", 10_00), &conn).unwrap();

        let updated = update_account(
            account.id,
            user_id,
            &AccountChanges {
                name: Some("New".to_owned()),
                ..Default::default()
            },
            &conn,
        )
        .unwrap();

        assert_eq!(updated.name, "New");
        assert_eq!(updated.account_type, account.account_type);
        assert_eq!(updated.balance, account.balance);
    }

    #[test]
    fn update_account_overrides_balance() {
        let conn = get_test_connection();
        let user_id = must_create_user("foo@bar.baz", &conn);
        let account = create_account(user_id, &new_account("Everyday", 10_00), &conn).unwrap();

        let updated = update_account(
            account.id,
            user_id,
            &AccountChanges {
                balance: Some(Money::from_cents(-5_00)),
                ..Default::default()
            },
            &conn,
        )
        .unwrap();

        assert_eq!(updated.balance, Money::from_cents(-5_00));
    }

    #[test]
    fn update_account_fails_for_missing_or_foreign_account() {
        let conn = get_test_connection();
        let alice = must_create_user("alice@example.com", &conn);
        let bob = must_create_user("bob@example.com", &conn);
        let account = create_account(alice, &new_account("A1", 0), &conn).unwrap();
        let changes = AccountChanges {
            name: Some("Stolen".to_owned()),
            ..Default::default()
        };

        assert_eq!(
            update_account(account.id + 1, alice, &changes, &conn),
            Err(Error::AccountNotFound(account.id + 1))
        );
        assert_eq!(
            update_account(account.id, bob, &changes, &conn),
            Err(Error::AccountNotFound(account.id))
        );
    }

    #[test]
    fn update_account_fails_on_empty_name() {
        let conn = get_test_connection();
        let user_id = must_create_user("foo@bar.baz", &conn);
        let account = create_account(user_id, &new_account("A1", 0), &conn).unwrap();

        let result = update_account(
            account.id,
            user_id,
            &AccountChanges {
                name: Some("".to_owned()),
                ..Default::default()
            },
            &conn,
        );

        assert_eq!(result, Err(Error::EmptyField("name")));
    }

    #[test]
    fn adjust_balance_adds_positive_and_negative_deltas() {
        let conn = get_test_connection();
        let user_id = must_create_user("foo@bar.baz", &conn);
        let account = create_account(user_id, &new_account("Everyday", 100_00), &conn).unwrap();

        adjust_balance(account.id, Money::from_cents(-30_00), &conn).unwrap();
        let updated = adjust_balance(account.id, Money::from_cents(50_00), &conn).unwrap();

        assert_eq!(updated.balance, Money::from_cents(120_00));
    }

    #[test]
    fn adjust_balance_fails_for_missing_account() {
        let conn = get_test_connection();

        assert_eq!(
            adjust_balance(42, Money::from_cents(1), &conn),
            Err(Error::AccountNotFound(42))
        );
    }

    #[test]
    fn adjust_balance_fails_on_overflow() {
        let conn = get_test_connection();
        let user_id = must_create_user("foo@bar.baz", &conn);
        let account =
            create_account(user_id, &new_account("Everyday", i64::MAX), &conn).unwrap();

        let result = adjust_balance(account.id, Money::from_cents(1), &conn);

        assert!(
            matches!(result, Err(Error::SqlError(_))),
            "got {result:?}"
        );
        assert_eq!(
            get_account(account.id, &conn).unwrap().balance,
            Money::from_cents(i64::MAX)
        );
    }
}
