//! A backend for tracking personal finances.
//!
//! Users register financial accounts and record expenses, incomes and
//! transfers against them. Every transaction is kept in an append-only log and
//! its effect on account balances is applied in the same database transaction
//! as the log entry, so balances always agree with the recorded history.
//!
//! This library provides a JSON REST API, see [build_router].

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde::Serialize;
use serde_json::json;
use tokio::signal;

mod account;
mod app_state;
mod auth;
mod database_id;
mod db;
mod endpoints;
mod extract;
mod logging;
mod money;
mod routing;
mod transaction;
mod user;

pub use account::{Account, AccountChanges, NewAccount};
pub use app_state::AppState;
pub use auth::{PasswordHash, SessionConfig, SessionValidator, ValidatedPassword};
pub use database_id::{AccountId, DatabaseId, TransactionId};
pub use db::{configure_connection, initialize as initialize_db};
pub use extract::JsonBody;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use money::{Money, ParseMoneyError};
pub use routing::build_router;
pub use transaction::{
    BaseTransaction, LedgerEntry, NewTransaction, NewTransfer, TransactionDetail,
    TransactionRecord, accounts_for_user, record_expense, record_income, record_transfer,
    transactions_for_user,
};
pub use user::{User, UserID, get_user_by_id};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The broad category of an [Error].
///
/// Clients receive the kind as a stable string so they can branch on the
/// category without parsing error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The request was malformed and should not be retried as is.
    Validation,
    /// A referenced entity does not exist.
    NotFound,
    /// A concurrent operation held the database, the whole request may be retried.
    Conflict,
    /// The request did not carry a valid session.
    Unauthenticated,
    /// The storage layer failed.
    Persistence,
    /// Some other server-side failure.
    Internal,
}

impl ErrorKind {
    fn status_code(self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::Persistence | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A required text field was empty or only whitespace.
    #[error("{0} cannot be empty")]
    EmptyField(&'static str),

    /// The request body was not valid JSON or did not have the expected fields.
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    /// A transaction amount was zero or negative.
    ///
    /// Transaction amounts are magnitudes, the kind of transaction decides
    /// whether the amount is added to or subtracted from a balance.
    #[error("the amount must be greater than zero, got {0}")]
    NonPositiveAmount(money::Money),

    /// A transfer named the same account as both sender and recipient.
    #[error("cannot transfer from account {0} to itself")]
    SelfTransfer(AccountId),

    /// The email address could not be parsed.
    #[error("\"{0}\" is not a valid email address")]
    InvalidEmail(String),

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// The email address is already registered to another user.
    #[error("a user with this email address already exists")]
    DuplicateEmail,

    /// The email and password did not match a registered user.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The request had no session token, or the token was invalid, expired or revoked.
    #[error("missing, invalid or expired session token")]
    Unauthenticated,

    /// The account does not exist, or belongs to another user.
    #[error("account {0} could not be found")]
    AccountNotFound(AccountId),

    /// The sending account of a transfer does not exist, or belongs to another user.
    #[error("sender account {0} could not be found")]
    SenderAccountNotFound(AccountId),

    /// The receiving account of a transfer does not exist.
    #[error("recipient account {0} could not be found")]
    RecipientAccountNotFound(AccountId),

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The database was busy with another write for longer than the busy timeout.
    ///
    /// Nothing was written, the caller should retry the whole operation.
    #[error("the database is busy with another operation, try again")]
    Conflict,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// A session token could not be created.
    #[error("could not create session token: {0}")]
    TokenCreation(String),
}

impl Error {
    /// The stable category of the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::EmptyField(_)
            | Error::InvalidBody(_)
            | Error::NonPositiveAmount(_)
            | Error::SelfTransfer(_)
            | Error::InvalidEmail(_)
            | Error::TooWeak(_)
            | Error::DuplicateEmail => ErrorKind::Validation,
            Error::AccountNotFound(_)
            | Error::SenderAccountNotFound(_)
            | Error::RecipientAccountNotFound(_)
            | Error::NotFound => ErrorKind::NotFound,
            Error::Conflict => ErrorKind::Conflict,
            Error::InvalidCredentials | Error::Unauthenticated => ErrorKind::Unauthenticated,
            Error::SqlError(_) => ErrorKind::Persistence,
            Error::DatabaseLockError | Error::HashingError(_) | Error::TokenCreation(_) => {
                ErrorKind::Internal
            }
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked,
                    ..
                },
                _,
            ) => Error::Conflict,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let message = match kind {
            // Storage and server internals are not intended to be shown to the client.
            ErrorKind::Persistence | ErrorKind::Internal => {
                tracing::error!("An unexpected error occurred: {}", self);
                "An unexpected error occurred, check the server logs for more details.".to_owned()
            }
            _ => self.to_string(),
        };

        let body = Json(json!({
            "error": {
                "kind": kind,
                "message": message,
            }
        }));

        (kind.status_code(), body).into_response()
    }
}

#[cfg(test)]
mod error_tests {
    use axum::{http::StatusCode, response::IntoResponse};
    use rusqlite::ffi::{self, SQLITE_BUSY};

    use crate::{Error, ErrorKind};

    #[test]
    fn busy_database_maps_to_conflict() {
        let error = rusqlite::Error::SqliteFailure(ffi::Error::new(SQLITE_BUSY), None);

        assert_eq!(Error::from(error), Error::Conflict);
    }

    #[test]
    fn no_rows_maps_to_not_found() {
        assert_eq!(
            Error::from(rusqlite::Error::QueryReturnedNoRows),
            Error::NotFound
        );
    }

    #[test]
    fn error_kinds_map_to_status_codes() {
        let cases = [
            (Error::EmptyField("name"), StatusCode::BAD_REQUEST),
            (Error::SelfTransfer(1), StatusCode::BAD_REQUEST),
            (Error::InvalidBody("expected value".to_owned()), StatusCode::BAD_REQUEST),
            (Error::SenderAccountNotFound(1), StatusCode::NOT_FOUND),
            (Error::Conflict, StatusCode::CONFLICT),
            (Error::Unauthenticated, StatusCode::UNAUTHORIZED),
            (Error::DatabaseLockError, StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, want_status) in cases {
            let response = error.into_response();
            assert_eq!(response.status(), want_status);
        }
    }

    #[tokio::test]
    async fn persistence_errors_hide_details_from_client() {
        let error = Error::SqlError(rusqlite::Error::InvalidQuery);
        assert_eq!(error.kind(), ErrorKind::Persistence);

        let response = error.into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(body["error"]["kind"], "persistence");
        assert!(
            !body["error"]["message"]
                .as_str()
                .unwrap()
                .contains("SQL"),
            "got message {:?}",
            body["error"]["message"]
        );
    }
}
