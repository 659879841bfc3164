//! Defines the endpoints for recording expenses, incomes and transfers.
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde_json::json;

use crate::{
    AppState, Error, JsonBody, UserID,
    transaction::ledger::{
        LedgerEntry, NewTransaction, NewTransfer, record_expense, record_income, record_transfer,
    },
};

/// The state needed to record a transaction.
#[derive(Debug, Clone)]
pub struct CreateTransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CreateTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

fn lock_connection(state: &CreateTransactionState) -> Result<MutexGuard<'_, Connection>, Error> {
    state.db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })
}

fn into_created_response(message: &str, result: Result<LedgerEntry, Error>) -> Response {
    match result {
        Ok(entry) => (
            StatusCode::CREATED,
            Json(json!({
                "message": message,
                "transaction": entry,
            })),
        )
            .into_response(),
        Err(error) => {
            tracing::debug!("Could not record transaction: {error}");
            error.into_response()
        }
    }
}

/// A route handler for recording an expense against one of the logged in user's accounts.
pub async fn create_expense_endpoint(
    State(state): State<CreateTransactionState>,
    Extension(user_id): Extension<UserID>,
    JsonBody(expense): JsonBody<NewTransaction>,
) -> Response {
    let result = lock_connection(&state)
        .and_then(|mut connection| record_expense(user_id, &expense, &mut connection));

    into_created_response("Expense recorded successfully", result)
}

/// A route handler for recording an income into one of the logged in user's accounts.
pub async fn create_income_endpoint(
    State(state): State<CreateTransactionState>,
    Extension(user_id): Extension<UserID>,
    JsonBody(income): JsonBody<NewTransaction>,
) -> Response {
    let result = lock_connection(&state)
        .and_then(|mut connection| record_income(user_id, &income, &mut connection));

    into_created_response("Income recorded successfully", result)
}

/// A route handler for recording a transfer from one of the logged in user's accounts.
pub async fn create_transfer_endpoint(
    State(state): State<CreateTransactionState>,
    Extension(user_id): Extension<UserID>,
    JsonBody(transfer): JsonBody<NewTransfer>,
) -> Response {
    let result = lock_connection(&state)
        .and_then(|mut connection| record_transfer(user_id, &transfer, &mut connection));

    into_created_response("Transfer recorded successfully", result)
}
