//! Defines the endpoint for directly editing an account.
use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde_json::json;

use crate::{
    AppState, Error, JsonBody, UserID,
    account::{AccountChanges, core::update_account},
    database_id::AccountId,
};

/// The state needed to edit an account.
#[derive(Debug, Clone)]
pub struct EditAccountState {
    /// The database connection for managing accounts.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for EditAccountState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler that changes the name, type or balance of one of the logged in user's accounts.
///
/// Fields missing from the request body are left unchanged.
pub async fn edit_account_endpoint(
    State(state): State<EditAccountState>,
    Extension(user_id): Extension<UserID>,
    Path(account_id): Path<AccountId>,
    JsonBody(changes): JsonBody<AccountChanges>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match update_account(account_id, user_id, &changes, &connection) {
        Ok(account) => Json(json!({
            "message": "Account updated successfully",
            "account": account,
        }))
        .into_response(),
        Err(error) => {
            tracing::debug!("Could not update account {account_id}: {error}");
            error.into_response()
        }
    }
}
