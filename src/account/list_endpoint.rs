//! Defines the endpoint for listing the logged in user's accounts.
use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde_json::json;

use crate::{AppState, Error, UserID, transaction::accounts_for_user};

/// The state needed for listing accounts.
#[derive(Debug, Clone)]
pub struct ListAccountsState {
    /// The database connection for managing accounts.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ListAccountsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler that responds with every account owned by the logged in user.
pub async fn list_accounts_endpoint(
    State(state): State<ListAccountsState>,
    Extension(user_id): Extension<UserID>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match accounts_for_user(user_id, &connection) {
        Ok(accounts) => Json(json!({
            "message": "Accounts retrieved successfully",
            "accounts": accounts,
        }))
        .into_response(),
        Err(error) => error.into_response(),
    }
}
