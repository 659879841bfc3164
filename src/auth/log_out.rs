//! Log-out route handler that ends every session of the current user.

use axum::{
    Extension, Json,
    extract::State,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::{Error, UserID, auth::AuthState};

/// End all sessions of the logged in user, which invalidates their tokens.
pub async fn post_log_out(
    State(state): State<AuthState>,
    Extension(user_id): Extension<UserID>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match state.session_validator.revoke_all(user_id, &connection) {
        Ok(session_count) => {
            tracing::info!("User {user_id} logged out, ended {session_count} session(s)");
            Json(json!({ "message": "Log out successful" })).into_response()
        }
        Err(error) => error.into_response(),
    }
}
