//! Handles log-in requests by checking credentials and issuing a session token.

use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{Error, JsonBody, User, auth::AuthState, user::get_user_by_email};

/// The raw credentials sent by the client to log in.
///
/// The password is stored as a plain string. There is no need for validation here since
/// it will be compared against the password in the database, which has been verified.
#[derive(Clone, Serialize, Deserialize)]
pub struct LogInData {
    /// Email entered during log-in.
    pub email: String,
    /// Password entered during log-in.
    pub password: String,
}

/// Handler for log-in requests via the POST method.
///
/// On success, any existing sessions of the user are ended and the response
/// contains a new bearer token along with the user.
///
/// # Errors
///
/// This function will return an error in a few situations.
/// - The email or password is empty.
/// - The email does not belong to a registered user, or the password is not correct.
///   Both cases return the same [Error::InvalidCredentials] so clients cannot probe for emails.
/// - An internal error occurred when verifying the password or creating the token.
pub async fn post_log_in(
    State(state): State<AuthState>,
    JsonBody(user_data): JsonBody<LogInData>,
) -> Response {
    match log_in(&state, &user_data) {
        Ok((user, token)) => Json(json!({
            "message": "Log in successful",
            "token": token,
            "user": user,
        }))
        .into_response(),
        Err(error) => error.into_response(),
    }
}

fn log_in(state: &AuthState, user_data: &LogInData) -> Result<(User, String), Error> {
    let email = user_data.email.trim();
    if email.is_empty() {
        return Err(Error::EmptyField("email"));
    }
    if user_data.password.trim().is_empty() {
        return Err(Error::EmptyField("password"));
    }

    let connection = state.db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })?;

    let user = match get_user_by_email(email, &connection) {
        Ok(user) => user,
        Err(Error::NotFound) => return Err(Error::InvalidCredentials),
        Err(error) => return Err(error),
    };

    let is_password_valid = user.password_hash.verify(&user_data.password).map_err(|error| {
        tracing::error!("Unhandled error while verifying credentials: {error}");
        Error::HashingError(error.to_string())
    })?;

    if !is_password_valid {
        return Err(Error::InvalidCredentials);
    }

    state.session_validator.revoke_all(user.id, &connection)?;
    let token = state.session_validator.issue_token(&user, &connection)?;

    tracing::info!("User {} logged in", user.id);

    Ok((user, token))
}
