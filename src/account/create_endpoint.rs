//! Defines the endpoint for creating a new account.
use std::sync::{Arc, Mutex};

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
    account::{NewAccount, core::create_account},
};

/// The state needed for creating an account.
#[derive(Debug, Clone)]
pub struct CreateAccountState {
    /// The database connection for managing accounts.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CreateAccountState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for creating a new account for the logged in user.
///
/// Responds with 201 Created and the new account on success.
pub async fn create_account_endpoint(
    State(state): State<CreateAccountState>,
    Extension(user_id): Extension<UserID>,
    JsonBody(new_account): JsonBody<NewAccount>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match create_account(user_id, &new_account, &connection) {
        Ok(account) => {
            tracing::info!("User {user_id} created account {}", account.id);
            (
                StatusCode::CREATED,
                Json(json!({
                    "message": "Account created successfully",
                    "account": account,
                })),
            )
                .into_response()
        }
        Err(error) => error.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use std::{
        str::FromStr,
        sync::{Arc, Mutex},
    };

    use axum::{Extension, extract::State, http::StatusCode, response::Response};
    use email_address::EmailAddress;
    use rusqlite::Connection;
    use serde_json::Value;

    use crate::{
        JsonBody, Money, PasswordHash, UserID,
        account::{NewAccount, core::get_accounts_for_user},
        initialize_db,
        user::create_user,
    };

    use super::{CreateAccountState, create_account_endpoint};

    #[tokio::test]
    async fn can_create_account() {
        let (state, user_id) = must_create_state();
        let new_account = NewAccount {
            name: "Everyday".to_owned(),
            account_type: "checking".to_owned(),
            balance: Money::from_cents(100_00),
        };

        let response =
            create_account_endpoint(State(state.clone()), Extension(user_id), JsonBody(new_account))
                .await;

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = must_parse_body(response).await;
        assert_eq!(body["account"]["name"], "Everyday");
        assert_eq!(body["account"]["type"], "checking");
        assert_eq!(body["account"]["balance"], "100.00");
        let accounts = get_accounts_for_user(user_id, &state.db_connection.lock().unwrap()).unwrap();
        assert_eq!(accounts.len(), 1);
    }

    #[tokio::test]
    async fn create_account_fails_on_empty_name() {
        let (state, user_id) = must_create_state();
        let new_account = NewAccount {
            name: "".to_owned(),
            account_type: "checking".to_owned(),
            balance: Money::ZERO,
        };

        let response =
            create_account_endpoint(State(state), Extension(user_id), JsonBody(new_account)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = must_parse_body(response).await;
        assert_eq!(body["error"]["kind"], "validation");
    }

    #[track_caller]
    fn must_create_state() -> (CreateAccountState, UserID) {
        let connection =
            Connection::open_in_memory().expect("could not create in-memory SQLite database");
        initialize_db(&connection).expect("could not initialize test DB");
        let user = create_user(
            "Test",
            &EmailAddress::from_str("test@test.com").unwrap(),
            PasswordHash::new_unchecked("hunter2"),
            &connection,
        )
        .expect("could not create test user");

        (
            CreateAccountState {
                db_connection: Arc::new(Mutex::new(connection)),
            },
            user.id,
        )
    }

    async fn must_parse_body(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("could not read response body");
        serde_json::from_slice(&body).expect("response body is not JSON")
    }
}
