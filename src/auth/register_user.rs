//! Handles user registration.

use std::{
    str::FromStr,
    sync::{Arc, Mutex},
};

use axum::{
    Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use email_address::EmailAddress;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{AppState, Error, JsonBody, PasswordHash, User, user::create_user};

/// The state needed to register a user.
#[derive(Debug, Clone)]
pub struct RegistrationState {
    /// The database connection for managing users.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The bcrypt cost used to hash new passwords.
    pub password_cost: u32,
}

impl FromRef<AppState> for RegistrationState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            password_cost: state.password_cost,
        }
    }
}

/// The data sent by the client to register a new user.
#[derive(Clone, Serialize, Deserialize)]
pub struct RegisterData {
    /// The user's display name.
    pub name: String,
    /// The email address the user will log in with.
    pub email: String,
    /// The plain text password, validated before hashing.
    pub password: String,
}

/// A route handler for registering a new user.
///
/// Responds with 201 Created and the new user on success.
pub async fn register_user(
    State(state): State<RegistrationState>,
    JsonBody(data): JsonBody<RegisterData>,
) -> Response {
    match register(&state, &data) {
        Ok(user) => (
            StatusCode::CREATED,
            Json(json!({
                "message": "User created successfully",
                "user": user,
            })),
        )
            .into_response(),
        Err(error) => error.into_response(),
    }
}

fn register(state: &RegistrationState, data: &RegisterData) -> Result<User, Error> {
    let name = data.name.trim();
    if name.is_empty() {
        return Err(Error::EmptyField("name"));
    }

    let email = data.email.trim();
    if email.is_empty() {
        return Err(Error::EmptyField("email"));
    }
    let email = EmailAddress::from_str(email).map_err(|error| {
        tracing::debug!("Rejected email {email:?}: {error}");
        Error::InvalidEmail(email.to_owned())
    })?;

    let password_hash = PasswordHash::from_raw_password(&data.password, state.password_cost)?;

    let connection = state.db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })?;

    let user = create_user(name, &email, password_hash, &connection)?;
    tracing::info!("Registered user {}", user.id);

    Ok(user)
}

#[cfg(test)]
mod register_user_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Router, http::StatusCode, routing::post};
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::{Value, json};

    use crate::{db::initialize, user::get_user_by_email};

    use super::{RegistrationState, register_user};

    fn get_test_server() -> (TestServer, RegistrationState) {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let state = RegistrationState {
            db_connection: Arc::new(Mutex::new(connection)),
            password_cost: 4,
        };
        let app = Router::new()
            .route("/users", post(register_user))
            .with_state(state.clone());

        (
            TestServer::try_new(app).expect("Could not create test server."),
            state,
        )
    }

    #[tokio::test]
    async fn register_user_succeeds() {
        let (server, state) = get_test_server();

        let response = server
            .post("/users")
            .json(&json!({
                "name": "Alice",
                "email": "alice@example.com",
                "password": "correct horse battery staple",
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let body = response.json::<Value>();
        assert_eq!(body["user"]["name"], "Alice");
        let user =
            get_user_by_email("alice@example.com", &state.db_connection.lock().unwrap()).unwrap();
        assert!(user.password_hash.verify("correct horse battery staple").unwrap());
    }

    #[tokio::test]
    async fn register_user_fails_with_duplicate_email() {
        let (server, _) = get_test_server();
        let data = json!({
            "name": "Alice",
            "email": "alice@example.com",
            "password": "correct horse battery staple",
        });
        server
            .post("/users")
            .json(&data)
            .await
            .assert_status(StatusCode::CREATED);

        let response = server.post("/users").json(&data).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"]["kind"], "validation");
    }

    #[tokio::test]
    async fn register_user_fails_with_invalid_input() {
        let (server, _) = get_test_server();
        let cases = [
            json!({ "name": " ", "email": "a@example.com", "password": "correct horse battery staple" }),
            json!({ "name": "A", "email": "not an email", "password": "correct horse battery staple" }),
            json!({ "name": "A", "email": "a@example.com", "password": "short" }),
        ];

        for data in cases {
            server
                .post("/users")
                .json(&data)
                .await
                .assert_status(StatusCode::BAD_REQUEST);
        }
    }
}
