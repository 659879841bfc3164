//! Issues and validates the bearer tokens that authenticate API requests.
//!
//! A token is an HS256 JSON Web Token that names a row in the session table.
//! A token is only accepted while both the JWT and its session row are unexpired,
//! so deleting session rows revokes tokens before they expire.

use std::fmt::Debug;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use time::{Duration, OffsetDateTime};

use crate::{Error, User, UserID};

/// The default duration for which a session token is valid.
pub const DEFAULT_SESSION_DURATION: Duration = Duration::hours(1);

/// The settings used to sign and expire session tokens.
#[derive(Clone)]
pub struct SessionConfig {
    /// The secret that session tokens are signed with.
    pub secret: String,
    /// How long a session token is valid for after log-in.
    pub session_duration: Duration,
}

impl SessionConfig {
    /// Create a config with the [DEFAULT_SESSION_DURATION].
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.to_owned(),
            session_duration: DEFAULT_SESSION_DURATION,
        }
    }
}

impl Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &"********")
            .field("session_duration", &self.session_duration)
            .finish()
    }
}

/// The contents of a session token.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// The ID of the user the token was issued to.
    pub sub: i64,
    /// The email the user logged in with.
    pub email: String,
    /// The ID of the session row backing this token.
    pub sid: i64,
    /// When the token was issued, as a unix timestamp.
    pub iat: i64,
    /// When the token expires, as a unix timestamp.
    pub exp: i64,
}

/// Creates session tokens at log-in and turns tokens back into user IDs.
#[derive(Clone)]
pub struct SessionValidator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    session_duration: Duration,
}

impl SessionValidator {
    /// Create a validator whose signing key is derived from `config.secret`.
    pub fn new(config: SessionConfig) -> Self {
        let key = Sha512::digest(config.secret.as_bytes());

        Self {
            encoding_key: EncodingKey::from_secret(&key),
            decoding_key: DecodingKey::from_secret(&key),
            session_duration: config.session_duration,
        }
    }

    /// Start a new session for `user` and return its token.
    ///
    /// Expired sessions of any user are removed at the same time.
    ///
    /// # Errors
    /// Returns an [Error::TokenCreation] if the token could not be signed or the
    /// session duration puts the expiry out of range, or an [Error::SqlError]
    /// if the session could not be stored.
    pub fn issue_token(&self, user: &User, connection: &Connection) -> Result<String, Error> {
        let issued_at = OffsetDateTime::now_utc();
        let expires_at = issued_at
            .checked_add(self.session_duration)
            .ok_or_else(|| {
                Error::TokenCreation(format!(
                    "session duration {} is out of range",
                    self.session_duration
                ))
            })?;

        connection.execute(
            "DELETE FROM session WHERE expires_at <= ?1",
            (issued_at.unix_timestamp(),),
        )?;
        connection.execute(
            "INSERT INTO session (user_id, expires_at) VALUES (?1, ?2)",
            (user.id.as_i64(), expires_at.unix_timestamp()),
        )?;
        let session_id = connection.last_insert_rowid();

        let claims = Claims {
            sub: user.id.as_i64(),
            email: user.email.to_string(),
            sid: session_id,
            iat: issued_at.unix_timestamp(),
            exp: expires_at.unix_timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|error| Error::TokenCreation(error.to_string()))
    }

    /// Check `token` and return the ID of the user it was issued to.
    ///
    /// A session row that is found to be expired is deleted.
    ///
    /// # Errors
    /// Returns an [Error::Unauthenticated] if the token is malformed, has an
    /// invalid signature, has expired, or its session has been revoked.
    pub fn validate(&self, token: &str, connection: &Connection) -> Result<UserID, Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|error| {
                tracing::debug!("Rejected session token: {error}");
                Error::Unauthenticated
            })?
            .claims;

        let session: Option<(i64, i64)> = connection
            .query_row(
                "SELECT user_id, expires_at FROM session WHERE id = ?1",
                (claims.sid,),
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((user_id, expires_at)) = session else {
            return Err(Error::Unauthenticated);
        };

        if user_id != claims.sub {
            tracing::warn!(
                "Session {} belongs to user {user_id} but the token names user {}",
                claims.sid,
                claims.sub
            );
            return Err(Error::Unauthenticated);
        }

        if expires_at <= OffsetDateTime::now_utc().unix_timestamp() {
            connection.execute("DELETE FROM session WHERE id = ?1", (claims.sid,))?;
            return Err(Error::Unauthenticated);
        }

        Ok(UserID::new(user_id))
    }

    /// End every session of `user_id`, returning how many were removed.
    pub fn revoke_all(&self, user_id: UserID, connection: &Connection) -> Result<usize, Error> {
        connection
            .execute("DELETE FROM session WHERE user_id = ?1", (user_id.as_i64(),))
            .map_err(Error::from)
    }
}

impl Debug for SessionValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionValidator")
            .field("session_duration", &self.session_duration)
            .finish_non_exhaustive()
    }
}

/// Create the session table.
///
/// Session IDs are never reused, so a token for a deleted session cannot
/// match a session created later.
pub fn create_session_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS session (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            expires_at INTEGER NOT NULL,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_session_user_id ON session(user_id)",
        (),
    )?;

    Ok(())
}
