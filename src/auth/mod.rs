mod log_in;
mod log_out;
mod middleware;
mod password;
mod register_user;
mod session;

pub use log_in::post_log_in;
pub use log_out::post_log_out;
pub use middleware::{AuthState, auth_guard};
pub use password::{PasswordHash, ValidatedPassword};
pub use register_user::register_user;
pub use session::{SessionConfig, SessionValidator, create_session_table};
