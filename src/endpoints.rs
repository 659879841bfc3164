//! The REST API endpoint URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/accounts/{account_id}', use [format_endpoint].

/// The route to request a cup of coffee, doubles as a liveness probe.
pub const COFFEE: &str = "/api/coffee";
/// The route to register users.
pub const USERS: &str = "/api/users";
/// The route for logging in a user.
pub const LOG_IN: &str = "/api/users/log_in";
/// The route for the client to log out the current user.
pub const LOG_OUT: &str = "/api/users/log_out";
/// The route to list and create the current user's accounts.
pub const ACCOUNTS: &str = "/api/accounts";
/// The route to update a single account.
pub const ACCOUNT: &str = "/api/accounts/{account_id}";
/// The route to list the current user's transactions.
pub const TRANSACTIONS: &str = "/api/transactions";
/// The route to record an expense.
pub const EXPENSES: &str = "/api/transactions/expenses";
/// The route to record an income.
pub const INCOMES: &str = "/api/transactions/incomes";
/// The route to record a transfer between accounts.
pub const TRANSFERS: &str = "/api/transactions/transfers";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter starts with a left brace and ends with a right brace, for
/// example '{account_id}' in '/api/accounts/{account_id}'. Only the first
/// parameter is replaced. An unclosed parameter runs to the end of the path.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_owned();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map_or(endpoint_path.len(), |offset| param_start + offset + 1);

    format!(
        "{}{id}{}",
        &endpoint_path[..param_start],
        &endpoint_path[param_end..]
    )
}

// These tests are here so that we know the router will accept every path.
#[cfg(test)]
mod endpoints_tests {
    use axum::http::Uri;

    use crate::endpoints;

    use super::format_endpoint;

    fn assert_endpoint_is_valid_uri(uri: &str) {
        assert!(uri.parse::<Uri>().is_ok(), "{uri} is not a valid URI");
    }

    #[test]
    fn endpoints_are_valid_uris() {
        for endpoint in [
            endpoints::COFFEE,
            endpoints::USERS,
            endpoints::LOG_IN,
            endpoints::LOG_OUT,
            endpoints::ACCOUNTS,
            endpoints::ACCOUNT,
            endpoints::TRANSACTIONS,
            endpoints::EXPENSES,
            endpoints::INCOMES,
            endpoints::TRANSFERS,
        ] {
            assert_endpoint_is_valid_uri(endpoint);
        }
    }

    #[test]
    fn produces_valid_uri() {
        let formatted_path = format_endpoint(endpoints::ACCOUNT, 1);

        assert_eq!(formatted_path, "/api/accounts/1");
        assert_endpoint_is_valid_uri(&formatted_path);
    }

    #[test]
    fn returns_original_path_with_no_parameter() {
        let formatted_path = format_endpoint(endpoints::ACCOUNTS, 1);

        assert_eq!(formatted_path, endpoints::ACCOUNTS);
    }

    #[test]
    fn parameter_in_middle() {
        let formatted_path = format_endpoint("/hello/{world}/bye", 42);

        assert_eq!(formatted_path, "/hello/42/bye");
        assert_endpoint_is_valid_uri(&formatted_path);
    }
}
