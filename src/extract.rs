//! Request extractors that report failures as [Error] responses.

use axum::extract::{FromRequest, rejection::JsonRejection};

use crate::Error;

/// A JSON request body.
///
/// Works like [axum::Json], except that a body that cannot be parsed is
/// rejected with a `validation` error in the application's JSON error format.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(Error))]
pub struct JsonBody<T>(pub T);

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!("Rejected request body: {rejection}");
        Error::InvalidBody(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use axum::{Router, http::StatusCode, routing::post};
    use axum_test::TestServer;
    use serde::Deserialize;
    use serde_json::{Value, json};

    use crate::Money;

    use super::JsonBody;

    #[derive(Deserialize)]
    struct Payment {
        amount: Money,
    }

    async fn echo_amount(JsonBody(payment): JsonBody<Payment>) -> String {
        payment.amount.to_string()
    }

    fn get_test_server() -> TestServer {
        let app = Router::new().route("/payments", post(echo_amount));

        TestServer::try_new(app).expect("Could not create test server.")
    }

    #[tokio::test]
    async fn accepts_valid_body() {
        let server = get_test_server();

        let response = server
            .post("/payments")
            .json(&json!({ "amount": "12.34" }))
            .await;

        response.assert_status_ok();
        response.assert_text("12.34");
    }

    #[tokio::test]
    async fn rejects_invalid_bodies_with_validation_error() {
        let server = get_test_server();
        let cases = [
            json!({ "amount": "12.345" }),
            json!({ "amount": "twelve" }),
            json!({}),
        ];

        for body in cases {
            let response = server.post("/payments").json(&body).await;

            response.assert_status(StatusCode::BAD_REQUEST);
            assert_eq!(response.json::<Value>()["error"]["kind"], "validation");
        }
    }

    #[tokio::test]
    async fn rejects_malformed_json_with_validation_error() {
        let server = get_test_server();

        let response = server
            .post("/payments")
            .content_type("application/json")
            .bytes("{\"amount\": ".into())
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"]["kind"], "validation");
    }
}
