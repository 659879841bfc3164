//! Middleware for logging requests and responses.

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{
        HeaderMap, HeaderName, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, PROXY_AUTHORIZATION, SET_COOKIE},
        request, response,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

/// Bodies longer than this many bytes are truncated at the `info` level.
pub const LOG_BODY_LENGTH_LIMIT: usize = 64;

/// JSON fields whose values are never written to the logs.
const REDACTED_FIELDS: [&str; 2] = ["password", "token"];

/// Headers whose values are hidden when request and response parts are logged.
const SENSITIVE_HEADERS: [HeaderName; 4] = [AUTHORIZATION, PROXY_AUTHORIZATION, COOKIE, SET_COOKIE];

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If a body is longer than [LOG_BODY_LENGTH_LIMIT] bytes, it is
/// truncated and the full body is logged at the `debug` level.
/// Passwords and session tokens in JSON bodies are replaced with asterisks,
/// and credential headers are logged as `Sensitive`.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();
    mark_sensitive_headers(&mut parts.headers);
    let body_bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::debug!("Could not read request body: {error}");
            return (StatusCode::BAD_REQUEST, "Could not read request body").into_response();
        }
    };

    log_request(&parts, &body_text_for_log(&parts.headers, &body_bytes));

    let request = Request::from_parts(parts, Body::from(body_bytes));
    let response = next.run(request).await;

    let (mut parts, body) = response.into_parts();
    mark_sensitive_headers(&mut parts.headers);
    let body_bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!("Could not read response body: {error}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    log_response(&parts, &body_text_for_log(&parts.headers, &body_bytes));

    Response::from_parts(parts, Body::from(body_bytes))
}

/// Flag credential headers so that their `Debug` output hides the value.
///
/// The values sent over the wire are not changed.
fn mark_sensitive_headers(headers: &mut HeaderMap) {
    for (name, value) in headers.iter_mut() {
        if SENSITIVE_HEADERS.contains(name) {
            value.set_sensitive(true);
        }
    }
}

fn body_text_for_log(headers: &HeaderMap, body: &Bytes) -> String {
    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|content_type| content_type.to_str().ok())
        .is_some_and(|content_type| content_type.starts_with("application/json"));

    if is_json {
        if let Ok(mut value) = serde_json::from_slice::<Value>(body) {
            redact_secrets(&mut value);
            return value.to_string();
        }
    }

    String::from_utf8_lossy(body).to_string()
}

fn redact_secrets(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                if REDACTED_FIELDS.contains(&key.as_str()) {
                    *field = Value::String("********".to_owned());
                } else {
                    redact_secrets(field);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_secrets),
        _ => {}
    }
}

fn truncate(body: &str) -> &str {
    let mut end = LOG_BODY_LENGTH_LIMIT.min(body.len());

    while !body.is_char_boundary(end) {
        end -= 1;
    }

    &body[..end]
}

fn log_request(parts: &request::Parts, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "Received request: {} {}\nbody: {}...",
            parts.method,
            parts.uri,
            truncate(body)
        );
        tracing::debug!("Full request: {parts:#?}\nbody: {body:?}");
    } else {
        tracing::info!(
            "Received request: {} {}\nbody: {body:?}",
            parts.method,
            parts.uri
        );
    }
}

fn log_response(parts: &response::Parts, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "Sending response: {}\nbody: {}...",
            parts.status,
            truncate(body)
        );
        tracing::debug!("Full response: {parts:#?}\nbody: {body:?}");
    } else {
        tracing::info!("Sending response: {}\nbody: {body:?}", parts.status);
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        Json, Router,
        http::{
            HeaderMap, HeaderValue, Request, StatusCode,
            header::{AUTHORIZATION, CONTENT_TYPE, COOKIE},
        },
        middleware,
        routing::post,
    };
    use axum_test::TestServer;
    use serde_json::{Value, json};

    use super::{
        LOG_BODY_LENGTH_LIMIT, body_text_for_log, logging_middleware, mark_sensitive_headers,
        truncate,
    };

    fn json_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    #[test]
    fn redacts_passwords_and_tokens() {
        let body = json!({
            "email": "test@test.com",
            "password": "hunter2",
            "session": { "token": "abc.def.ghi" },
        })
        .to_string();

        let text = body_text_for_log(&json_headers(), &body.into());

        assert!(!text.contains("hunter2"), "got {text}");
        assert!(!text.contains("abc.def.ghi"), "got {text}");
        assert!(text.contains("test@test.com"), "got {text}");
    }

    #[test]
    fn leaves_non_json_bodies_unchanged() {
        let text = body_text_for_log(&HeaderMap::new(), &"password=hunter2".into());

        assert_eq!(text, "password=hunter2");
    }

    #[test]
    fn hides_credential_headers_in_debug_output() {
        let request = Request::builder()
            .uri("/api/accounts")
            .header(AUTHORIZATION, "Bearer abc.def.ghi")
            .header(COOKIE, "session=s3cr3t")
            .header(CONTENT_TYPE, "application/json")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();

        mark_sensitive_headers(&mut parts.headers);

        let text = format!("{parts:#?}");
        assert!(!text.contains("abc.def.ghi"), "got {text}");
        assert!(!text.contains("s3cr3t"), "got {text}");
        assert!(text.contains("application/json"), "got {text}");
        assert_eq!(parts.headers[AUTHORIZATION], "Bearer abc.def.ghi");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let body = "é".repeat(LOG_BODY_LENGTH_LIMIT);

        let truncated = truncate(&body);

        assert!(truncated.len() <= LOG_BODY_LENGTH_LIMIT);
        assert!(body.starts_with(truncated));
    }

    #[tokio::test]
    async fn passes_bodies_through_unchanged() {
        let app = Router::new()
            .route("/echo", post(|Json(body): Json<Value>| async move { Json(body) }))
            .layer(middleware::from_fn(logging_middleware));
        let server = TestServer::try_new(app).expect("Could not create test server.");
        let body = json!({ "password": "hunter2", "note": "x".repeat(100) });

        let response = server.post("/echo").json(&body).await;

        response.assert_status(StatusCode::OK);
        response.assert_json(&body);
    }

    #[tokio::test]
    async fn forwards_credential_headers_unchanged() {
        let app = Router::new()
            .route(
                "/echo",
                post(|headers: HeaderMap| async move {
                    headers
                        .get(AUTHORIZATION)
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or_default()
                        .to_owned()
                }),
            )
            .layer(middleware::from_fn(logging_middleware));
        let server = TestServer::try_new(app).expect("Could not create test server.");

        let response = server.post("/echo").authorization_bearer("abc.def.ghi").await;

        response.assert_status(StatusCode::OK);
        response.assert_text("Bearer abc.def.ghi");
    }
}
