//! Middleware for logging requests and responses.

use axum::{extract::Request, http::header::CONTENT_TYPE, middleware::Next, response::Response};

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If a body is longer than [LOG_BODY_LENGTH_LIMIT] bytes, it is truncated and the full body is
/// logged at the `debug` level instead. The `password` field of JSON request bodies is redacted.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (parts, body_text) = extract_parts_and_body_text_from_request(request).await;

    if has_json_content_type(&parts.headers) {
        log_request(&parts, &redact_password(&body_text));
    } else {
        log_request(&parts, &body_text);
    }

    let request = Request::from_parts(parts, body_text.into());
    let response = next.run(request).await;

    let (parts, body_text) = extract_parts_and_body_text_from_response(response).await;
    log_response(&parts, &body_text);

    Response::from_parts(parts, body_text.into())
}

fn has_json_content_type(headers: &axum::http::HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"))
}

/// Replace the top-level `password` field of a JSON object with asterisks.
///
/// Bodies that do not parse as a JSON object are returned unchanged.
fn redact_password(body_text: &str) -> String {
    let Ok(mut value) = serde_json::from_str::<serde_json::Value>(body_text) else {
        return body_text.to_string();
    };

    if let Some(object) = value.as_object_mut() {
        if let Some(password) = object.get_mut("password") {
            *password = serde_json::Value::String("********".to_string());
        }
    }

    value.to_string()
}

async fn extract_parts_and_body_text_from_request(
    request: Request,
) -> (axum::http::request::Parts, String) {
    let (parts, body) = request.into_parts();
    let body_bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_default();

    (parts, String::from_utf8_lossy(&body_bytes).to_string())
}

async fn extract_parts_and_body_text_from_response(
    response: Response,
) -> (axum::http::response::Parts, String) {
    let (parts, body) = response.into_parts();
    let body_bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_default();

    (parts, String::from_utf8_lossy(&body_bytes).to_string())
}

/// The maximum number of body bytes logged at the `info` level.
pub const LOG_BODY_LENGTH_LIMIT: usize = 64;

fn log_request(parts: &axum::http::request::Parts, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "Received request: {} {}\nbody: {:}...",
            parts.method,
            parts.uri,
            &body[..LOG_BODY_LENGTH_LIMIT]
        );
        tracing::debug!("Full request body: {body:?}");
    } else {
        tracing::info!(
            "Received request: {} {}\nbody: {body:?}",
            parts.method,
            parts.uri
        );
    }
}

fn log_response(parts: &axum::http::response::Parts, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "Sending response: {}\nbody: {:}...",
            parts.status,
            &body[..LOG_BODY_LENGTH_LIMIT]
        );
        tracing::debug!("Full response body: {body:?}");
    } else {
        tracing::info!("Sending response: {}\nbody: {body:?}", parts.status);
    }
}

#[cfg(test)]
mod redact_password_tests {
    use super::redact_password;

    #[test]
    fn redacts_top_level_password() {
        let body = r#"{"email":"foo@bar.baz","password":"hunter2hunter2"}"#;

        let redacted = redact_password(body);

        assert!(!redacted.contains("hunter2hunter2"));
        assert!(redacted.contains("********"));
        assert!(redacted.contains("foo@bar.baz"));
    }

    #[test]
    fn leaves_other_bodies_unchanged() {
        let body = r#"{"amount":4.5,"title":"Coffee"}"#;

        assert_eq!(redact_password(body), body);
    }

    #[test]
    fn leaves_invalid_json_unchanged() {
        let body = "not json";

        assert_eq!(redact_password(body), body);
    }
}
