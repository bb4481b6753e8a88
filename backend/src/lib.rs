//! A REST API server for tracking personal income and expenses.
//!
//! The API authenticates users with JSON Web Tokens and exposes CRUD endpoints for transaction
//! records, which clients mirror locally (see the `client` crate).

use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{post, put},
    Json, Router,
};
use axum_server::Handle;
use common::{
    Email, NewTransaction, PasswordHash, RawPassword, Transaction, TransactionId, TransactionPatch,
};
use serde::Deserialize;
use serde_json::json;
use tokio::signal;

pub use config::AppConfig;
pub use db::initialize;
pub use logging::logging_middleware;

use crate::{
    auth::Claims,
    db::{DbError, Insert, NewUser, SelectBy, TransactionData},
};

pub mod auth;
mod config;
pub mod db;
mod logging;

/// Return a router with all the app's routes.
pub fn build_router() -> Router<AppConfig> {
    Router::new()
        .route("/api/users", post(create_user))
        .route("/api/sign_in", post(auth::sign_in))
        .route(
            "/api/transactions",
            post(create_transaction).get(get_transactions),
        )
        .route(
            "/api/transactions/:transaction_id",
            put(update_transaction).delete(delete_transaction),
        )
}

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

enum AppError {
    /// The request body failed validation. The client should fix the named field and retry.
    Validation(String),
    /// An error occurred while creating a user.
    UserCreation(String),
    /// The requested transaction was not found. The client should check that the ID is correct
    /// and that the transaction has not been deleted.
    NotFound,
    /// An error occurred in a third-party library.
    InternalError,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Validation(message) => (StatusCode::BAD_REQUEST, message),
            AppError::UserCreation(message) => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound => (
                StatusCode::NOT_FOUND,
                "Transaction not found".to_string(),
            ),
            AppError::InternalError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "message": message,
        }));

        (status, body).into_response()
    }
}

impl From<DbError> for AppError {
    fn from(error: DbError) -> Self {
        match error {
            DbError::NotFound => AppError::NotFound,
            DbError::DuplicateEmail => AppError::UserCreation(error.to_string()),
            DbError::SqlError(_) => {
                tracing::error!("{error}");
                AppError::InternalError
            }
        }
    }
}

/// The email and password submitted when registering a user.
///
/// Unlike [auth::Credentials], the fields arrive as plain strings so that validation failures
/// produce a helpful message instead of a deserialization error.
#[derive(Debug, Deserialize)]
struct RegisterRequest {
    email: String,
    password: String,
}

/// A route handler for registering a new user.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
async fn create_user(
    State(config): State<AppConfig>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = Email::new(&request.email)
        .map_err(|error| AppError::Validation(error.to_string()))?;
    let password = RawPassword::new(request.password)
        .map_err(|_| AppError::Validation("password is too short".to_string()))?;

    let password_hash = PasswordHash::new(password).map_err(|error| {
        tracing::error!("Error hashing password: {error}");
        AppError::InternalError
    })?;

    let user = NewUser {
        email,
        password_hash,
    }
    .insert(&config.db_connection().lock().unwrap())?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "user": {
                "id": user.id(),
                "email": user.email(),
            }
        })),
    ))
}

/// A route handler for creating a new transaction.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
async fn create_transaction(
    State(config): State<AppConfig>,
    claims: Claims,
    Json(new_transaction): Json<NewTransaction>,
) -> Result<impl IntoResponse, AppError> {
    new_transaction
        .validate()
        .map_err(|error| AppError::Validation(error.to_string()))?;

    let transaction = TransactionData::from_new_transaction(new_transaction, claims.sub)
        .insert(&config.db_connection().lock().unwrap())?;

    Ok(Json(json!({ "transaction": transaction })))
}

/// A route handler for listing the authenticated user's transactions in creation order.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
async fn get_transactions(
    State(config): State<AppConfig>,
    claims: Claims,
) -> Result<impl IntoResponse, AppError> {
    let transactions =
        Transaction::select(claims.sub, &config.db_connection().lock().unwrap())?;

    Ok(Json(json!({ "transactions": transactions })))
}

/// A route handler for editing an existing transaction. Fields absent from the body keep their
/// stored values.
///
/// Responds with 404 if the transaction does not exist or belongs to another user, revealing
/// nothing about other users' data.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
async fn update_transaction(
    State(config): State<AppConfig>,
    claims: Claims,
    Path(transaction_id): Path<String>,
    Json(patch): Json<TransactionPatch>,
) -> Result<impl IntoResponse, AppError> {
    patch
        .validate()
        .map_err(|error| AppError::Validation(error.to_string()))?;

    let transaction = db::update_transaction(
        &TransactionId::new(transaction_id),
        claims.sub,
        patch,
        &config.db_connection().lock().unwrap(),
    )?;

    Ok(Json(json!({ "transaction": transaction })))
}

/// A route handler for deleting a transaction.
///
/// Responds with 404 if the transaction does not exist or belongs to another user.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
async fn delete_transaction(
    State(config): State<AppConfig>,
    claims: Claims,
    Path(transaction_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    db::delete_transaction(
        &TransactionId::new(transaction_id),
        claims.sub,
        &config.db_connection().lock().unwrap(),
    )?;

    Ok(Json(json!({ "success": true })))
}


#[cfg(test)]
mod transaction_endpoint_tests {
    use axum_test::TestServer;
    use serde_json::json;

    use axum::http::StatusCode;
    use rusqlite::Connection;

    use crate::{build_router, db::initialize, AppConfig};

    fn get_test_app_config() -> AppConfig {
        let db_connection =
            Connection::open_in_memory().expect("Could not open database in memory.");
        initialize(&db_connection).expect("Could not initialize database.");

        AppConfig::new(db_connection, "42".to_string())
    }

    async fn create_app_with_user() -> (TestServer, String) {
        let app = build_router().with_state(get_test_app_config());
        let server = TestServer::new(app).expect("Could not create test server.");

        let token = sign_up(&server, "test@test.com", "hunter2hunter2").await;

        (server, token)
    }

    async fn sign_up(server: &TestServer, email: &str, password: &str) -> String {
        server
            .post("/api/users")
            .content_type("application/json")
            .json(&json!({ "email": email, "password": password }))
            .await
            .assert_status_ok();

        let response = server
            .post("/api/sign_in")
            .content_type("application/json")
            .json(&json!({ "email": email, "password": password }))
            .await;

        response.assert_status_ok();

        response.json::<serde_json::Value>()["token"]
            .as_str()
            .expect("sign-in response should contain a token")
            .to_owned()
    }

    async fn create_transaction(
        server: &TestServer,
        token: &str,
        title: &str,
        amount: f64,
        kind: &str,
    ) -> serde_json::Value {
        let response = server
            .post("/api/transactions")
            .authorization_bearer(token)
            .content_type("application/json")
            .json(&json!({
                "title": title,
                "amount": amount,
                "type": kind,
                "category": "General",
                "date": "2024-06-01",
            }))
            .await;

        response.assert_status_ok();

        response.json::<serde_json::Value>()["transaction"].clone()
    }

    #[tokio::test]
    async fn create_transaction_returns_envelope_with_assigned_id() {
        let (server, token) = create_app_with_user().await;

        let transaction = create_transaction(&server, &token, "Coffee", 4.5, "Expense").await;

        assert!(transaction["id"].is_string());
        assert!(!transaction["id"].as_str().unwrap().is_empty());
        assert_eq!(transaction["title"], "Coffee");
        assert_eq!(transaction["amount"], 4.5);
        assert_eq!(transaction["type"], "Expense");
        assert_eq!(transaction["category"], "General");
        assert_eq!(transaction["date"], "2024-06-01");
    }

    #[tokio::test]
    async fn create_transaction_preserves_kind_case() {
        let (server, token) = create_app_with_user().await;

        let transaction = create_transaction(&server, &token, "Coffee", 4.5, "eXpEnSe").await;

        assert_eq!(transaction["type"], "eXpEnSe");
    }

    #[tokio::test]
    async fn create_transaction_fails_on_unknown_kind() {
        let (server, token) = create_app_with_user().await;

        let response = server
            .post("/api/transactions")
            .authorization_bearer(&token)
            .content_type("application/json")
            .json(&json!({
                "title": "Transfer",
                "amount": 10.0,
                "type": "transfer",
                "category": "General",
                "date": "2024-06-01",
            }))
            .await;

        response.assert_status_bad_request();
        assert!(response.json::<serde_json::Value>()["message"].is_string());
    }

    #[tokio::test]
    async fn create_transaction_fails_without_token() {
        let app = build_router().with_state(get_test_app_config());
        let server = TestServer::new(app).expect("Could not create test server.");

        let response = server
            .post("/api/transactions")
            .content_type("application/json")
            .json(&json!({
                "title": "Coffee",
                "amount": 4.5,
                "type": "Expense",
                "category": "General",
                "date": "2024-06-01",
            }))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.json::<serde_json::Value>()["message"],
            "Access denied. No token provided."
        );
    }

    #[tokio::test]
    async fn get_transactions_returns_creation_order() {
        let (server, token) = create_app_with_user().await;

        create_transaction(&server, &token, "Rent", 1200.0, "Expense").await;
        create_transaction(&server, &token, "Salary", 3000.0, "Income").await;
        create_transaction(&server, &token, "Coffee", 4.5, "Expense").await;

        let response = server
            .get("/api/transactions")
            .authorization_bearer(&token)
            .await;

        response.assert_status_ok();

        let body = response.json::<serde_json::Value>();
        let titles: Vec<&str> = body["transactions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|transaction| transaction["title"].as_str().unwrap())
            .collect();

        assert_eq!(titles, vec!["Rent", "Salary", "Coffee"]);
    }

    #[tokio::test]
    async fn update_transaction_keeps_absent_fields() {
        let (server, token) = create_app_with_user().await;
        let transaction = create_transaction(&server, &token, "Coffee", 50.0, "Expense").await;
        let id = transaction["id"].as_str().unwrap();

        let response = server
            .put(&format!("/api/transactions/{id}"))
            .authorization_bearer(&token)
            .content_type("application/json")
            .json(&json!({ "amount": 75.0 }))
            .await;

        response.assert_status_ok();

        let updated = response.json::<serde_json::Value>()["transaction"].clone();
        assert_eq!(updated["amount"], 75.0);
        assert_eq!(updated["title"], "Coffee");
        assert_eq!(updated["type"], "Expense");
    }

    #[tokio::test]
    async fn update_transaction_can_flip_kind() {
        let (server, token) = create_app_with_user().await;
        let transaction = create_transaction(&server, &token, "Refund", 20.0, "Expense").await;
        let id = transaction["id"].as_str().unwrap();

        let response = server
            .put(&format!("/api/transactions/{id}"))
            .authorization_bearer(&token)
            .content_type("application/json")
            .json(&json!({ "type": "Income" }))
            .await;

        response.assert_status_ok();
        assert_eq!(
            response.json::<serde_json::Value>()["transaction"]["type"],
            "Income"
        );
    }

    #[tokio::test]
    async fn update_transaction_fails_on_unknown_id() {
        let (server, token) = create_app_with_user().await;

        server
            .put("/api/transactions/doesnotexist")
            .authorization_bearer(&token)
            .content_type("application/json")
            .json(&json!({ "amount": 75.0 }))
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn delete_transaction_succeeds_then_404s() {
        let (server, token) = create_app_with_user().await;
        let transaction = create_transaction(&server, &token, "Coffee", 4.5, "Expense").await;
        let id = transaction["id"].as_str().unwrap();

        let response = server
            .delete(&format!("/api/transactions/{id}"))
            .authorization_bearer(&token)
            .await;

        response.assert_status_ok();
        assert_eq!(response.json::<serde_json::Value>()["success"], true);

        server
            .delete(&format!("/api/transactions/{id}"))
            .authorization_bearer(&token)
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn transactions_are_scoped_to_their_owner() {
        let (server, token) = create_app_with_user().await;
        let transaction = create_transaction(&server, &token, "Coffee", 4.5, "Expense").await;
        let id = transaction["id"].as_str().unwrap();

        let other_token = sign_up(&server, "other@example.com", "hunter3hunter3").await;

        // The other user sees an empty collection.
        let response = server
            .get("/api/transactions")
            .authorization_bearer(&other_token)
            .await;
        response.assert_status_ok();
        assert_eq!(
            response.json::<serde_json::Value>()["transactions"]
                .as_array()
                .unwrap()
                .len(),
            0
        );

        // Foreign IDs look like they do not exist.
        server
            .put(&format!("/api/transactions/{id}"))
            .authorization_bearer(&other_token)
            .content_type("application/json")
            .json(&json!({ "amount": 0.0 }))
            .await
            .assert_status_not_found();

        server
            .delete(&format!("/api/transactions/{id}"))
            .authorization_bearer(&other_token)
            .await
            .assert_status_not_found();

        // The original owner still has the transaction, untouched.
        let response = server
            .get("/api/transactions")
            .authorization_bearer(&token)
            .await;
        let body = response.json::<serde_json::Value>();
        assert_eq!(body["transactions"].as_array().unwrap().len(), 1);
        assert_eq!(body["transactions"][0]["amount"], 4.5);
    }
}
