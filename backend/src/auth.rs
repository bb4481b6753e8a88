//! Bearer-token authentication: token issuance at sign-in, and the request gate that turns an
//! `Authorization` header into verified [Claims] for the route handlers.

use axum::{
    async_trait,
    body::Body,
    extract::{FromRef, FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, Response, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};
use common::{Email, RawPassword, User, UserID};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    config::AppConfig,
    db::{DbError, SelectBy},
};

/// The contents of a JSON Web Token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The expiry time of the token.
    pub exp: usize,
    /// The time the token was issued.
    pub iat: usize,
    /// The ID of the user the token was issued to.
    pub sub: UserID,
}

const BEARER_PREFIX: &str = "Bearer ";

#[async_trait]
impl<S> FromRequestParts<S> for Claims
where
    AppConfig: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // The header is parsed by hand rather than with a typed extractor so that a missing or
        // non-bearer header can be told apart from a token that fails verification.
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AuthError::MissingToken)?;

        let token = header
            .strip_prefix(BEARER_PREFIX)
            .ok_or(AuthError::MissingToken)?;

        let config = AppConfig::from_ref(state);

        // An empty token (header ends at "Bearer ") is still handed to the verifier, which
        // rejects it like any other malformed token.
        let token_data = decode_jwt(token, config.decoding_key())?;

        Ok(token_data.claims)
    }
}

/// The email and password submitted at sign-in.
#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: Email,
    pub password: RawPassword,
}

#[derive(Debug, PartialEq)]
pub enum AuthError {
    /// The request has no `Authorization` header, or the header does not use the bearer scheme.
    MissingToken,
    /// The bearer token failed verification (expired, malformed, or bad signature).
    InvalidToken,
    /// The email and password did not match a registered user.
    WrongCredentials,
    /// The token could not be created.
    TokenCreation,
    /// An unexpected error occurred on the server.
    InternalError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response<Body> {
        let (status, message) = match self {
            AuthError::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "Access denied. No token provided.",
            ),
            AuthError::InvalidToken => (StatusCode::BAD_REQUEST, "Invalid or expired token"),
            AuthError::WrongCredentials => (StatusCode::UNAUTHORIZED, "Incorrect email or password"),
            AuthError::TokenCreation => (StatusCode::INTERNAL_SERVER_ERROR, "Token creation error"),
            AuthError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = Json(json!({
            "success": false,
            "message": message,
        }));

        (status, body).into_response()
    }
}

/// Handler for sign-in requests. Responds with `{ "token": <JWT> }` on success.
///
/// # Errors
///
/// This function will return an error if the email does not belong to a registered user, if the
/// password is not correct, or if an internal error occurred while verifying the password or
/// creating the token.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn sign_in(
    State(config): State<AppConfig>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<serde_json::Value>, AuthError> {
    let user = User::select(&credentials.email, &config.db_connection().lock().unwrap()).map_err(
        |error| match error {
            DbError::NotFound => AuthError::WrongCredentials,
            error => {
                tracing::error!("Error matching user: {error}");
                AuthError::InternalError
            }
        },
    )?;

    let password_is_correct = user.password_hash().verify(&credentials.password).map_err(
        |error| {
            tracing::error!("Error verifying password: {error}");
            AuthError::InternalError
        },
    )?;

    if !password_is_correct {
        return Err(AuthError::WrongCredentials);
    }

    let token = encode_jwt(user.id(), config.encoding_key())?;

    Ok(Json(json!({ "token": token })))
}

/// The validity period of an issued token.
const TOKEN_DURATION_MINUTES: i64 = 15;

pub(crate) fn encode_jwt(
    user_id: UserID,
    encoding_key: &EncodingKey,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = Claims {
        exp: (now + Duration::minutes(TOKEN_DURATION_MINUTES)).timestamp() as usize,
        iat: now.timestamp() as usize,
        sub: user_id,
    };

    encode(&Header::default(), &claims, encoding_key).map_err(|error| {
        tracing::error!("Error encoding JWT: {error}");
        AuthError::TokenCreation
    })
}

fn decode_jwt(token: &str, decoding_key: &DecodingKey) -> Result<TokenData<Claims>, AuthError> {
    decode(token, decoding_key, &Validation::default()).map_err(|_| AuthError::InvalidToken)
}
