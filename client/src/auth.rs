//! Local credential storage and the sign-in flow.
//!
//! The bearer token obtained at sign-in is kept in a fixed, well-known file under the user's
//! config directory so that every client on the machine picks up the same session.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::store_client::StoreError;

/// Authentication credentials stored locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthCredentials {
    /// Bearer token for the transaction store API.
    pub token: String,
    /// API base URL (e.g., "http://localhost:5000").
    pub api_base: String,
    /// Email of the signed-in user (for display).
    #[serde(default)]
    pub email: Option<String>,
}

impl AuthCredentials {
    pub fn new(token: String, api_base: String) -> Self {
        Self {
            token,
            api_base,
            email: None,
        }
    }
}

/// Returns the path to the auth credentials file.
pub fn auth_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config_dir| config_dir.join("expense-tracker/auth.json"))
}

/// Load saved auth credentials from disk.
///
/// Returns None if no credentials are saved or if the file is invalid.
pub fn load_auth() -> Option<AuthCredentials> {
    let path = auth_file_path()?;
    let contents = std::fs::read_to_string(&path).ok()?;

    serde_json::from_str(&contents).ok()
}

/// Save auth credentials to disk, creating the parent directory if it doesn't exist.
///
/// Sets 0600 permissions on Unix.
pub fn save_auth(credentials: &AuthCredentials) -> Result<(), String> {
    let path = auth_file_path().ok_or("Could not determine config directory")?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|error| format!("Failed to create config directory: {error}"))?;
    }

    let contents = serde_json::to_string_pretty(credentials)
        .map_err(|error| format!("Failed to serialize credentials: {error}"))?;

    std::fs::write(&path, &contents)
        .map_err(|error| format!("Failed to write auth file: {error}"))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, permissions)
            .map_err(|error| format!("Failed to set file permissions: {error}"))?;
    }

    Ok(())
}

/// Delete saved auth credentials, signing the user out locally.
pub fn delete_auth() -> Result<(), String> {
    let Some(path) = auth_file_path() else {
        return Ok(());
    };

    if path.exists() {
        std::fs::remove_file(&path)
            .map_err(|error| format!("Failed to delete auth file: {error}"))?;
    }

    Ok(())
}

#[derive(Debug, Deserialize)]
struct TokenEnvelope {
    token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Exchange an email and password for a bearer token at `{api_base}/api/sign_in`.
///
/// The caller decides whether to persist the token with [save_auth].
///
/// # Errors
///
/// Returns a [StoreError::Rejected] carrying the server's message when the credentials are
/// refused, or a [StoreError::Network] if the server could not be reached.
pub async fn sign_in(
    api_base: &str,
    email: &str,
    password: &str,
) -> Result<String, StoreError> {
    let response = reqwest::Client::new()
        .post(format!("{}/api/sign_in", api_base.trim_end_matches('/')))
        .json(&serde_json::json!({ "email": email, "password": password }))
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message);

        return Err(StoreError::Rejected { status, message });
    }

    let envelope = response.json::<TokenEnvelope>().await?;

    Ok(envelope.token)
}
