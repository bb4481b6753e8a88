use std::{fmt::Display, ops::Deref};

use bcrypt::{hash, verify, BcryptError, DEFAULT_COST};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0} is not a valid password")]
pub struct PasswordError(pub String);

/// A bcrypt hash of a user's password, suitable for storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Create a hashed password from a validated password.
    ///
    /// # Errors
    ///
    /// This function will return an error if the password could not be hashed.
    pub fn new(raw_password: RawPassword) -> Result<Self, PasswordError> {
        match hash(&raw_password, DEFAULT_COST) {
            Ok(password_hash) => Ok(Self(password_hash)),
            Err(_) => Err(PasswordError(raw_password.into_string())),
        }
    }

    /// Create a new `PasswordHash` without any validation.
    ///
    /// # Safety
    ///
    /// This function should only be called on strings coming out of a trusted source such as the
    /// application's database.
    pub unsafe fn new_unchecked(raw_password_hash: String) -> Self {
        Self(raw_password_hash)
    }

    /// Check that `raw_password` matches the stored password.
    pub fn verify(&self, raw_password: &RawPassword) -> Result<bool, BcryptError> {
        verify(raw_password, self)
    }
}

impl Display for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for PasswordHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<[u8]> for PasswordHash {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl Deref for PasswordHash {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// A password that has been validated, but not yet hashed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPassword(String);

/// The minimum number of characters for a valid password.
const MIN_PASSWORD_LENGTH: usize = 8;

impl RawPassword {
    /// Create a new password from a string.
    ///
    /// # Errors
    ///
    /// This function will return an error if the password is less than
    /// [MIN_PASSWORD_LENGTH] characters long.
    pub fn new(raw_password_string: String) -> Result<Self, PasswordError> {
        if raw_password_string.chars().count() < MIN_PASSWORD_LENGTH {
            Err(PasswordError(raw_password_string))
        } else {
            Ok(Self(raw_password_string))
        }
    }

    /// Create a new `RawPassword` without any validation.
    ///
    /// # Safety
    ///
    /// This function should only be called on strings coming out of a trusted source, or in tests
    /// where costly validation is unnecessary.
    pub unsafe fn new_unchecked(raw_password_string: String) -> Self {
        Self(raw_password_string)
    }

    fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for RawPassword {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<[u8]> for RawPassword {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}
