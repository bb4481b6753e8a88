//! Domain types shared between the REST API server and the client library.

mod email;
mod password;
mod transaction;

pub use email::{Email, EmailAddressError};
pub use password::{PasswordError, PasswordHash, RawPassword};
pub use transaction::{
    NewTransaction, Transaction, TransactionError, TransactionId, TransactionKind,
    TransactionPatch,
};

use serde::{Deserialize, Serialize};

/// Alias for the integer row IDs used by the application database.
pub type DatabaseID = i64;

/// The ID of a registered user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserID(DatabaseID);

impl UserID {
    /// Create a user ID from a database row ID.
    pub fn new(id: DatabaseID) -> Self {
        Self(id)
    }

    /// The underlying row ID.
    pub fn as_i64(&self) -> DatabaseID {
        self.0
    }
}

/// A user of the application.
///
/// New instances should be created through the server's user registration
/// endpoint, which assigns the ID.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    id: UserID,
    email: Email,
    password_hash: PasswordHash,
}

impl User {
    /// Create a new `User`.
    ///
    /// Note that this does *not* add the user to the application database.
    pub fn new(id: UserID, email: Email, password_hash: PasswordHash) -> Self {
        Self {
            id,
            email,
            password_hash,
        }
    }

    pub fn id(&self) -> UserID {
        self.id
    }

    pub fn email(&self) -> &Email {
        &self.email
    }

    pub fn password_hash(&self) -> &PasswordHash {
        &self.password_hash
    }
}

#[cfg(test)]
mod user_tests {
    use super::*;

    #[test]
    fn create_user() {
        let id = UserID::new(1);
        let email = Email::new("foo@bar.baz").unwrap();
        let password_hash =
            unsafe { PasswordHash::new_unchecked("definitelyapasswordhash".to_string()) };

        let user = User::new(id, email.clone(), password_hash.clone());

        assert_eq!(user.id(), id);
        assert_eq!(user.email(), &email);
        assert_eq!(user.password_hash(), &password_hash);
    }
}
