//! SQLite persistence for users and transactions.

use chrono::NaiveDate;
use common::{
    Email, NewTransaction, PasswordHash, Transaction, TransactionId, TransactionKind,
    TransactionPatch, User, UserID,
};
use rusqlite::{Connection, Row};
use thiserror::Error;
use uuid::Uuid;

/// Errors originating from operations on the app's database.
#[derive(Debug, Error)]
pub enum DbError {
    /// The user's email already exists in the database. The client should try again with a
    /// different email address.
    #[error("the email address is already registered")]
    DuplicateEmail,

    /// The row could not be found with the provided info (e.g., ID). The client should try again
    /// with different parameters.
    #[error("the requested record could not be found")]
    NotFound,

    /// Wrapper for SQLite errors not handled by the other enum entries.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for DbError {
    fn from(error: rusqlite::Error) -> Self {
        match error {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("email") =>
            {
                DbError::DuplicateEmail
            }
            rusqlite::Error::QueryReturnedNoRows => DbError::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {error}");
                DbError::SqlError(error)
            }
        }
    }
}

/// A trait for adding an object schema to the database.
pub trait CreateTable {
    /// Create a table for the model.
    ///
    /// # Errors
    /// Returns an error if the table already exists or if there is an SQL error.
    fn create_table(connection: &Connection) -> Result<(), DbError>;
}

/// A trait for mapping from a `rusqlite::Row` from a SQLite database to a concrete rust type.
pub trait MapRow {
    type ReturnType;

    /// Convert a row into a concrete type.
    ///
    /// **Note:** This function expects that the row object contains all the table columns in the
    /// order they were defined.
    ///
    /// # Errors
    /// Returns an error if a row item cannot be converted into the corresponding rust type, or if
    /// an invalid column index was used.
    fn map_row(row: &Row) -> Result<Self::ReturnType, rusqlite::Error> {
        Self::map_row_with_offset(row, 0)
    }

    /// Convert a row into a concrete type, reading columns starting at `offset`.
    ///
    /// # Errors
    /// Returns an error if a row item cannot be converted into the corresponding rust type, or if
    /// an invalid column index was used.
    fn map_row_with_offset(row: &Row, offset: usize) -> Result<Self::ReturnType, rusqlite::Error>;
}

/// A trait for inserting a record into the application database.
pub trait Insert {
    type ResultType;

    /// Insert the object into the application database.
    ///
    /// # Errors
    ///
    /// This function will return an error if the insertion failed.
    fn insert(self, connection: &Connection) -> Result<Self::ResultType, DbError>;
}

/// A trait for retrieving records from the application database by a field of type `T`.
pub trait SelectBy<T> {
    type ResultType;

    /// Select records from the application database that match `field`.
    fn select(field: T, connection: &Connection) -> Result<Self::ResultType, DbError>;
}

/// Create the tables for the application's domain models.
///
/// # Errors
/// Returns an error if the tables already exist or if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), DbError> {
    User::create_table(connection)?;
    Transaction::create_table(connection)?;

    Ok(())
}

impl CreateTable for User {
    fn create_table(connection: &Connection) -> Result<(), DbError> {
        connection.execute(
            "CREATE TABLE user (
                    id INTEGER PRIMARY KEY,
                    email TEXT UNIQUE NOT NULL,
                    password TEXT NOT NULL
                    )",
            (),
        )?;

        Ok(())
    }
}

impl MapRow for User {
    type ReturnType = Self;

    fn map_row_with_offset(row: &Row, offset: usize) -> Result<Self, rusqlite::Error> {
        Ok(User::new(
            UserID::new(row.get(offset)?),
            Email::new_unchecked(row.get(offset + 1)?),
            // SAFETY: The password column only ever holds hashes produced by `PasswordHash`.
            unsafe { PasswordHash::new_unchecked(row.get(offset + 2)?) },
        ))
    }
}

/// Data for a user that has not been registered yet.
#[derive(Debug)]
pub struct NewUser {
    pub email: Email,
    pub password_hash: PasswordHash,
}

impl Insert for NewUser {
    type ResultType = User;

    fn insert(self, connection: &Connection) -> Result<Self::ResultType, DbError> {
        connection.execute(
            "INSERT INTO user (email, password) VALUES (?1, ?2)",
            (self.email.as_str(), self.password_hash.as_ref() as &str),
        )?;

        let id = UserID::new(connection.last_insert_rowid());

        Ok(User::new(id, self.email, self.password_hash))
    }
}

impl SelectBy<&Email> for User {
    type ResultType = Self;

    /// Retrieve the user with the given email address.
    ///
    /// # Errors
    /// This function will return a [DbError::NotFound] if there is no user with `email`, or a
    /// [DbError::SqlError] if there is some other SQL error.
    fn select(email: &Email, connection: &Connection) -> Result<Self::ResultType, DbError> {
        let user = connection
            .prepare("SELECT id, email, password FROM user WHERE email = :email")?
            .query_row(&[(":email", email.as_str())], User::map_row)?;

        Ok(user)
    }
}

impl CreateTable for Transaction {
    fn create_table(connection: &Connection) -> Result<(), DbError> {
        connection.execute(
            "CREATE TABLE \"transaction\" (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    amount REAL NOT NULL,
                    kind TEXT NOT NULL,
                    category TEXT NOT NULL,
                    date TEXT NOT NULL,
                    user_id INTEGER NOT NULL,
                    FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                    )",
            (),
        )?;

        Ok(())
    }
}

impl MapRow for Transaction {
    type ReturnType = Self;

    fn map_row_with_offset(row: &Row, offset: usize) -> Result<Self, rusqlite::Error> {
        Ok(Transaction::new(
            TransactionId::new(row.get::<_, String>(offset)?),
            row.get(offset + 1)?,
            row.get(offset + 2)?,
            TransactionKind::new_unchecked(row.get::<_, String>(offset + 3)?),
            row.get(offset + 4)?,
            row.get(offset + 5)?,
        ))
    }
}

/// A candidate transaction tied to the user creating it.
#[derive(Debug)]
pub struct TransactionData {
    pub title: String,
    pub amount: f64,
    pub kind: TransactionKind,
    pub category: String,
    pub date: NaiveDate,
    pub user_id: UserID,
}

impl TransactionData {
    /// Pair a validated candidate from the API with the authenticated user.
    pub fn from_new_transaction(new_transaction: NewTransaction, user_id: UserID) -> Self {
        Self {
            title: new_transaction.title,
            amount: new_transaction.amount,
            kind: new_transaction.kind,
            category: new_transaction.category,
            date: new_transaction.date,
            user_id,
        }
    }
}

impl Insert for TransactionData {
    type ResultType = Transaction;

    /// Insert the transaction into the database, assigning it a fresh opaque ID.
    ///
    /// # Errors
    /// This function will return a [DbError::SqlError] if there is an SQL error (e.g., the user
    /// ID violates the foreign key constraint).
    fn insert(self, connection: &Connection) -> Result<Self::ResultType, DbError> {
        let id = Uuid::new_v4().simple().to_string();

        let transaction = connection
            .prepare(
                "INSERT INTO \"transaction\" (id, title, amount, kind, category, date, user_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 RETURNING id, title, amount, kind, category, date",
            )?
            .query_row(
                (
                    &id,
                    &self.title,
                    self.amount,
                    self.kind.as_str(),
                    &self.category,
                    &self.date,
                    self.user_id.as_i64(),
                ),
                Transaction::map_row,
            )?;

        Ok(transaction)
    }
}

impl SelectBy<UserID> for Transaction {
    type ResultType = Vec<Transaction>;

    /// Retrieve the transactions belonging to `user_id`, in the order they were created.
    ///
    /// An empty vector is returned if the user has no transactions.
    ///
    /// # Errors
    /// This function will return a [DbError::SqlError] if there is an SQL error.
    fn select(user_id: UserID, connection: &Connection) -> Result<Self::ResultType, DbError> {
        connection
            .prepare(
                "SELECT id, title, amount, kind, category, date FROM \"transaction\"
                 WHERE user_id = :user_id
                 ORDER BY rowid",
            )?
            .query_map(&[(":user_id", &user_id.as_i64())], Transaction::map_row)?
            .map(|maybe_transaction| maybe_transaction.map_err(DbError::SqlError))
            .collect()
    }
}

/// Select a single transaction scoped to its owner.
fn select_transaction(
    id: &TransactionId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Transaction, DbError> {
    let transaction = connection
        .prepare(
            "SELECT id, title, amount, kind, category, date FROM \"transaction\"
             WHERE id = :id AND user_id = :user_id",
        )?
        .query_row(
            rusqlite::named_params! {
                ":id": id.as_str(),
                ":user_id": user_id.as_i64(),
            },
            Transaction::map_row,
        )?;

    Ok(transaction)
}

/// Apply `patch` to the transaction with `id`, keeping stored values for absent fields.
///
/// The transaction must belong to `user_id`; rows owned by other users are invisible here so the
/// caller cannot learn whether a foreign ID exists.
///
/// # Errors
/// This function will return a [DbError::NotFound] if `id` does not refer to a transaction owned
/// by `user_id`, or a [DbError::SqlError] if there is some other SQL error.
pub fn update_transaction(
    id: &TransactionId,
    user_id: UserID,
    patch: TransactionPatch,
    connection: &Connection,
) -> Result<Transaction, DbError> {
    let existing = select_transaction(id, user_id, connection)?;

    let updated = Transaction::new(
        existing.id().clone(),
        patch.title.unwrap_or_else(|| existing.title().to_owned()),
        patch.amount.unwrap_or(existing.amount()),
        patch.kind.unwrap_or_else(|| existing.kind().clone()),
        patch
            .category
            .unwrap_or_else(|| existing.category().to_owned()),
        patch.date.unwrap_or(*existing.date()),
    );

    connection.execute(
        "UPDATE \"transaction\"
         SET title = ?1, amount = ?2, kind = ?3, category = ?4, date = ?5
         WHERE id = ?6 AND user_id = ?7",
        (
            updated.title(),
            updated.amount(),
            updated.kind().as_str(),
            updated.category(),
            updated.date(),
            updated.id().as_str(),
            user_id.as_i64(),
        ),
    )?;

    Ok(updated)
}

/// Delete the transaction with `id`, scoped to its owner.
///
/// # Errors
/// This function will return a [DbError::NotFound] if `id` does not refer to a transaction owned
/// by `user_id`, or a [DbError::SqlError] if there is some other SQL error.
pub fn delete_transaction(
    id: &TransactionId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), DbError> {
    let rows_deleted = connection.execute(
        "DELETE FROM \"transaction\" WHERE id = ?1 AND user_id = ?2",
        (id.as_str(), user_id.as_i64()),
    )?;

    if rows_deleted == 0 {
        Err(DbError::NotFound)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod user_tests {
    use common::{Email, PasswordHash, User};
    use rusqlite::Connection;

    use super::{initialize, DbError, Insert, NewUser, SelectBy};

    fn get_test_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();

        connection
    }

    fn test_password_hash() -> PasswordHash {
        unsafe {
            PasswordHash::new_unchecked(
                "$2b$12$Gwf0uvxH3L7JLfo0CC/NCOoijK2vQ/wbgP.LeNup8vj6gg31IiFkm".to_owned(),
            )
        }
    }

    #[test]
    fn insert_and_select_user() {
        let connection = get_test_connection();
        let email = Email::new("foo@bar.baz").unwrap();

        let inserted = NewUser {
            email: email.clone(),
            password_hash: test_password_hash(),
        }
        .insert(&connection)
        .unwrap();

        let selected = User::select(&email, &connection).unwrap();

        assert_eq!(inserted, selected);
    }

    #[test]
    fn insert_fails_on_duplicate_email() {
        let connection = get_test_connection();
        let email = Email::new("foo@bar.baz").unwrap();

        NewUser {
            email: email.clone(),
            password_hash: test_password_hash(),
        }
        .insert(&connection)
        .unwrap();

        let result = NewUser {
            email,
            password_hash: test_password_hash(),
        }
        .insert(&connection);

        assert!(matches!(result, Err(DbError::DuplicateEmail)));
    }

    #[test]
    fn select_fails_on_unknown_email() {
        let connection = get_test_connection();

        let result = User::select(&Email::new("nobody@example.com").unwrap(), &connection);

        assert!(matches!(result, Err(DbError::NotFound)));
    }
}
