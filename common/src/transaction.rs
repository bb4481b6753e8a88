//! This file defines the type `Transaction`, the core type of the money-tracking part of the
//! application, along with the payload types used to create and edit transactions.

use std::fmt::Display;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Errors that can occur while validating transaction data from a client.
#[derive(Debug, Error, PartialEq)]
pub enum TransactionError {
    /// An empty string was used as a transaction title.
    #[error("title must not be empty")]
    EmptyTitle,

    /// The amount was negative or not a number.
    #[error("amount must be a non-negative number")]
    InvalidAmount,

    /// The transaction type was neither income nor expense.
    #[error("\"{0}\" is not a valid transaction type, expected Income or Expense")]
    UnknownKind(String),
}

/// The identifier of a transaction.
///
/// IDs are opaque strings assigned by the server when a transaction is created. Clients should
/// never mint their own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(String);

impl TransactionId {
    /// Wrap a server-assigned identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a transaction records money earned (income) or spent (expense).
///
/// The caller's original spelling is preserved, comparisons ignore ASCII case. Reading a kind
/// that is neither income nor expense is tolerated (both predicates return false) so that stored
/// data never breaks a reader, but [TransactionKind::new] rejects it at the write boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionKind(String);

impl TransactionKind {
    /// Create a transaction kind, rejecting anything that is not income or expense.
    ///
    /// # Errors
    ///
    /// Returns [TransactionError::UnknownKind] if `raw` is not `income` or `expense` (any case).
    pub fn new(raw: impl Into<String>) -> Result<Self, TransactionError> {
        let raw = raw.into();

        if raw.eq_ignore_ascii_case("income") || raw.eq_ignore_ascii_case("expense") {
            Ok(Self(raw))
        } else {
            Err(TransactionError::UnknownKind(raw))
        }
    }

    /// Create a transaction kind without any validation.
    ///
    /// Intended for data coming out of the application database, which was validated on the way
    /// in.
    pub fn new_unchecked(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The canonical income kind.
    pub fn income() -> Self {
        Self("Income".to_string())
    }

    /// The canonical expense kind.
    pub fn expense() -> Self {
        Self("Expense".to_string())
    }

    pub fn is_income(&self) -> bool {
        self.0.eq_ignore_ascii_case("income")
    }

    pub fn is_expense(&self) -> bool {
        self.0.eq_ignore_ascii_case("expense")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An income or expense, i.e. an event where money was either earned or spent.
///
/// New instances come from the server, which assigns the ID. The `type` field in the wire format
/// maps to [Transaction::kind].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    id: TransactionId,
    title: String,
    #[serde(default, deserialize_with = "deserialize_amount")]
    amount: f64,
    #[serde(rename = "type")]
    kind: TransactionKind,
    category: String,
    date: NaiveDate,
}

impl Transaction {
    /// Create a new `Transaction`.
    ///
    /// Note that this does *not* add the transaction to the server's database.
    pub fn new(
        id: TransactionId,
        title: String,
        amount: f64,
        kind: TransactionKind,
        category: String,
        date: NaiveDate,
    ) -> Self {
        Self {
            id,
            title,
            amount,
            kind,
            category,
            date,
        }
    }

    pub fn id(&self) -> &TransactionId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// The amount of money earned or spent in this transaction.
    pub fn amount(&self) -> f64 {
        self.amount
    }

    /// Whether this transaction is an income or an expense.
    pub fn kind(&self) -> &TransactionKind {
        &self.kind
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    /// When the transaction happened. The time of day is not significant.
    pub fn date(&self) -> &NaiveDate {
        &self.date
    }
}

/// Coerce the wire representation of an amount to a finite number.
///
/// Accepts a JSON number, a numeric string, or null. Anything else, and anything non-finite,
/// becomes zero so that totals derived from amounts can never become NaN.
fn deserialize_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;

    let amount = match value {
        serde_json::Value::Number(number) => number.as_f64().unwrap_or(0.0),
        serde_json::Value::String(text) => text.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    };

    if amount.is_finite() {
        Ok(amount)
    } else {
        Ok(0.0)
    }
}

/// A candidate transaction that has not been assigned an ID yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub category: String,
    pub date: NaiveDate,
}

impl NewTransaction {
    /// Check the candidate against the write-boundary rules: non-empty title, non-negative
    /// finite amount, recognised kind.
    ///
    /// # Errors
    ///
    /// Returns the first [TransactionError] the candidate violates.
    pub fn validate(&self) -> Result<(), TransactionError> {
        if self.title.trim().is_empty() {
            return Err(TransactionError::EmptyTitle);
        }

        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(TransactionError::InvalidAmount);
        }

        TransactionKind::new(self.kind.as_str())?;

        Ok(())
    }
}

/// A partial edit of an existing transaction. Absent fields keep their stored values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<TransactionKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

impl TransactionPatch {
    /// Check the fields that are present against the same rules as [NewTransaction::validate].
    ///
    /// # Errors
    ///
    /// Returns the first [TransactionError] a present field violates.
    pub fn validate(&self) -> Result<(), TransactionError> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(TransactionError::EmptyTitle);
            }
        }

        if let Some(amount) = self.amount {
            if !amount.is_finite() || amount < 0.0 {
                return Err(TransactionError::InvalidAmount);
            }
        }

        if let Some(kind) = &self.kind {
            TransactionKind::new(kind.as_str())?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod transaction_kind_tests {
    use super::{TransactionError, TransactionKind};

    #[test]
    fn new_accepts_income_and_expense_in_any_case() {
        for raw in ["Income", "income", "INCOME", "Expense", "expense", "eXpEnSe"] {
            assert!(TransactionKind::new(raw).is_ok(), "rejected {raw}");
        }
    }

    #[test]
    fn new_rejects_unknown_kind() {
        let result = TransactionKind::new("transfer");

        assert_eq!(
            result,
            Err(TransactionError::UnknownKind("transfer".to_string()))
        );
    }

    #[test]
    fn new_preserves_original_spelling() {
        let kind = TransactionKind::new("eXpEnSe").unwrap();

        assert_eq!(kind.as_str(), "eXpEnSe");
        assert!(kind.is_expense());
        assert!(!kind.is_income());
    }
}

#[cfg(test)]
mod transaction_tests {
    use chrono::NaiveDate;

    use super::{NewTransaction, Transaction, TransactionError, TransactionKind};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn serializes_kind_under_type_key() {
        let transaction = Transaction::new(
            super::TransactionId::new("abc123"),
            "Coffee".to_string(),
            4.5,
            TransactionKind::expense(),
            "Drinks".to_string(),
            date(),
        );

        let json = serde_json::to_value(&transaction).unwrap();

        assert_eq!(json["type"], "Expense");
        assert_eq!(json["id"], "abc123");
        assert_eq!(json["date"], "2024-06-01");
    }

    #[test]
    fn deserializes_string_amount() {
        let json = r#"{
            "id": "abc123",
            "title": "Coffee",
            "amount": "4.50",
            "type": "expense",
            "category": "Drinks",
            "date": "2024-06-01"
        }"#;

        let transaction: Transaction = serde_json::from_str(json).unwrap();

        assert_eq!(transaction.amount(), 4.5);
    }

    #[test]
    fn deserializes_missing_or_invalid_amount_as_zero() {
        for amount_fragment in ["", r#""amount": null,"#, r#""amount": "lots","#] {
            let json = format!(
                r#"{{
                    "id": "abc123",
                    "title": "Coffee",
                    {amount_fragment}
                    "type": "expense",
                    "category": "Drinks",
                    "date": "2024-06-01"
                }}"#
            );

            let transaction: Transaction = serde_json::from_str(&json).unwrap();

            assert_eq!(transaction.amount(), 0.0, "input: {amount_fragment:?}");
        }
    }

    #[test]
    fn validate_rejects_empty_title() {
        let candidate = NewTransaction {
            title: "  ".to_string(),
            amount: 1.0,
            kind: TransactionKind::income(),
            category: "Misc".to_string(),
            date: date(),
        };

        assert_eq!(candidate.validate(), Err(TransactionError::EmptyTitle));
    }

    #[test]
    fn validate_rejects_negative_amount() {
        let candidate = NewTransaction {
            title: "Refund".to_string(),
            amount: -10.0,
            kind: TransactionKind::income(),
            category: "Misc".to_string(),
            date: date(),
        };

        assert_eq!(candidate.validate(), Err(TransactionError::InvalidAmount));
    }

    #[test]
    fn validate_rejects_unknown_kind() {
        let candidate = NewTransaction {
            title: "Transfer".to_string(),
            amount: 10.0,
            kind: TransactionKind::new_unchecked("transfer"),
            category: "Misc".to_string(),
            date: date(),
        };

        assert_eq!(
            candidate.validate(),
            Err(TransactionError::UnknownKind("transfer".to_string()))
        );
    }
}
