//! The in-memory ledger: the client's session-scoped view of its transactions plus running
//! income and expense totals.
//!
//! State is owned by [LedgerState] and only changes through [LedgerState::apply], so every
//! mutation is an explicit, testable transition. Each store operation contributes a
//! [LedgerEvent::Pending] when it starts and exactly one fulfilled or rejected event when it
//! completes.

use common::{Transaction, TransactionId};

/// The client's cache of transactions and the totals derived from them.
///
/// After any fulfilled event, `total_income` equals the sum of amounts over transactions whose
/// kind is income, and `total_expense` the same for expenses. Create, update, and delete maintain
/// the totals incrementally; a list resync recomputes them from scratch and corrects any drift.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerState {
    transactions: Vec<Transaction>,
    total_income: f64,
    total_expense: f64,
    in_flight: u32,
    error: Option<String>,
}

/// A state transition of the ledger.
///
/// The fulfilled variants carry what the store returned: the created or updated transaction, the
/// full collection for a list, or the ID of a deleted transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerEvent {
    /// A store operation was dispatched and is now in flight.
    Pending,
    /// The store created a transaction and assigned it an ID.
    CreateFulfilled(Transaction),
    /// The store returned the full collection.
    ListFulfilled(Vec<Transaction>),
    /// The store applied an edit and returned the new version.
    UpdateFulfilled(Transaction),
    /// The store deleted the transaction with this ID.
    DeleteFulfilled(TransactionId),
    /// A store operation failed with this message.
    Rejected(String),
}

impl LedgerState {
    /// An empty ledger, as at session start.
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached transactions, in arrival order from the last list resync with transactions
    /// created since appended at the end.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn total_income(&self) -> f64 {
        self.total_income
    }

    pub fn total_expense(&self) -> f64 {
        self.total_expense
    }

    /// Whether any operation is currently in flight.
    ///
    /// Backed by a count of pending operations rather than a shared flag, so one operation
    /// completing cannot hide another that is still running.
    pub fn is_busy(&self) -> bool {
        self.in_flight > 0
    }

    /// The message of the most recent failure. Cleared when the next operation starts.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Apply a state transition.
    pub fn apply(&mut self, event: LedgerEvent) {
        match event {
            LedgerEvent::Pending => {
                self.in_flight += 1;
                self.error = None;
            }
            LedgerEvent::CreateFulfilled(transaction) => {
                self.settle();

                let (income, expense) = bucket_delta(&transaction);
                self.total_income += income;
                self.total_expense += expense;
                self.transactions.push(transaction);
            }
            LedgerEvent::ListFulfilled(transactions) => {
                self.settle();
                self.transactions = transactions;
                self.recompute_totals();
            }
            LedgerEvent::UpdateFulfilled(updated) => {
                self.settle();

                if let Some(index) = self.position(updated.id()) {
                    let (old_income, old_expense) = bucket_delta(&self.transactions[index]);
                    let (new_income, new_expense) = bucket_delta(&updated);

                    self.total_income += new_income - old_income;
                    self.total_expense += new_expense - old_expense;
                    self.transactions[index] = updated;
                }
            }
            LedgerEvent::DeleteFulfilled(id) => {
                self.settle();

                if let Some(index) = self.position(&id) {
                    let (income, expense) = bucket_delta(&self.transactions[index]);

                    self.total_income -= income;
                    self.total_expense -= expense;
                    self.transactions.remove(index);
                }
            }
            LedgerEvent::Rejected(message) => {
                self.settle();
                self.error = Some(message);
            }
        }
    }

    fn settle(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    fn position(&self, id: &TransactionId) -> Option<usize> {
        self.transactions
            .iter()
            .position(|transaction| transaction.id() == id)
    }

    /// Recompute both totals from the full collection, discarding the accumulators.
    fn recompute_totals(&mut self) {
        self.total_income = self
            .transactions
            .iter()
            .filter(|transaction| transaction.kind().is_income())
            .map(|transaction| sanitized_amount(transaction.amount()))
            .sum();

        self.total_expense = self
            .transactions
            .iter()
            .filter(|transaction| transaction.kind().is_expense())
            .map(|transaction| sanitized_amount(transaction.amount()))
            .sum();
    }
}

/// How much a transaction contributes to the (income, expense) totals.
///
/// A kind that is neither income nor expense contributes to neither bucket.
fn bucket_delta(transaction: &Transaction) -> (f64, f64) {
    let amount = sanitized_amount(transaction.amount());

    if transaction.kind().is_expense() {
        (0.0, amount)
    } else if transaction.kind().is_income() {
        (amount, 0.0)
    } else {
        (0.0, 0.0)
    }
}

/// Treat non-finite amounts as zero so a bad record can never poison a total.
fn sanitized_amount(amount: f64) -> f64 {
    if amount.is_finite() {
        amount
    } else {
        0.0
    }
}
