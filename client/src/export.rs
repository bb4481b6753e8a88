//! CSV export of the ledger's transactions.

use std::io;

use common::Transaction;
use csv::Writer;

/// Render `transactions` as CSV with a `Title,Amount,Type,Category,Date` header, one row per
/// transaction in the given order.
///
/// # Errors
///
/// This function will return an error if a record cannot be written, which should not happen
/// when writing to an in-memory buffer.
pub fn transactions_to_csv(transactions: &[Transaction]) -> Result<String, csv::Error> {
    let mut writer = Writer::from_writer(Vec::new());

    writer.write_record(["Title", "Amount", "Type", "Category", "Date"])?;

    for transaction in transactions {
        writer.write_record([
            transaction.title(),
            &transaction.amount().to_string(),
            transaction.kind().as_str(),
            transaction.category(),
            &transaction.date().to_string(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|error| csv::Error::from(error.into_error()))?;

    String::from_utf8(bytes).map_err(|error| {
        csv::Error::from(io::Error::new(io::ErrorKind::InvalidData, error))
    })
}
