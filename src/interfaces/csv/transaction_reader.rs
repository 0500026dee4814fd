use crate::domain::BorrowerId;
use crate::domain::money::Amount;
use crate::domain::transaction::{Direction, NewTransaction};
use crate::error::{LoanError, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::io::Read;

/// One row of a ledger import: `borrower_id,direction,amount,at`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LedgerRow {
    pub borrower_id: BorrowerId,
    pub direction: Direction,
    pub amount: Amount,
    pub at: DateTime<Utc>,
}

impl From<LedgerRow> for NewTransaction {
    fn from(row: LedgerRow) -> Self {
        NewTransaction {
            borrower_id: row.borrower_id,
            loan_id: None,
            direction: row.direction,
            amount: row.amount,
            at: row.at,
        }
    }
}

/// Reads ledger rows from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over `Result<NewTransaction>`.
/// Whitespace around fields is trimmed.
pub struct TransactionReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> TransactionReader<R> {
    /// Creates a new `TransactionReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes rows, so large ledgers are streamed.
    pub fn transactions(self) -> impl Iterator<Item = Result<NewTransaction>> {
        self.reader.into_deserialize::<LedgerRow>().map(|result| {
            result.map(NewTransaction::from).map_err(LoanError::from)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reader_valid_stream() {
        let data = "borrower_id, direction, amount, at\n\
                    1, credit, 250000.50, 2024-01-05T10:00:00Z\n\
                    2, debit, 1200, 2024-01-06T00:00:00Z";
        let reader = TransactionReader::new(data.as_bytes());
        let results: Vec<Result<NewTransaction>> = reader.transactions().collect();

        assert_eq!(results.len(), 2);
        let first = results[0].as_ref().unwrap();
        assert_eq!(first.borrower_id, 1);
        assert_eq!(first.direction, Direction::Credit);
        assert_eq!(first.amount.value(), dec!(250000.50));
        assert_eq!(first.loan_id, None);
        assert_eq!(results[1].as_ref().unwrap().direction, Direction::Debit);
    }

    #[test]
    fn test_reader_rejects_unknown_direction() {
        let data = "borrower_id,direction,amount,at\n1,refund,10,2024-01-05T10:00:00Z";
        let results: Vec<_> = TransactionReader::new(data.as_bytes()).transactions().collect();
        assert!(matches!(results[0], Err(LoanError::CsvError(_))));
    }

    #[test]
    fn test_reader_rejects_non_positive_amount() {
        let data = "borrower_id,direction,amount,at\n1,credit,0,2024-01-05T10:00:00Z";
        let results: Vec<_> = TransactionReader::new(data.as_bytes()).transactions().collect();
        assert!(results[0].is_err());
    }
}
