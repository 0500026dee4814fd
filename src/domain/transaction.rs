use super::money::Amount;
use super::{BorrowerId, LoanId, TransactionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which way money moved on the borrower's ledger.
///
/// `Credit` raises the ledger balance and `Debit` lowers it. Loan repayments
/// are credits: they are money received against the borrower's record.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Credit,
    Debit,
}

/// A ledger entry that has not been assigned an id yet.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct NewTransaction {
    pub borrower_id: BorrowerId,
    pub loan_id: Option<LoanId>,
    pub direction: Direction,
    pub amount: Amount,
    pub at: DateTime<Utc>,
}

impl NewTransaction {
    pub fn into_transaction(self, id: TransactionId) -> Transaction {
        Transaction {
            id,
            borrower_id: self.borrower_id,
            loan_id: self.loan_id,
            direction: self.direction,
            amount: self.amount,
            at: self.at,
        }
    }
}

/// An immutable, append-only ledger entry.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub borrower_id: BorrowerId,
    /// Set for loan repayments, empty for other account activity.
    pub loan_id: Option<LoanId>,
    pub direction: Direction,
    pub amount: Amount,
    pub at: DateTime<Utc>,
}

impl Transaction {
    pub fn matches(&self, direction: Option<Direction>) -> bool {
        direction.is_none_or(|d| d == self.direction)
    }
}
