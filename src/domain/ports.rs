use super::borrower::{Borrower, CreditScore, NewBorrower};
use super::loan::{Loan, LoanProgress, NewLoan};
use super::transaction::{Direction, NewTransaction, Transaction};
use super::{BorrowerId, LoanId};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait BorrowerStore: Send + Sync {
    /// Stores a new borrower. A second registration with the same external id
    /// is rejected with a validation error.
    async fn create(&self, borrower: NewBorrower) -> Result<Borrower>;
    async fn get(&self, id: BorrowerId) -> Result<Option<Borrower>>;
    /// Fails with `NotFound` when the borrower is absent.
    async fn set_credit_score(&self, id: BorrowerId, score: CreditScore) -> Result<()>;
    /// Deletes the borrower together with their loans and loan progress.
    /// Ledger transactions are append-only and survive the delete.
    async fn remove(&self, id: BorrowerId) -> Result<bool>;
}

#[async_trait]
pub trait LoanStore: Send + Sync {
    /// Atomically stores a loan and its progress tracker.
    async fn open(&self, loan: NewLoan) -> Result<(Loan, LoanProgress)>;
    async fn get(&self, id: LoanId) -> Result<Option<Loan>>;
    async fn find_by_borrower(&self, borrower_id: BorrowerId) -> Result<Vec<Loan>>;
    async fn progress(&self, loan_id: LoanId) -> Result<Option<LoanProgress>>;
    /// Atomically writes the updated loan, its progress and the ledger entry
    /// for the payment. Either all three land or none do.
    async fn commit_payment(
        &self,
        loan: Loan,
        progress: LoanProgress,
        transaction: NewTransaction,
    ) -> Result<Transaction>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn append(&self, transaction: NewTransaction) -> Result<Transaction>;
    async fn by_borrower(
        &self,
        borrower_id: BorrowerId,
        direction: Option<Direction>,
    ) -> Result<Vec<Transaction>>;
    async fn by_loan(&self, loan_id: LoanId, direction: Option<Direction>) -> Result<Vec<Transaction>>;
}

pub type SharedBorrowerStore = Arc<dyn BorrowerStore>;
pub type SharedLoanStore = Arc<dyn LoanStore>;
pub type SharedTransactionStore = Arc<dyn TransactionStore>;
