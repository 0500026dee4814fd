use crate::domain::borrower::{Borrower, CreditScore, NewBorrower};
use crate::domain::loan::{Loan, LoanProgress, NewLoan};
use crate::domain::ports::{BorrowerStore, LoanStore, TransactionStore};
use crate::domain::transaction::{Direction, NewTransaction, Transaction};
use crate::domain::{BorrowerId, LoanId, TransactionId};
use crate::error::{LoanError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    borrowers: HashMap<BorrowerId, Borrower>,
    external_ids: HashMap<String, BorrowerId>,
    loans: HashMap<LoanId, Loan>,
    progress: HashMap<LoanId, LoanProgress>,
    transactions: Vec<Transaction>,
    last_borrower_id: BorrowerId,
    last_loan_id: LoanId,
}

impl Tables {
    fn next_transaction_id(&self) -> TransactionId {
        self.transactions.len() as TransactionId + 1
    }
}

/// A thread-safe in-memory store for borrowers, loans and the ledger.
///
/// All tables sit behind a single `Arc<RwLock<..>>`, so operations that touch
/// more than one table (opening a loan, committing a payment) are atomic.
/// Cloning shares the same tables, which lets one instance back every port.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BorrowerStore for InMemoryStore {
    async fn create(&self, borrower: NewBorrower) -> Result<Borrower> {
        let mut tables = self.tables.write().await;
        if tables.external_ids.contains_key(&borrower.external_id) {
            return Err(LoanError::ValidationError(format!(
                "externalId '{}' is already registered",
                borrower.external_id
            )));
        }
        tables.last_borrower_id += 1;
        let borrower = borrower.into_borrower(tables.last_borrower_id);
        tables
            .external_ids
            .insert(borrower.external_id.clone(), borrower.id);
        tables.borrowers.insert(borrower.id, borrower.clone());
        Ok(borrower)
    }

    async fn get(&self, id: BorrowerId) -> Result<Option<Borrower>> {
        let tables = self.tables.read().await;
        Ok(tables.borrowers.get(&id).cloned())
    }

    async fn set_credit_score(&self, id: BorrowerId, score: CreditScore) -> Result<()> {
        let mut tables = self.tables.write().await;
        let borrower = tables
            .borrowers
            .get_mut(&id)
            .ok_or_else(|| LoanError::not_found("Borrower", id))?;
        borrower.credit_score = Some(score);
        Ok(())
    }

    async fn remove(&self, id: BorrowerId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let Some(borrower) = tables.borrowers.remove(&id) else {
            return Ok(false);
        };
        tables.external_ids.remove(&borrower.external_id);
        let loan_ids: Vec<LoanId> = tables
            .loans
            .values()
            .filter(|loan| loan.borrower_id == id)
            .map(|loan| loan.id)
            .collect();
        for loan_id in loan_ids {
            tables.loans.remove(&loan_id);
            tables.progress.remove(&loan_id);
        }
        Ok(true)
    }
}

#[async_trait]
impl LoanStore for InMemoryStore {
    async fn open(&self, loan: NewLoan) -> Result<(Loan, LoanProgress)> {
        let mut tables = self.tables.write().await;
        if !tables.borrowers.contains_key(&loan.borrower_id) {
            return Err(LoanError::not_found("Borrower", loan.borrower_id));
        }
        tables.last_loan_id += 1;
        let (loan, progress) = loan.open(tables.last_loan_id);
        tables.loans.insert(loan.id, loan.clone());
        tables.progress.insert(loan.id, progress.clone());
        Ok((loan, progress))
    }

    async fn get(&self, id: LoanId) -> Result<Option<Loan>> {
        let tables = self.tables.read().await;
        Ok(tables.loans.get(&id).cloned())
    }

    async fn find_by_borrower(&self, borrower_id: BorrowerId) -> Result<Vec<Loan>> {
        let tables = self.tables.read().await;
        let mut loans: Vec<Loan> = tables
            .loans
            .values()
            .filter(|loan| loan.borrower_id == borrower_id)
            .cloned()
            .collect();
        loans.sort_by_key(|loan| loan.id);
        Ok(loans)
    }

    async fn progress(&self, loan_id: LoanId) -> Result<Option<LoanProgress>> {
        let tables = self.tables.read().await;
        Ok(tables.progress.get(&loan_id).cloned())
    }

    async fn commit_payment(
        &self,
        loan: Loan,
        progress: LoanProgress,
        transaction: NewTransaction,
    ) -> Result<Transaction> {
        let mut tables = self.tables.write().await;
        // Validate everything before the first write.
        if !tables.loans.contains_key(&loan.id) {
            return Err(LoanError::not_found("Loan", loan.id));
        }
        if progress.loan_id != loan.id || transaction.loan_id != Some(loan.id) {
            return Err(LoanError::internal(format!(
                "payment commit for loan {} carries mismatched references",
                loan.id
            )));
        }
        let transaction = transaction.into_transaction(tables.next_transaction_id());
        tables.transactions.push(transaction.clone());
        tables.progress.insert(loan.id, progress);
        tables.loans.insert(loan.id, loan);
        Ok(transaction)
    }
}

#[async_trait]
impl TransactionStore for InMemoryStore {
    async fn append(&self, transaction: NewTransaction) -> Result<Transaction> {
        let mut tables = self.tables.write().await;
        let transaction = transaction.into_transaction(tables.next_transaction_id());
        tables.transactions.push(transaction.clone());
        Ok(transaction)
    }

    async fn by_borrower(
        &self,
        borrower_id: BorrowerId,
        direction: Option<Direction>,
    ) -> Result<Vec<Transaction>> {
        let tables = self.tables.read().await;
        Ok(tables
            .transactions
            .iter()
            .filter(|tx| tx.borrower_id == borrower_id && tx.matches(direction))
            .cloned()
            .collect())
    }

    async fn by_loan(&self, loan_id: LoanId, direction: Option<Direction>) -> Result<Vec<Transaction>> {
        let tables = self.tables.read().await;
        Ok(tables
            .transactions
            .iter()
            .filter(|tx| tx.loan_id == Some(loan_id) && tx.matches(direction))
            .cloned()
            .collect())
    }
}
