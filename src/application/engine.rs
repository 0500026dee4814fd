use crate::application::jobs::JobQueue;
use crate::application::locks::KeyedLocks;
use crate::config::LoanConfig;
use crate::domain::borrower::{Borrower, NewBorrower};
use crate::domain::ledger::{LoanApplication, LoanLedger};
use crate::domain::loan::{Loan, LoanProgress, LoanState};
use crate::domain::money::Amount;
use crate::domain::ports::{SharedBorrowerStore, SharedLoanStore, SharedTransactionStore};
use crate::domain::schedule::Installment;
use crate::domain::statement::{Statement, build_statement};
use crate::domain::transaction::{NewTransaction, Transaction};
use crate::domain::{BorrowerId, LoanId, TransactionId};
use crate::error::{LoanError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanApproval {
    pub loan_id: LoanId,
    pub monthly_emi: Decimal,
    pub due_dates: Vec<Installment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub loan_id: LoanId,
    pub transaction_id: TransactionId,
    pub remaining_balance: Decimal,
    pub next_due_date: NaiveDate,
    pub next_due_amount: Decimal,
    pub installments_remaining: u32,
    pub active: bool,
}

/// The main entry point for loan operations.
///
/// `LoanEngine` owns the storage ports and the job queue. Writes to one loan
/// (or, while applying, to one borrower) are serialized through keyed locks,
/// and every state change is handed to the store as a single atomic commit.
pub struct LoanEngine {
    borrowers: SharedBorrowerStore,
    loans: SharedLoanStore,
    transactions: SharedTransactionStore,
    jobs: Arc<dyn JobQueue>,
    ledger: LoanLedger,
    borrower_locks: KeyedLocks<BorrowerId>,
    loan_locks: KeyedLocks<LoanId>,
}

impl LoanEngine {
    /// Creates a new `LoanEngine` instance.
    ///
    /// # Arguments
    ///
    /// * `borrowers` - The store for borrower records.
    /// * `loans` - The store for loans and their progress.
    /// * `transactions` - The append-only ledger.
    /// * `jobs` - Where credit-score recomputations are enqueued.
    /// * `config` - Business thresholds and lock timeout.
    pub fn new(
        borrowers: SharedBorrowerStore,
        loans: SharedLoanStore,
        transactions: SharedTransactionStore,
        jobs: Arc<dyn JobQueue>,
        config: &LoanConfig,
    ) -> Self {
        Self {
            borrowers,
            loans,
            transactions,
            jobs,
            ledger: LoanLedger::new(config),
            borrower_locks: KeyedLocks::new("borrower", config.lock_timeout()),
            loan_locks: KeyedLocks::new("loan", config.lock_timeout()),
        }
    }

    #[instrument(skip_all, fields(external_id = %registration.external_id))]
    pub async fn register_borrower(&self, registration: NewBorrower) -> Result<Borrower> {
        registration.validate()?;
        let borrower = self.borrowers.create(registration).await?;
        info!(borrower = borrower.id, "borrower registered");
        Ok(borrower)
    }

    /// Opens a loan if the borrower has none active and passes every gate.
    #[instrument(skip_all, fields(borrower = application.borrower_id))]
    pub async fn apply_for_loan(&self, application: LoanApplication) -> Result<LoanApproval> {
        let _guard = self.borrower_locks.acquire(application.borrower_id).await?;

        let borrower = self.borrower(application.borrower_id).await?;
        let open_loan = self.active_loan(borrower.id).await?;

        let new_loan = self
            .ledger
            .approve(&borrower, open_loan.as_ref(), &application)
            .inspect_err(|e| warn!(error = %e, "loan application rejected"))?;
        let (loan, progress) = self.loans.open(new_loan).await?;

        info!(
            loan = loan.id,
            principal = loan.principal,
            installments = progress.installments_remaining,
            "loan opened"
        );
        Ok(LoanApproval {
            loan_id: loan.id,
            monthly_emi: progress.next_due_amount,
            due_dates: loan.schedule.into_inner(),
        })
    }

    /// Applies one repayment to an active loan.
    #[instrument(skip_all, fields(loan = loan_id, amount = %amount.value()))]
    pub async fn apply_payment(&self, loan_id: LoanId, amount: Amount, now: DateTime<Utc>) -> Result<PaymentReceipt> {
        let _guard = self.loan_locks.acquire(loan_id).await?;

        let (loan, progress) = self.loan_with_progress(loan_id).await?;
        let applied = self
            .ledger
            .apply_payment(&loan, &progress, amount, now)
            .inspect_err(|e| warn!(error = %e, "payment rejected"))?;

        let borrower_id = applied.loan.borrower_id;
        let receipt_progress = applied.progress.clone();
        let remaining_balance = applied.loan.remaining_balance.value();
        let transaction = self
            .loans
            .commit_payment(applied.loan, applied.progress, applied.transaction)
            .await?;

        self.enqueue_score(borrower_id);
        if receipt_progress.state() == LoanState::Closed {
            info!("loan closed");
        } else {
            info!(
                installments_remaining = receipt_progress.installments_remaining,
                "payment applied"
            );
        }

        Ok(PaymentReceipt {
            loan_id,
            transaction_id: transaction.id,
            remaining_balance,
            next_due_date: receipt_progress.next_due_date,
            next_due_amount: receipt_progress.next_due_amount,
            installments_remaining: receipt_progress.installments_remaining,
            active: receipt_progress.active,
        })
    }

    /// Past repayments plus the projected remaining installments.
    #[instrument(skip(self))]
    pub async fn statement(&self, loan_id: LoanId) -> Result<Statement> {
        let _guard = self.loan_locks.acquire(loan_id).await?;

        let (loan, progress) = self.loan_with_progress(loan_id).await?;
        let history = self.transactions.by_loan(loan_id, None).await?;
        build_statement(&loan, &progress, &history)
    }

    /// Records account activity outside any loan and schedules a rescore.
    #[instrument(skip_all, fields(borrower = transaction.borrower_id, direction = ?transaction.direction))]
    pub async fn record_transaction(&self, transaction: NewTransaction) -> Result<Transaction> {
        if transaction.loan_id.is_some() {
            return Err(LoanError::ValidationError(
                "loan repayments must go through apply_payment".to_string(),
            ));
        }
        self.borrower(transaction.borrower_id).await?;
        let transaction = self.transactions.append(transaction).await?;
        self.enqueue_score(transaction.borrower_id);
        Ok(transaction)
    }

    /// Where the borrower stands: no loan, an active one, or only closed ones.
    pub async fn loan_state(&self, borrower_id: BorrowerId) -> Result<LoanState> {
        self.borrower(borrower_id).await?;
        let mut state = LoanState::NoLoan;
        for loan in self.loans.find_by_borrower(borrower_id).await? {
            match self.loans.progress(loan.id).await?.map(|p| p.state()) {
                Some(LoanState::Active) => return Ok(LoanState::Active),
                Some(LoanState::Closed) => state = LoanState::Closed,
                _ => {}
            }
        }
        Ok(state)
    }

    pub async fn borrower(&self, id: BorrowerId) -> Result<Borrower> {
        self.borrowers
            .get(id)
            .await?
            .ok_or_else(|| LoanError::not_found("Borrower", id))
    }

    async fn loan_with_progress(&self, loan_id: LoanId) -> Result<(Loan, LoanProgress)> {
        let loan = self
            .loans
            .get(loan_id)
            .await?
            .ok_or_else(|| LoanError::not_found("Loan", loan_id))?;
        let progress = self
            .loans
            .progress(loan_id)
            .await?
            .ok_or_else(|| LoanError::not_found("Loan progress", loan_id))?;
        Ok((loan, progress))
    }

    async fn active_loan(&self, borrower_id: BorrowerId) -> Result<Option<Loan>> {
        for loan in self.loans.find_by_borrower(borrower_id).await? {
            if self
                .loans
                .progress(loan.id)
                .await?
                .is_some_and(|p| p.active)
            {
                return Ok(Some(loan));
            }
        }
        Ok(None)
    }

    fn enqueue_score(&self, borrower_id: BorrowerId) {
        if let Err(e) = self.jobs.enqueue(borrower_id) {
            // The ledger write already committed; the next write rescores.
            warn!(borrower = borrower_id, error = %e, "credit score job not enqueued");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::jobs::JobError;
    use crate::domain::borrower::CreditScore;
    use crate::domain::loan::LoanCategory;
    use crate::domain::ports::{BorrowerStore, LoanStore, TransactionStore};
    use crate::domain::transaction::Direction;
    use crate::infrastructure::in_memory::InMemoryStore;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingQueue {
        enqueued: Mutex<Vec<BorrowerId>>,
    }

    impl JobQueue for RecordingQueue {
        fn enqueue(&self, borrower_id: BorrowerId) -> std::result::Result<(), JobError> {
            self.enqueued.lock().unwrap().push(borrower_id);
            Ok(())
        }
    }

    struct Fixture {
        engine: LoanEngine,
        store: InMemoryStore,
        queue: Arc<RecordingQueue>,
    }

    fn fixture() -> Fixture {
        let store = InMemoryStore::new();
        let queue = Arc::new(RecordingQueue::default());
        let engine = LoanEngine::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            queue.clone(),
            &LoanConfig::default(),
        );
        Fixture { engine, store, queue }
    }

    async fn scored_borrower(fx: &Fixture, score: u16) -> Borrower {
        let borrower = fx
            .engine
            .register_borrower(NewBorrower {
                name: "Tara".to_string(),
                email: "tara@example.com".to_string(),
                external_id: format!("t-{}", score),
                annual_income: dec!(600000),
            })
            .await
            .unwrap();
        fx.store
            .set_credit_score(borrower.id, CreditScore::new(score).unwrap())
            .await
            .unwrap();
        borrower
    }

    fn application(borrower_id: BorrowerId) -> LoanApplication {
        LoanApplication {
            borrower_id,
            category: LoanCategory::Personal,
            principal: 120000,
            annual_rate: dec!(15),
            term_months: 12,
            disbursal_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        }
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_apply_for_loan_returns_schedule() {
        let fx = fixture();
        let borrower = scored_borrower(&fx, 700).await;

        let approval = fx.engine.apply_for_loan(application(borrower.id)).await.unwrap();
        assert_eq!(approval.loan_id, 1);
        assert_eq!(approval.monthly_emi, dec!(10831.00));
        assert_eq!(approval.due_dates.len(), 12);
        assert_eq!(fx.engine.loan_state(borrower.id).await.unwrap(), LoanState::Active);
    }

    #[tokio::test]
    async fn test_unknown_borrower_is_not_found() {
        let fx = fixture();
        let result = fx.engine.apply_for_loan(application(42)).await;
        assert!(matches!(result, Err(LoanError::NotFound { id: 42, .. })));
    }

    #[tokio::test]
    async fn test_duplicate_loan_leaves_state_untouched() {
        let fx = fixture();
        let borrower = scored_borrower(&fx, 700).await;
        fx.engine.apply_for_loan(application(borrower.id)).await.unwrap();

        let second = fx.engine.apply_for_loan(application(borrower.id)).await;
        assert!(matches!(second, Err(LoanError::DuplicateLoan { .. })));
        assert_eq!(fx.store.find_by_borrower(borrower.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_payment_commits_and_enqueues_rescore() {
        let fx = fixture();
        let borrower = scored_borrower(&fx, 700).await;
        let approval = fx.engine.apply_for_loan(application(borrower.id)).await.unwrap();

        let receipt = fx
            .engine
            .apply_payment(approval.loan_id, Amount::new(dec!(10831.00)).unwrap(), at(2024, 2, 1))
            .await
            .unwrap();
        assert_eq!(receipt.installments_remaining, 11);
        assert_eq!(receipt.remaining_balance, dec!(119141.00));
        assert!(receipt.active);

        let ledger = fx.store.by_loan(approval.loan_id, Some(Direction::Credit)).await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(*fx.queue.enqueued.lock().unwrap(), vec![borrower.id]);
    }

    #[tokio::test]
    async fn test_rejected_payment_changes_nothing() {
        let fx = fixture();
        let borrower = scored_borrower(&fx, 700).await;
        let approval = fx.engine.apply_for_loan(application(borrower.id)).await.unwrap();
        let emi = Amount::new(dec!(10831.00)).unwrap();
        fx.engine.apply_payment(approval.loan_id, emi, at(2024, 2, 1)).await.unwrap();
        let before = fx.store.progress(approval.loan_id).await.unwrap();

        let second = fx.engine.apply_payment(approval.loan_id, emi, at(2024, 2, 20)).await;
        assert!(matches!(second, Err(LoanError::AlreadyPaid { .. })));
        assert_eq!(fx.store.progress(approval.loan_id).await.unwrap(), before);
        assert_eq!(fx.store.by_loan(approval.loan_id, None).await.unwrap().len(), 1);
        assert_eq!(fx.queue.enqueued.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_statement_lists_payments_and_projection() {
        let fx = fixture();
        let borrower = scored_borrower(&fx, 700).await;
        let approval = fx.engine.apply_for_loan(application(borrower.id)).await.unwrap();
        fx.engine
            .apply_payment(approval.loan_id, Amount::new(dec!(10831.00)).unwrap(), at(2024, 2, 1))
            .await
            .unwrap();

        let statement = fx.engine.statement(approval.loan_id).await.unwrap();
        assert_eq!(statement.past_transactions.len(), 1);
        assert_eq!(statement.past_transactions[0].principal, dec!(119141.00));
        assert_eq!(statement.upcoming_installments.len(), 11);
        assert_eq!(statement.upcoming_installments[0].amount_due, dec!(10831.00));
    }

    #[tokio::test]
    async fn test_record_transaction_requires_borrower() {
        let fx = fixture();
        let tx = NewTransaction {
            borrower_id: 3,
            loan_id: None,
            direction: Direction::Credit,
            amount: Amount::new(dec!(5000)).unwrap(),
            at: at(2024, 1, 1),
        };
        assert!(matches!(
            fx.engine.record_transaction(tx).await,
            Err(LoanError::NotFound { .. })
        ));
        assert!(fx.queue.enqueued.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_loan_is_not_found() {
        let fx = fixture();
        assert!(matches!(
            fx.engine.statement(8).await,
            Err(LoanError::NotFound { id: 8, .. })
        ));
        assert!(matches!(
            fx.engine
                .apply_payment(8, Amount::new(dec!(1)).unwrap(), at(2024, 2, 1))
                .await,
            Err(LoanError::NotFound { .. })
        ));
    }
}
