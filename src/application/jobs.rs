//! Background credit-score recomputation.
//!
//! Ledger writes enqueue the borrower id. A single tokio task drains the
//! queue and runs [`CreditScoreJob`] for each id, retrying failures that are
//! worth retrying.

use crate::config::JobConfig;
use crate::domain::BorrowerId;
use crate::domain::credit_score::{ScoreBands, ledger_balance};
use crate::domain::ports::{
    BorrowerStore, SharedBorrowerStore, SharedTransactionStore, TransactionStore,
};
use crate::domain::transaction::Direction;
use crate::error::LoanError;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum JobError {
    #[error("borrower {0} does not exist")]
    BorrowerNotFound(BorrowerId),
    #[error("error while calculating credit score: {0}")]
    Aggregation(#[source] LoanError),
    #[error("job queue is closed")]
    QueueClosed,
}

impl JobError {
    /// A missing borrower will not appear by retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Aggregation(_))
    }
}

#[async_trait]
pub trait Job: Send + Sync {
    async fn run(&self, borrower_id: BorrowerId) -> Result<(), JobError>;
}

pub trait JobQueue: Send + Sync {
    fn enqueue(&self, borrower_id: BorrowerId) -> Result<(), JobError>;
}

/// Recomputes a borrower's score from their full ledger and stores it.
pub struct CreditScoreJob {
    borrowers: SharedBorrowerStore,
    transactions: SharedTransactionStore,
    bands: ScoreBands,
}

impl CreditScoreJob {
    pub fn new(
        borrowers: SharedBorrowerStore,
        transactions: SharedTransactionStore,
        bands: ScoreBands,
    ) -> Self {
        Self {
            borrowers,
            transactions,
            bands,
        }
    }
}

#[async_trait]
impl Job for CreditScoreJob {
    async fn run(&self, borrower_id: BorrowerId) -> Result<(), JobError> {
        self.borrowers
            .get(borrower_id)
            .await
            .map_err(JobError::Aggregation)?
            .ok_or(JobError::BorrowerNotFound(borrower_id))?;

        let credits = self
            .transactions
            .by_borrower(borrower_id, Some(Direction::Credit))
            .await
            .map_err(JobError::Aggregation)?;
        let debits = self
            .transactions
            .by_borrower(borrower_id, Some(Direction::Debit))
            .await
            .map_err(JobError::Aggregation)?;

        let balance = ledger_balance(credits.iter().chain(debits.iter()));
        let score = self.bands.score(balance);

        match self.borrowers.set_credit_score(borrower_id, score).await {
            Ok(()) => {}
            Err(LoanError::NotFound { .. }) => return Err(JobError::BorrowerNotFound(borrower_id)),
            Err(e) => return Err(JobError::Aggregation(e)),
        }
        info!(borrower = borrower_id, balance = %balance.value(), %score, "credit score updated");
        Ok(())
    }
}

enum Message {
    Score(BorrowerId),
    Flush(oneshot::Sender<()>),
}

/// Cheap, cloneable sender side of the worker queue.
#[derive(Clone)]
pub struct JobQueueHandle {
    sender: mpsc::UnboundedSender<Message>,
}

impl JobQueue for JobQueueHandle {
    fn enqueue(&self, borrower_id: BorrowerId) -> Result<(), JobError> {
        self.sender
            .send(Message::Score(borrower_id))
            .map_err(|_| JobError::QueueClosed)
    }
}

impl JobQueueHandle {
    /// Resolves once every job enqueued before this call has finished.
    pub async fn flush(&self) -> Result<(), JobError> {
        let (done, wait) = oneshot::channel();
        self.sender
            .send(Message::Flush(done))
            .map_err(|_| JobError::QueueClosed)?;
        wait.await.map_err(|_| JobError::QueueClosed)
    }
}

/// A tokio task running jobs one at a time in enqueue order.
pub struct JobWorker {
    queue: JobQueueHandle,
    handle: JoinHandle<()>,
}

impl JobWorker {
    pub fn spawn(job: Arc<dyn Job>, config: JobConfig) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_worker(job, config, receiver));
        Self {
            queue: JobQueueHandle { sender },
            handle,
        }
    }

    pub fn queue(&self) -> JobQueueHandle {
        self.queue.clone()
    }

    /// Stops accepting work once every queue handle is dropped, then waits
    /// for the jobs already queued.
    pub async fn shutdown(self) -> Result<(), JobError> {
        drop(self.queue);
        self.handle.await.map_err(|e| {
            error!(error = %e, "job worker crashed");
            JobError::QueueClosed
        })
    }
}

async fn run_worker(job: Arc<dyn Job>, config: JobConfig, mut receiver: mpsc::UnboundedReceiver<Message>) {
    while let Some(message) = receiver.recv().await {
        match message {
            Message::Score(borrower_id) => run_with_retry(job.as_ref(), &config, borrower_id).await,
            Message::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("job queue drained");
}

async fn run_with_retry(job: &dyn Job, config: &JobConfig, borrower_id: BorrowerId) {
    let attempts = config.max_attempts.max(1);
    for attempt in 1..=attempts {
        match job.run(borrower_id).await {
            Ok(()) => return,
            Err(e) if e.is_retryable() && attempt < attempts => {
                warn!(borrower = borrower_id, attempt, error = %e, "credit score job failed, retrying");
                tokio::time::sleep(config.backoff(attempt)).await;
            }
            Err(e) => {
                error!(borrower = borrower_id, attempt, error = %e, "credit score job failed");
                return;
            }
        }
    }
}
