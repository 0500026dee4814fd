#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use loanbook::application::engine::LoanEngine;
use loanbook::application::jobs::{CreditScoreJob, JobQueueHandle, JobWorker};
use loanbook::config::LoanConfig;
use loanbook::domain::borrower::{Borrower, NewBorrower};
use loanbook::domain::money::Amount;
use loanbook::domain::transaction::{Direction, NewTransaction};
use loanbook::infrastructure::in_memory::InMemoryStore;
use rust_decimal::Decimal;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// An engine over an in-memory store with a live credit-score worker.
pub struct Harness {
    pub engine: Arc<LoanEngine>,
    pub store: InMemoryStore,
    pub queue: JobQueueHandle,
    worker: JobWorker,
}

impl Harness {
    /// Must be called from inside a tokio runtime.
    pub fn new(config: LoanConfig) -> Self {
        let store = InMemoryStore::new();
        let job = CreditScoreJob::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            config.score_bands.clone(),
        );
        let worker = JobWorker::spawn(Arc::new(job), config.jobs.clone());
        let queue = worker.queue();
        let engine = LoanEngine::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(queue.clone()),
            &config,
        );
        Self {
            engine: Arc::new(engine),
            store,
            queue,
            worker,
        }
    }

    pub async fn register(&self, external_id: &str, annual_income: Decimal) -> Borrower {
        self.engine
            .register_borrower(NewBorrower {
                name: format!("Borrower {external_id}"),
                email: format!("{external_id}@example.com"),
                external_id: external_id.to_string(),
                annual_income,
            })
            .await
            .unwrap()
    }

    /// Records account activity and waits until the borrower is rescored.
    pub async fn deposit(&self, borrower: &Borrower, direction: Direction, amount: Decimal) {
        self.engine
            .record_transaction(NewTransaction {
                borrower_id: borrower.id,
                loan_id: None,
                direction,
                amount: Amount::new(amount).unwrap(),
                at: at(2024, 1, 2),
            })
            .await
            .unwrap();
        self.queue.flush().await.unwrap();
    }

    pub async fn shutdown(self) {
        drop(self.engine);
        drop(self.queue);
        self.worker.shutdown().await.unwrap();
    }
}

pub fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap()
}

pub fn write_lines(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    file.flush().unwrap();
    file
}
