use crate::domain::borrower::{Borrower, CreditScore, NewBorrower};
use crate::domain::loan::{Loan, LoanProgress, NewLoan};
use crate::domain::ports::{BorrowerStore, LoanStore, TransactionStore};
use crate::domain::transaction::{Direction, NewTransaction, Transaction};
use crate::domain::{BorrowerId, LoanId};
use crate::error::{LoanError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for borrower records.
pub const CF_BORROWERS: &str = "borrowers";
/// Column Family mapping external ids to borrower ids.
pub const CF_EXTERNAL_IDS: &str = "external_ids";
/// Column Family for loans, including their schedules.
pub const CF_LOANS: &str = "loans";
/// Column Family for loan progress trackers, keyed by loan id.
pub const CF_PROGRESS: &str = "progress";
/// Column Family for the append-only transaction ledger.
pub const CF_TRANSACTIONS: &str = "transactions";
/// Column Family for id sequences.
pub const CF_META: &str = "meta";

const ALL_CFS: [&str; 6] = [
    CF_BORROWERS,
    CF_EXTERNAL_IDS,
    CF_LOANS,
    CF_PROGRESS,
    CF_TRANSACTIONS,
    CF_META,
];

const SEQ_BORROWER: &[u8] = b"seq:borrower";
const SEQ_LOAN: &[u8] = b"seq:loan";
const SEQ_TRANSACTION: &[u8] = b"seq:transaction";

/// A persistent store implementation using RocksDB.
///
/// Each table lives in its own Column Family and values are JSON encoded.
/// Writes that span tables go through a single `WriteBatch`, and all writers
/// are serialized by an async mutex so id sequences never hand out a
/// duplicate.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    writer: Arc<Mutex<()>>,
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that every required column family exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect::<Vec<_>>();
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            writer: Arc::new(Mutex::new(())),
        })
    }

    fn handle(&self, name: &'static str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| LoanError::internal(format!("{} column family not found", name)))
    }

    fn read<T: DeserializeOwned>(&self, cf: &'static str, key: &[u8]) -> Result<Option<T>> {
        let handle = self.handle(cf)?;
        match self.db.get_cf(handle, key)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf: &'static str) -> Result<Vec<T>> {
        let handle = self.handle(cf)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(handle, IteratorMode::Start) {
            let (_key, value) = item?;
            values.push(decode(&value)?);
        }
        Ok(values)
    }

    /// Reserves the next id of a sequence inside `batch`.
    fn next_id(&self, batch: &mut WriteBatch, sequence: &[u8]) -> Result<u64> {
        let meta = self.handle(CF_META)?;
        let current = match self.db.get_cf(meta, sequence)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| LoanError::internal("corrupt id sequence"))?;
                u64::from_be_bytes(raw)
            }
            None => 0,
        };
        let next = current + 1;
        batch.put_cf(meta, sequence, next.to_be_bytes());
        Ok(next)
    }
}

#[async_trait]
impl BorrowerStore for RocksDBStore {
    async fn create(&self, borrower: NewBorrower) -> Result<Borrower> {
        let _guard = self.writer.lock().await;
        let external_ids = self.handle(CF_EXTERNAL_IDS)?;
        if self
            .db
            .get_pinned_cf(external_ids, borrower.external_id.as_bytes())?
            .is_some()
        {
            return Err(LoanError::ValidationError(format!(
                "externalId '{}' is already registered",
                borrower.external_id
            )));
        }

        let mut batch = WriteBatch::default();
        let id = self.next_id(&mut batch, SEQ_BORROWER)?;
        let borrower = borrower.into_borrower(id);
        batch.put_cf(external_ids, borrower.external_id.as_bytes(), id.to_be_bytes());
        batch.put_cf(self.handle(CF_BORROWERS)?, id.to_be_bytes(), encode(&borrower)?);
        self.db.write(batch)?;
        Ok(borrower)
    }

    async fn get(&self, id: BorrowerId) -> Result<Option<Borrower>> {
        self.read(CF_BORROWERS, &id.to_be_bytes())
    }

    async fn set_credit_score(&self, id: BorrowerId, score: CreditScore) -> Result<()> {
        let _guard = self.writer.lock().await;
        let mut borrower: Borrower = self
            .read(CF_BORROWERS, &id.to_be_bytes())?
            .ok_or_else(|| LoanError::not_found("Borrower", id))?;
        borrower.credit_score = Some(score);
        self.db
            .put_cf(self.handle(CF_BORROWERS)?, id.to_be_bytes(), encode(&borrower)?)?;
        Ok(())
    }

    async fn remove(&self, id: BorrowerId) -> Result<bool> {
        let _guard = self.writer.lock().await;
        let Some(borrower) = self.read::<Borrower>(CF_BORROWERS, &id.to_be_bytes())? else {
            return Ok(false);
        };
        let mut batch = WriteBatch::default();
        batch.delete_cf(self.handle(CF_BORROWERS)?, id.to_be_bytes());
        batch.delete_cf(self.handle(CF_EXTERNAL_IDS)?, borrower.external_id.as_bytes());
        for loan in self.scan::<Loan>(CF_LOANS)?.into_iter().filter(|l| l.borrower_id == id) {
            batch.delete_cf(self.handle(CF_LOANS)?, loan.id.to_be_bytes());
            batch.delete_cf(self.handle(CF_PROGRESS)?, loan.id.to_be_bytes());
        }
        self.db.write(batch)?;
        Ok(true)
    }
}

#[async_trait]
impl LoanStore for RocksDBStore {
    async fn open(&self, loan: NewLoan) -> Result<(Loan, LoanProgress)> {
        let _guard = self.writer.lock().await;
        if self
            .db
            .get_pinned_cf(self.handle(CF_BORROWERS)?, loan.borrower_id.to_be_bytes())?
            .is_none()
        {
            return Err(LoanError::not_found("Borrower", loan.borrower_id));
        }
        let mut batch = WriteBatch::default();
        let id = self.next_id(&mut batch, SEQ_LOAN)?;
        let (loan, progress) = loan.open(id);
        batch.put_cf(self.handle(CF_LOANS)?, id.to_be_bytes(), encode(&loan)?);
        batch.put_cf(self.handle(CF_PROGRESS)?, id.to_be_bytes(), encode(&progress)?);
        self.db.write(batch)?;
        Ok((loan, progress))
    }

    async fn get(&self, id: LoanId) -> Result<Option<Loan>> {
        self.read(CF_LOANS, &id.to_be_bytes())
    }

    async fn find_by_borrower(&self, borrower_id: BorrowerId) -> Result<Vec<Loan>> {
        Ok(self
            .scan::<Loan>(CF_LOANS)?
            .into_iter()
            .filter(|loan| loan.borrower_id == borrower_id)
            .collect())
    }

    async fn progress(&self, loan_id: LoanId) -> Result<Option<LoanProgress>> {
        self.read(CF_PROGRESS, &loan_id.to_be_bytes())
    }

    async fn commit_payment(
        &self,
        loan: Loan,
        progress: LoanProgress,
        transaction: NewTransaction,
    ) -> Result<Transaction> {
        let _guard = self.writer.lock().await;
        if self
            .db
            .get_pinned_cf(self.handle(CF_LOANS)?, loan.id.to_be_bytes())?
            .is_none()
        {
            return Err(LoanError::not_found("Loan", loan.id));
        }
        if progress.loan_id != loan.id || transaction.loan_id != Some(loan.id) {
            return Err(LoanError::internal(format!(
                "payment commit for loan {} carries mismatched references",
                loan.id
            )));
        }

        let mut batch = WriteBatch::default();
        let id = self.next_id(&mut batch, SEQ_TRANSACTION)?;
        let transaction = transaction.into_transaction(id);
        batch.put_cf(self.handle(CF_TRANSACTIONS)?, id.to_be_bytes(), encode(&transaction)?);
        batch.put_cf(self.handle(CF_LOANS)?, loan.id.to_be_bytes(), encode(&loan)?);
        batch.put_cf(self.handle(CF_PROGRESS)?, loan.id.to_be_bytes(), encode(&progress)?);
        self.db.write(batch)?;
        Ok(transaction)
    }
}

#[async_trait]
impl TransactionStore for RocksDBStore {
    async fn append(&self, transaction: NewTransaction) -> Result<Transaction> {
        let _guard = self.writer.lock().await;
        let mut batch = WriteBatch::default();
        let id = self.next_id(&mut batch, SEQ_TRANSACTION)?;
        let transaction = transaction.into_transaction(id);
        batch.put_cf(self.handle(CF_TRANSACTIONS)?, id.to_be_bytes(), encode(&transaction)?);
        self.db.write(batch)?;
        Ok(transaction)
    }

    async fn by_borrower(
        &self,
        borrower_id: BorrowerId,
        direction: Option<Direction>,
    ) -> Result<Vec<Transaction>> {
        Ok(self
            .scan::<Transaction>(CF_TRANSACTIONS)?
            .into_iter()
            .filter(|tx| tx.borrower_id == borrower_id && tx.matches(direction))
            .collect())
    }

    async fn by_loan(&self, loan_id: LoanId, direction: Option<Direction>) -> Result<Vec<Transaction>> {
        Ok(self
            .scan::<Transaction>(CF_TRANSACTIONS)?
            .into_iter()
            .filter(|tx| tx.loan_id == Some(loan_id) && tx.matches(direction))
            .collect())
    }
}
