use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use loanbook::application::engine::LoanEngine;
use loanbook::application::jobs::{CreditScoreJob, JobQueueHandle, JobWorker};
use loanbook::config::LoanConfig;
use loanbook::domain::amortization::{build_schedule, quote_emi};
use loanbook::domain::ports::{
    BorrowerStore, LoanStore, SharedBorrowerStore, SharedLoanStore, SharedTransactionStore,
    TransactionStore,
};
use loanbook::error::LoanError;
use loanbook::infrastructure::in_memory::InMemoryStore;
use loanbook::interfaces::csv::schedule_writer::ScheduleWriter;
use loanbook::interfaces::csv::score_writer::ScoreWriter;
use loanbook::interfaces::csv::transaction_reader::TransactionReader;
use loanbook::interfaces::json::handle;
use loanbook::interfaces::json::request::RequestReader;
use loanbook::interfaces::json::response::ResponseWriter;
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufReader, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON config file. Missing fields keep their defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Log at DEBUG instead of INFO.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run JSON-lines requests and print one JSON response per line.
    Process { input: PathBuf },
    /// Append `borrower_id,direction,amount,at` rows and print the rescored borrowers.
    ImportLedger { input: PathBuf },
    /// Print the EMI schedule for a principal, annual rate and term.
    Quote {
        #[arg(long)]
        principal: Decimal,
        #[arg(long)]
        rate: Decimal,
        #[arg(long)]
        term: u32,
        /// Defaults to today.
        #[arg(long)]
        disbursal: Option<NaiveDate>,
    },
}

struct Stores {
    borrowers: SharedBorrowerStore,
    loans: SharedLoanStore,
    transactions: SharedTransactionStore,
}

impl Stores {
    fn shared<S>(store: S) -> Self
    where
        S: BorrowerStore + LoanStore + TransactionStore + Clone + 'static,
    {
        Self {
            borrowers: Arc::new(store.clone()),
            loans: Arc::new(store.clone()),
            transactions: Arc::new(store),
        }
    }
}

#[cfg(feature = "storage-rocksdb")]
fn open_stores(db_path: Option<PathBuf>) -> Result<Stores> {
    use loanbook::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(path) => {
            info!(path = %path.display(), "using RocksDB storage");
            Ok(Stores::shared(RocksDBStore::open(path).into_diagnostic()?))
        }
        None => Ok(Stores::shared(InMemoryStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_stores(db_path: Option<PathBuf>) -> Result<Stores> {
    if db_path.is_some() {
        warn!(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(Stores::shared(InMemoryStore::new()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .finish();
    tracing::subscriber::set_global_default(subscriber).into_diagnostic()?;

    let config = match &cli.config {
        Some(path) => LoanConfig::from_path(path).into_diagnostic()?,
        None => LoanConfig::default(),
    };

    match cli.command {
        Command::Quote {
            principal,
            rate,
            term,
            disbursal,
        } => {
            let quote = quote_emi(principal, rate, term).into_diagnostic()?;
            let disbursal = disbursal.unwrap_or_else(|| Utc::now().date_naive());
            let schedule = build_schedule(term, disbursal, quote.monthly_emi, quote.total_recoverable);
            ScheduleWriter::new(io::stdout().lock())
                .write_schedule(&quote, &schedule)
                .into_diagnostic()?;
            Ok(())
        }
        Command::Process { input } => {
            let stores = open_stores(cli.db_path)?;
            run_with_engine(stores, &config, |engine, worker| process(engine, worker, input)).await
        }
        Command::ImportLedger { input } => {
            let stores = open_stores(cli.db_path)?;
            run_with_engine(stores, &config, |engine, worker| import_ledger(engine, worker, input)).await
        }
    }
}

/// Wires the engine to a credit-score worker, runs `command`, then drains
/// the worker before returning.
async fn run_with_engine<F, Fut>(stores: Stores, config: &LoanConfig, command: F) -> Result<()>
where
    F: FnOnce(LoanEngine, JobQueueHandle) -> Fut,
    Fut: std::future::Future<Output = Result<()>>,
{
    let job = CreditScoreJob::new(
        stores.borrowers.clone(),
        stores.transactions.clone(),
        config.score_bands.clone(),
    );
    let worker = JobWorker::spawn(Arc::new(job), config.jobs.clone());
    let queue = worker.queue();
    let engine = LoanEngine::new(
        stores.borrowers,
        stores.loans,
        stores.transactions,
        Arc::new(queue.clone()),
        config,
    );

    let outcome = command(engine, queue).await;
    worker.shutdown().await.into_diagnostic()?;
    outcome
}

async fn process(engine: LoanEngine, queue: JobQueueHandle, input: PathBuf) -> Result<()> {
    let file = File::open(input).into_diagnostic()?;
    let mut writer = ResponseWriter::new(io::stdout().lock());

    for (line, request) in RequestReader::new(BufReader::new(file)).requests() {
        match request {
            Ok(request) => match handle(&engine, request, Utc::now()).await {
                Ok(value) => writer.write_ok(&value).into_diagnostic()?,
                Err(e) => writer.write_error(&e).into_diagnostic()?,
            },
            Err(LoanError::IoError(e)) => return Err(e).into_diagnostic(),
            Err(e) => error!(line, error = %e, "skipping malformed request"),
        }
        // Keeps scores current for the next request.
        queue.flush().await.into_diagnostic()?;
    }
    Ok(())
}

async fn import_ledger(engine: LoanEngine, queue: JobQueueHandle, input: PathBuf) -> Result<()> {
    let file = File::open(input).into_diagnostic()?;
    let mut touched = BTreeSet::new();
    let mut imported = 0usize;

    for (row, transaction) in TransactionReader::new(file).transactions().enumerate() {
        let result = match transaction {
            Ok(transaction) => engine.record_transaction(transaction).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(transaction) => {
                touched.insert(transaction.borrower_id);
                imported += 1;
            }
            Err(e) => warn!(row = row + 1, error = %e, "ledger row skipped"),
        }
    }
    queue.flush().await.into_diagnostic()?;
    info!(imported, borrowers = touched.len(), "ledger imported");

    let mut borrowers = Vec::with_capacity(touched.len());
    for id in touched {
        borrowers.push(engine.borrower(id).await.into_diagnostic()?);
    }
    ScoreWriter::new(io::stdout().lock())
        .write_scores(&borrowers)
        .into_diagnostic()?;
    Ok(())
}
