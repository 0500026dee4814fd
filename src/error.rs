use crate::domain::{BorrowerId, LoanId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

/// Every way a loan operation can fail.
///
/// All variants except the infrastructure ones (`IoError`, `CsvError`,
/// `JsonError`, `StorageError`, `InternalError`) are business rejections:
/// they are reported back to the caller and leave ledger state untouched.
#[derive(Error, Debug)]
pub enum LoanError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("{entity} {id} does not exist")]
    NotFound { entity: &'static str, id: u64 },
    #[error("Borrower {borrower} is not eligible for a loan: {reason}")]
    Ineligible { borrower: BorrowerId, reason: String },
    #[error("Interest rate {rate}% must be greater than {floor}%")]
    RateTooLow { rate: Decimal, floor: Decimal },
    #[error("Borrower {borrower} already has an open loan ({loan})")]
    DuplicateLoan { borrower: BorrowerId, loan: LoanId },
    #[error("EMI {emi} exceeds the affordable limit of {limit}")]
    Affordability { emi: Decimal, limit: Decimal },
    #[error("Payment for loan {loan} already made for {period}")]
    AlreadyPaid { loan: LoanId, period: String },
    #[error("Payment window for loan {loan} elapsed: last payment was {last_payment}")]
    PaymentWindowElapsed {
        loan: LoanId,
        last_payment: DateTime<Utc>,
    },
    #[error("Payment {amount} exceeds the remaining balance {remaining}")]
    Overpayment { amount: Decimal, remaining: Decimal },
    #[error("Loan {0} is not in active state")]
    InactiveLoan(LoanId),
    #[error("Contention on {0}, retry later")]
    Contention(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("Storage error: {0}")]
    StorageError(#[from] rocksdb::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl LoanError {
    pub fn not_found(entity: &'static str, id: u64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(message.into().into())
    }

    /// Only lock contention is worth retrying unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Contention(_))
    }

    /// Short machine-readable tag, used by the JSON response writer.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ValidationError(_) => "validation",
            Self::NotFound { .. } => "not_found",
            Self::Ineligible { .. } => "ineligible",
            Self::RateTooLow { .. } => "rate_too_low",
            Self::DuplicateLoan { .. } => "duplicate_loan",
            Self::Affordability { .. } => "affordability",
            Self::AlreadyPaid { .. } => "already_paid",
            Self::PaymentWindowElapsed { .. } => "payment_window_elapsed",
            Self::Overpayment { .. } => "overpayment",
            Self::InactiveLoan(_) => "inactive_loan",
            Self::Contention(_) => "contention",
            Self::IoError(_)
            | Self::CsvError(_)
            | Self::JsonError(_)
            | Self::InternalError(_) => "internal",
            #[cfg(feature = "storage-rocksdb")]
            Self::StorageError(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, LoanError>;
