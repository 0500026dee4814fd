use super::money::Balance;
use super::schedule::InstallmentSchedule;
use super::{BorrowerId, LoanId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LoanCategory {
    Car,
    Home,
    Education,
    Personal,
}

impl fmt::Display for LoanCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Car => "car",
            Self::Home => "home",
            Self::Education => "education",
            Self::Personal => "personal",
        };
        f.write_str(name)
    }
}

/// Lifecycle of a borrower's loan.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum LoanState {
    NoLoan,
    Active,
    Closed,
}

/// An approved loan that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLoan {
    pub borrower_id: BorrowerId,
    pub category: LoanCategory,
    pub principal: u64,
    pub annual_rate: Decimal,
    pub term_months: u32,
    pub disbursal_date: NaiveDate,
    pub schedule: InstallmentSchedule,
}

impl NewLoan {
    /// Materializes the loan and its progress tracker under `id`.
    ///
    /// The remaining balance starts at the schedule total and the tracker
    /// points at the first installment.
    pub fn open(self, id: LoanId) -> (Loan, LoanProgress) {
        let (next_due_date, next_due_amount) = self
            .schedule
            .first()
            .map(|i| (i.due_date, i.amount_due))
            .unwrap_or((self.disbursal_date, Decimal::ZERO));
        let installments_remaining = u32::try_from(self.schedule.len()).unwrap_or(u32::MAX);

        let progress = LoanProgress {
            loan_id: id,
            last_transaction_at: None,
            next_due_date,
            next_due_amount,
            installments_remaining,
            active: installments_remaining > 0,
        };
        let loan = Loan {
            id,
            borrower_id: self.borrower_id,
            category: self.category,
            principal: self.principal,
            annual_rate: self.annual_rate,
            term_months: self.term_months,
            disbursal_date: self.disbursal_date,
            remaining_balance: Balance::new(self.schedule.total()),
            schedule: self.schedule,
        };
        (loan, progress)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub borrower_id: BorrowerId,
    pub category: LoanCategory,
    pub principal: u64,
    pub annual_rate: Decimal,
    pub term_months: u32,
    pub disbursal_date: NaiveDate,
    pub remaining_balance: Balance,
    pub schedule: InstallmentSchedule,
}

/// How far along its schedule a loan is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanProgress {
    pub loan_id: LoanId,
    pub last_transaction_at: Option<DateTime<Utc>>,
    pub next_due_date: NaiveDate,
    pub next_due_amount: Decimal,
    pub installments_remaining: u32,
    pub active: bool,
}

impl LoanProgress {
    pub fn state(&self) -> LoanState {
        if self.active {
            LoanState::Active
        } else {
            LoanState::Closed
        }
    }

    /// Index into the schedule of the installment due next.
    pub fn next_index(&self, schedule: &InstallmentSchedule) -> usize {
        schedule
            .len()
            .saturating_sub(self.installments_remaining as usize)
    }
}
