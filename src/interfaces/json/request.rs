use crate::domain::borrower::NewBorrower;
use crate::domain::ledger::LoanApplication;
use crate::domain::loan::LoanCategory;
use crate::domain::money::Amount;
use crate::domain::transaction::{Direction, NewTransaction};
use crate::domain::{BorrowerId, LoanId};
use crate::error::{LoanError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::BufRead;

/// One line of a request stream, tagged by `op`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Register(RegisterBorrower),
    Apply(ApplyForLoan),
    Pay(MakePayment),
    Statement(GetStatement),
    Transaction(RecordTransaction),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBorrower {
    pub name: String,
    pub email: String,
    pub external_id: String,
    pub annual_income: Decimal,
}

impl From<RegisterBorrower> for NewBorrower {
    fn from(r: RegisterBorrower) -> Self {
        NewBorrower {
            name: r.name,
            email: r.email,
            external_id: r.external_id,
            annual_income: r.annual_income,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyForLoan {
    pub borrower_id: BorrowerId,
    #[serde(rename = "loanType")]
    pub category: LoanCategory,
    pub principal: u64,
    #[serde(rename = "interestRate")]
    pub annual_rate: Decimal,
    pub term_months: u32,
    pub disbursal_date: NaiveDate,
}

impl From<ApplyForLoan> for LoanApplication {
    fn from(r: ApplyForLoan) -> Self {
        LoanApplication {
            borrower_id: r.borrower_id,
            category: r.category,
            principal: r.principal,
            annual_rate: r.annual_rate,
            term_months: r.term_months,
            disbursal_date: r.disbursal_date,
        }
    }
}

/// `paidAt` defaults to the time the request is handled.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MakePayment {
    pub loan_id: LoanId,
    pub amount: Amount,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetStatement {
    pub loan_id: LoanId,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordTransaction {
    pub borrower_id: BorrowerId,
    pub direction: Direction,
    pub amount: Amount,
    pub at: Option<DateTime<Utc>>,
}

impl RecordTransaction {
    pub fn into_transaction(self, now: DateTime<Utc>) -> NewTransaction {
        NewTransaction {
            borrower_id: self.borrower_id,
            loan_id: None,
            direction: self.direction,
            amount: self.amount,
            at: self.at.unwrap_or(now),
        }
    }
}

/// Reads JSON lines, one [`Request`] per non-blank line.
pub struct RequestReader<R: BufRead> {
    source: R,
}

impl<R: BufRead> RequestReader<R> {
    pub fn new(source: R) -> Self {
        Self { source }
    }

    /// Yields `(line_number, request)`. Line numbers start at 1 and count
    /// blank lines, which are skipped.
    pub fn requests(self) -> impl Iterator<Item = (usize, Result<Request>)> {
        self.source
            .lines()
            .enumerate()
            .filter(|(_, line)| !matches!(line, Ok(l) if l.trim().is_empty()))
            .map(|(index, line)| {
                let request = line
                    .map_err(LoanError::from)
                    .and_then(|l| serde_json::from_str(&l).map_err(LoanError::from));
                (index + 1, request)
            })
    }
}
