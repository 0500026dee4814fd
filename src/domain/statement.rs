use super::loan::{Loan, LoanProgress};
use super::money::round_currency;
use super::schedule::{add_months, first_of_next_month};
use super::transaction::Transaction;
use crate::error::{LoanError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PastTransaction {
    pub date: DateTime<Utc>,
    pub amount_paid: Decimal,
    /// The loan's rate as of now, not as of the payment.
    pub interest: Decimal,
    /// The loan's remaining balance as of now, not as of the payment.
    pub principal: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingInstallment {
    pub emi_date: NaiveDate,
    pub amount_due: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statement {
    pub past_transactions: Vec<PastTransaction>,
    pub upcoming_installments: Vec<UpcomingInstallment>,
}

/// Renders the repayment history and a flat projection of what is left.
///
/// The projection divides the remaining balance evenly over the remaining
/// installments and dates them monthly from the first due date after
/// disbursal. It is a display view and does not read the stored schedule.
pub fn build_statement(loan: &Loan, progress: &LoanProgress, transactions: &[Transaction]) -> Result<Statement> {
    if !progress.active {
        return Err(LoanError::InactiveLoan(loan.id));
    }

    let past_transactions = transactions
        .iter()
        .filter(|tx| tx.loan_id == Some(loan.id))
        .map(|tx| PastTransaction {
            date: tx.at,
            amount_paid: tx.amount.value(),
            interest: loan.annual_rate,
            principal: loan.remaining_balance.value(),
        })
        .collect();

    let upcoming_installments = match progress.installments_remaining {
        0 => Vec::new(),
        remaining => {
            let amount_due = round_currency(loan.remaining_balance.value() / Decimal::from(remaining));
            let first_due = first_of_next_month(loan.disbursal_date);
            (0..remaining)
                .map(|i| UpcomingInstallment {
                    emi_date: add_months(first_due, i),
                    amount_due,
                })
                .collect()
        }
    };

    Ok(Statement {
        past_transactions,
        upcoming_installments,
    })
}
