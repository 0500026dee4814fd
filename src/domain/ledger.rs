//! The loan state machine: `NoLoan → Active → Closed`.
//!
//! [`LoanLedger`] decides transitions but never persists them. Every method
//! takes the current state by reference and hands back the next state, so a
//! rejected request cannot leave anything half-applied.

use super::amortization::{
    build_schedule, check_affordability, quote_emi, reamortize_remaining,
    recalculate_next_installment,
};
use super::borrower::Borrower;
use super::eligibility::EligibilityRules;
use super::loan::{Loan, LoanCategory, LoanProgress, NewLoan};
use super::money::{Amount, Balance};
use super::schedule::add_months;
use super::transaction::{Direction, NewTransaction};
use super::BorrowerId;
use crate::config::{CategoryLimits, LoanConfig, RecalculationPolicy};
use crate::error::{LoanError, Result};
use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Terms requested by a borrower.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApplication {
    pub borrower_id: BorrowerId,
    pub category: LoanCategory,
    pub principal: u64,
    pub annual_rate: Decimal,
    pub term_months: u32,
    pub disbursal_date: NaiveDate,
}

impl LoanApplication {
    pub fn validate(&self, limits: &CategoryLimits) -> Result<()> {
        if self.principal == 0 {
            return Err(LoanError::ValidationError(
                "principal must be positive".to_string(),
            ));
        }
        if self.term_months == 0 {
            return Err(LoanError::ValidationError(
                "termMonths must be positive".to_string(),
            ));
        }
        let limit = limits.limit(self.category);
        if self.principal > limit {
            return Err(LoanError::ValidationError(format!(
                "principal {} exceeds the {} loan limit of {}",
                self.principal, self.category, limit
            )));
        }
        Ok(())
    }
}

/// The state after an accepted payment, plus the ledger entry recording it.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentApplied {
    pub loan: Loan,
    pub progress: LoanProgress,
    pub transaction: NewTransaction,
}

pub struct LoanLedger {
    min_interest_rate: Decimal,
    affordability_ratio: Decimal,
    eligibility: EligibilityRules,
    limits: CategoryLimits,
    policy: RecalculationPolicy,
}

impl LoanLedger {
    pub fn new(config: &LoanConfig) -> Self {
        Self {
            min_interest_rate: config.min_interest_rate,
            affordability_ratio: config.affordability_ratio,
            eligibility: config.eligibility_rules(),
            limits: config.category_limits.clone(),
            policy: config.recalculation,
        }
    }

    /// `NoLoan → Active`: runs every precondition and builds the schedule.
    ///
    /// `open_loan` is the borrower's currently active loan, if any.
    pub fn approve(
        &self,
        borrower: &Borrower,
        open_loan: Option<&Loan>,
        application: &LoanApplication,
    ) -> Result<NewLoan> {
        application.validate(&self.limits)?;

        if application.annual_rate <= self.min_interest_rate {
            return Err(LoanError::RateTooLow {
                rate: application.annual_rate,
                floor: self.min_interest_rate,
            });
        }

        if let Some(loan) = open_loan {
            return Err(LoanError::DuplicateLoan {
                borrower: borrower.id,
                loan: loan.id,
            });
        }

        self.eligibility
            .check(borrower)
            .map_err(|reason| LoanError::Ineligible {
                borrower: borrower.id,
                reason: reason.to_string(),
            })?;

        let quote = quote_emi(
            Decimal::from(application.principal),
            application.annual_rate,
            application.term_months,
        )?;
        check_affordability(&quote, borrower.annual_income, self.affordability_ratio)?;

        let schedule = build_schedule(
            application.term_months,
            application.disbursal_date,
            quote.monthly_emi,
            quote.total_recoverable,
        );
        debug!(
            borrower = borrower.id,
            emi = %quote.monthly_emi,
            installments = schedule.len(),
            "schedule built"
        );

        Ok(NewLoan {
            borrower_id: borrower.id,
            category: application.category,
            principal: application.principal,
            annual_rate: application.annual_rate,
            term_months: application.term_months,
            disbursal_date: application.disbursal_date,
            schedule,
        })
    }

    /// Rejects a payment in the same calendar month as the previous one, or
    /// after more than one full month has gone by since it.
    pub fn check_payment_window(&self, loan: &Loan, progress: &LoanProgress, now: DateTime<Utc>) -> Result<()> {
        let Some(last) = progress.last_transaction_at else {
            return Ok(());
        };
        if now < last || (last.year() == now.year() && last.month() == now.month()) {
            return Err(LoanError::AlreadyPaid {
                loan: loan.id,
                period: last.format("%Y-%m").to_string(),
            });
        }
        if last
            .checked_add_months(Months::new(2))
            .is_some_and(|cutoff| cutoff <= now)
        {
            return Err(LoanError::PaymentWindowElapsed {
                loan: loan.id,
                last_payment: last,
            });
        }
        Ok(())
    }

    /// `Active → Active | Closed`: applies one payment.
    pub fn apply_payment(
        &self,
        loan: &Loan,
        progress: &LoanProgress,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Result<PaymentApplied> {
        if !progress.active || progress.installments_remaining == 0 {
            return Err(LoanError::InactiveLoan(loan.id));
        }
        self.check_payment_window(loan, progress, now)?;
        if Balance::from(amount) > loan.remaining_balance {
            return Err(LoanError::Overpayment {
                amount: amount.value(),
                remaining: loan.remaining_balance.value(),
            });
        }

        let mut loan = loan.clone();
        let mut progress = progress.clone();
        let paid_index = progress.next_index(&loan.schedule);
        let on_schedule = amount.value() == progress.next_due_amount;

        loan.remaining_balance -= Balance::from(amount);
        progress.last_transaction_at = Some(now);
        progress.next_due_date = add_months(progress.next_due_date, 1);
        progress.installments_remaining -= 1;

        if on_schedule {
            if let Some(next) = loan.schedule.get(paid_index + 1) {
                progress.next_due_amount = next.amount_due;
            }
        } else {
            self.recalculate(&mut loan, &mut progress, paid_index + 1)?;
        }

        progress.next_due_amount = progress.next_due_amount.min(loan.remaining_balance.value());
        if loan.remaining_balance <= Balance::ZERO {
            // Paid off ahead of schedule: nothing left to collect.
            progress.installments_remaining = 0;
        }
        if progress.installments_remaining == 0 {
            progress.active = false;
            progress.next_due_amount = Decimal::ZERO;
        }

        let transaction = NewTransaction {
            borrower_id: loan.borrower_id,
            loan_id: Some(loan.id),
            direction: Direction::Credit,
            amount,
            at: now,
        };
        Ok(PaymentApplied {
            loan,
            progress,
            transaction,
        })
    }

    fn recalculate(&self, loan: &mut Loan, progress: &mut LoanProgress, next_index: usize) -> Result<()> {
        match self.policy {
            RecalculationPolicy::NextInstallment => {
                let next = recalculate_next_installment(
                    loan.remaining_balance.value(),
                    loan.annual_rate,
                    loan.term_months,
                )?;
                loan.schedule.set_amount(next_index, next);
                progress.next_due_amount = next;
            }
            RecalculationPolicy::Reamortize => {
                let tail = reamortize_remaining(
                    loan.remaining_balance.value(),
                    progress.next_due_date,
                    progress.installments_remaining,
                );
                progress.installments_remaining = u32::try_from(tail.len()).unwrap_or(u32::MAX);
                progress.next_due_amount = tail.first().map(|i| i.amount_due).unwrap_or(Decimal::ZERO);
                loan.schedule.replace_tail(next_index, tail);
            }
        }
        debug!(
            loan = loan.id,
            policy = ?self.policy,
            next_due = %progress.next_due_amount,
            "installment recalculated"
        );
        Ok(())
    }
}
