//! EMI quoting and schedule construction.
//!
//! All arithmetic is done in `Decimal`. The monthly EMI is rounded to 2dp and
//! the last installment absorbs whatever the rounding left behind, so a
//! schedule always sums to exactly the amount it was built for.

use super::money::round_currency;
use super::schedule::{Installment, InstallmentSchedule, add_months, first_of_next_month};
use crate::error::{LoanError, Result};
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmiQuote {
    pub monthly_emi: Decimal,
    /// `monthly_emi * term`, before any schedule correction.
    pub total_recoverable: Decimal,
}

/// (1 + r)^n by repeated multiplication, `None` on overflow.
fn compound(rate: Decimal, n: u32) -> Option<Decimal> {
    let factor = Decimal::ONE.checked_add(rate)?;
    (0..n).try_fold(Decimal::ONE, |acc, _| acc.checked_mul(factor))
}

fn monthly_rate(annual_rate_percent: Decimal) -> Decimal {
    annual_rate_percent / dec!(12) / dec!(100)
}

/// Unrounded `P·r·(1+r)^n / ((1+r)^n − 1)`.
fn amortized_payment(principal: Decimal, annual_rate_percent: Decimal, term_months: u32) -> Result<Decimal> {
    if term_months == 0 {
        return Err(LoanError::ValidationError(
            "term must be at least one month".to_string(),
        ));
    }
    let rate = monthly_rate(annual_rate_percent);
    if rate.is_zero() {
        return Ok(principal / Decimal::from(term_months));
    }
    let overflow = || {
        LoanError::ValidationError(format!(
            "EMI for a {} month term at {}% is out of range",
            term_months, annual_rate_percent
        ))
    };
    let growth = compound(rate, term_months).ok_or_else(overflow)?;
    principal
        .checked_mul(rate)
        .and_then(|v| v.checked_mul(growth))
        .and_then(|v| v.checked_div(growth - Decimal::ONE))
        .ok_or_else(overflow)
}

/// Quotes the monthly EMI and the naive total recoverable amount.
pub fn quote_emi(principal: Decimal, annual_rate_percent: Decimal, term_months: u32) -> Result<EmiQuote> {
    if principal <= Decimal::ZERO {
        return Err(LoanError::ValidationError(
            "principal must be positive".to_string(),
        ));
    }
    if annual_rate_percent.is_sign_negative() {
        return Err(LoanError::ValidationError(
            "interest rate must not be negative".to_string(),
        ));
    }
    let monthly_emi = round_currency(amortized_payment(principal, annual_rate_percent, term_months)?);
    let total_recoverable = monthly_emi
        .checked_mul(Decimal::from(term_months))
        .ok_or_else(|| LoanError::ValidationError("total recoverable is out of range".to_string()))?;
    Ok(EmiQuote {
        monthly_emi,
        total_recoverable,
    })
}

/// Rejects a quote whose EMI exceeds `ratio` of the borrower's annual income.
pub fn check_affordability(quote: &EmiQuote, annual_income: Decimal, ratio: Decimal) -> Result<()> {
    let limit = ratio * annual_income;
    if quote.monthly_emi > limit {
        return Err(LoanError::Affordability {
            emi: quote.monthly_emi,
            limit,
        });
    }
    Ok(())
}

/// Builds `term_months` installments due on the 1st of each month, starting
/// the month after disbursal.
///
/// The first `term_months − 1` entries are exactly `monthly_emi`. The last is
/// whatever is left of `total_recoverable` and is omitted when that is not
/// strictly positive.
pub fn build_schedule(
    term_months: u32,
    disbursal_date: NaiveDate,
    monthly_emi: Decimal,
    total_recoverable: Decimal,
) -> InstallmentSchedule {
    schedule_from(
        first_of_next_month(disbursal_date),
        term_months,
        monthly_emi,
        total_recoverable,
    )
}

/// Same as [`build_schedule`] but with an explicit first due date.
pub fn schedule_from(
    first_due: NaiveDate,
    installments: u32,
    monthly_emi: Decimal,
    total: Decimal,
) -> InstallmentSchedule {
    let regular = installments.saturating_sub(1);
    let mut entries: Vec<Installment> = (0..regular)
        .map(|i| Installment {
            due_date: add_months(first_due, i),
            amount_due: monthly_emi,
        })
        .collect();

    let remainder = total - monthly_emi * Decimal::from(regular);
    if installments > 0 && remainder > Decimal::ZERO {
        entries.push(Installment {
            due_date: add_months(first_due, regular),
            amount_due: remainder,
        });
    } else if installments > 0 {
        debug!(%remainder, "final installment dropped, nothing left to recover");
    }

    InstallmentSchedule::new(entries)
}

/// New next-due amount after an off-schedule payment: the amortization
/// formula applied to the post-payment balance over the original term.
pub fn recalculate_next_installment(
    remaining_balance: Decimal,
    annual_rate_percent: Decimal,
    term_months: u32,
) -> Result<Decimal> {
    if remaining_balance <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }
    Ok(round_currency(amortized_payment(
        remaining_balance,
        annual_rate_percent,
        term_months,
    )?))
}

/// Spreads `remaining_balance` flat over `installments` months from
/// `first_due`. The balance already carries its interest, so none is added.
///
/// A balance too small to cover one cent per month is spread over fewer
/// months, so every installment stays positive.
pub fn reamortize_remaining(
    remaining_balance: Decimal,
    first_due: NaiveDate,
    installments: u32,
) -> InstallmentSchedule {
    if installments == 0 || remaining_balance <= Decimal::ZERO {
        return InstallmentSchedule::default();
    }
    let cents = (remaining_balance * dec!(100)).trunc().to_u32().unwrap_or(u32::MAX);
    let installments = installments.min(cents).max(1);
    let count = Decimal::from(installments);

    let mut monthly = round_currency(remaining_balance / count);
    if monthly * (count - Decimal::ONE) >= remaining_balance {
        // Rounding up would leave nothing for the last installment.
        monthly = (remaining_balance / count).round_dp_with_strategy(2, RoundingStrategy::ToZero);
    }
    schedule_from(first_due, installments, monthly, remaining_balance)
}
