//! Credit score derivation from a borrower's ledger balance.

use super::borrower::CreditScore;
use super::money::Balance;
use super::transaction::{Direction, Transaction};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Piecewise step function mapping a ledger balance to a score.
///
/// At or below `floor_balance` the score is 300, at or above
/// `ceiling_balance` it is 900. In between it climbs `step_points` for every
/// whole `step_balance` above the floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreBands {
    pub floor_balance: Decimal,
    pub ceiling_balance: Decimal,
    pub step_balance: Decimal,
    pub step_points: u16,
}

impl Default for ScoreBands {
    fn default() -> Self {
        Self {
            floor_balance: dec!(100000),
            ceiling_balance: dec!(1000000),
            step_balance: dec!(15000),
            step_points: 10,
        }
    }
}

impl ScoreBands {
    pub fn score(&self, balance: Balance) -> CreditScore {
        let balance = balance.value();
        if balance >= self.ceiling_balance {
            return CreditScore::MAX;
        }
        if balance <= self.floor_balance || self.step_balance <= Decimal::ZERO {
            return CreditScore::MIN;
        }
        let steps = ((balance - self.floor_balance) / self.step_balance)
            .floor()
            .to_u32()
            .unwrap_or(u32::MAX);
        let points = u32::from(CreditScore::MIN.value())
            .saturating_add(steps.saturating_mul(u32::from(self.step_points)))
            .min(u32::from(CreditScore::MAX.value()));
        // Clamped to [300, 900] above, so the conversion cannot fail.
        CreditScore::new(points as u16).unwrap_or(CreditScore::MAX)
    }
}

/// Sum of credits minus sum of debits.
pub fn ledger_balance<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Balance {
    transactions
        .into_iter()
        .map(|tx| match tx.direction {
            Direction::Credit => Balance::from(tx.amount),
            Direction::Debit => Balance::ZERO - Balance::from(tx.amount),
        })
        .sum()
}
