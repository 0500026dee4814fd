use super::borrower::Borrower;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::fmt;

/// Why a borrower failed the eligibility gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ineligibility {
    NoCreditScore,
    LowCreditScore { score: u16, minimum: u16 },
    LowIncome { income: Decimal, minimum: Decimal },
}

impl fmt::Display for Ineligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCreditScore => write!(f, "no credit score on record"),
            Self::LowCreditScore { score, minimum } => {
                write!(f, "credit score {} is below {}", score, minimum)
            }
            Self::LowIncome { income, minimum } => {
                write!(f, "annual income {} is below {}", income, minimum)
            }
        }
    }
}

/// Credit and income gate applied before a loan is quoted.
#[derive(Debug, Clone, PartialEq)]
pub struct EligibilityRules {
    pub min_credit_score: u16,
    pub min_annual_income: Decimal,
}

impl Default for EligibilityRules {
    fn default() -> Self {
        Self {
            min_credit_score: 450,
            min_annual_income: dec!(150000),
        }
    }
}

impl EligibilityRules {
    pub fn check(&self, borrower: &Borrower) -> Result<(), Ineligibility> {
        let Some(score) = borrower.credit_score else {
            return Err(Ineligibility::NoCreditScore);
        };
        if score.value() < self.min_credit_score {
            return Err(Ineligibility::LowCreditScore {
                score: score.value(),
                minimum: self.min_credit_score,
            });
        }
        if borrower.annual_income < self.min_annual_income {
            return Err(Ineligibility::LowIncome {
                income: borrower.annual_income,
                minimum: self.min_annual_income,
            });
        }
        Ok(())
    }

    pub fn is_eligible(&self, borrower: &Borrower) -> bool {
        self.check(borrower).is_ok()
    }
}
