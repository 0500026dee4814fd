use super::BorrowerId;
use crate::error::LoanError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A credit score in the closed range `[300, 900]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct CreditScore(u16);

impl CreditScore {
    pub const MIN: Self = Self(300);
    pub const MAX: Self = Self(900);

    pub fn new(value: u16) -> Result<Self, LoanError> {
        if (Self::MIN.0..=Self::MAX.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(LoanError::ValidationError(format!(
                "Credit score {} is outside [300, 900]",
                value
            )))
        }
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for CreditScore {
    type Error = LoanError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CreditScore> for u16 {
    fn from(score: CreditScore) -> Self {
        score.0
    }
}

impl fmt::Display for CreditScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registration data for a borrower that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBorrower {
    pub name: String,
    pub email: String,
    pub external_id: String,
    pub annual_income: Decimal,
}

impl NewBorrower {
    /// Checks the fields the inbound gate is expected to have filled in.
    pub fn validate(&self) -> Result<(), LoanError> {
        if self.name.trim().is_empty() {
            return Err(LoanError::ValidationError("name is required".to_string()));
        }
        if !self.email.contains('@') {
            return Err(LoanError::ValidationError(format!(
                "'{}' is not a valid email address",
                self.email
            )));
        }
        if self.external_id.trim().is_empty() {
            return Err(LoanError::ValidationError(
                "externalId is required".to_string(),
            ));
        }
        if self.annual_income.is_sign_negative() {
            return Err(LoanError::ValidationError(
                "annualIncome must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn into_borrower(self, id: BorrowerId) -> Borrower {
        Borrower {
            id,
            name: self.name,
            email: self.email,
            external_id: self.external_id,
            annual_income: self.annual_income,
            credit_score: None,
        }
    }
}

/// A registered borrower.
///
/// Identity and income are fixed at registration. The credit score starts
/// empty and is only ever written by the credit-score job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Borrower {
    pub id: BorrowerId,
    pub name: String,
    pub email: String,
    pub external_id: String,
    pub annual_income: Decimal,
    pub credit_score: Option<CreditScore>,
}
