//! Process-wide settings, built once at start-up and handed to constructors.

use crate::domain::credit_score::ScoreBands;
use crate::domain::eligibility::EligibilityRules;
use crate::domain::loan::LoanCategory;
use crate::error::Result;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

/// What to do with the schedule after a payment that differs from the
/// amount due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecalculationPolicy {
    /// Recompute only the next installment with the amortization formula.
    #[default]
    NextInstallment,
    /// Rebuild every remaining installment from the remaining balance.
    Reamortize,
}

/// Largest principal accepted per loan category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryLimits {
    pub car: u64,
    pub home: u64,
    pub education: u64,
    pub personal: u64,
}

impl Default for CategoryLimits {
    fn default() -> Self {
        Self {
            car: 750_000,
            home: 8_500_000,
            education: 5_000_000,
            personal: 1_000_000,
        }
    }
}

impl CategoryLimits {
    pub fn limit(&self, category: LoanCategory) -> u64 {
        match category {
            LoanCategory::Car => self.car,
            LoanCategory::Home => self.home,
            LoanCategory::Education => self.education,
            LoanCategory::Personal => self.personal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff_ms: 100,
        }
    }
}

impl JobConfig {
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(u64::from(attempt)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoanConfig {
    pub min_interest_rate: Decimal,
    pub min_credit_score: u16,
    pub min_annual_income: Decimal,
    pub affordability_ratio: Decimal,
    pub score_bands: ScoreBands,
    pub category_limits: CategoryLimits,
    pub recalculation: RecalculationPolicy,
    pub lock_timeout_ms: u64,
    pub jobs: JobConfig,
}

impl Default for LoanConfig {
    fn default() -> Self {
        Self {
            min_interest_rate: dec!(14),
            min_credit_score: 450,
            min_annual_income: dec!(150000),
            affordability_ratio: dec!(0.6),
            score_bands: ScoreBands::default(),
            category_limits: CategoryLimits::default(),
            recalculation: RecalculationPolicy::default(),
            lock_timeout_ms: 500,
            jobs: JobConfig::default(),
        }
    }
}

impl LoanConfig {
    /// Reads a JSON config file. Missing fields keep their defaults.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn eligibility_rules(&self) -> EligibilityRules {
        EligibilityRules {
            min_credit_score: self.min_credit_score,
            min_annual_income: self.min_annual_income,
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}
