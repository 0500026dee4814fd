use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// First day of the month after `date`.
pub fn first_of_next_month(date: NaiveDate) -> NaiveDate {
    add_months(first_of_month(date), 1)
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Adds calendar months, clamping to the last valid day of the target month.
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months))
        .unwrap_or(NaiveDate::MAX)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Installment {
    #[serde(rename = "date")]
    pub due_date: NaiveDate,
    pub amount_due: Decimal,
}

/// Ordered monthly installments of one loan.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstallmentSchedule(Vec<Installment>);

impl InstallmentSchedule {
    pub fn new(installments: Vec<Installment>) -> Self {
        Self(installments)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Installment> {
        self.0.get(index)
    }

    pub fn first(&self) -> Option<&Installment> {
        self.0.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Installment> {
        self.0.iter()
    }

    pub fn total(&self) -> Decimal {
        self.0.iter().map(|i| i.amount_due).sum()
    }

    /// Overwrites the amount of a single entry, leaving the rest untouched.
    pub fn set_amount(&mut self, index: usize, amount: Decimal) {
        if let Some(entry) = self.0.get_mut(index) {
            entry.amount_due = amount;
        }
    }

    /// Drops every entry from `from` on and appends `tail` in their place.
    pub fn replace_tail(&mut self, from: usize, tail: InstallmentSchedule) {
        self.0.truncate(from);
        self.0.extend(tail.0);
    }

    pub fn into_inner(self) -> Vec<Installment> {
        self.0
    }
}
