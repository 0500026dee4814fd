use crate::domain::amortization::EmiQuote;
use crate::domain::schedule::InstallmentSchedule;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct ScheduleRow {
    installment: usize,
    due_date: String,
    amount_due: String,
    monthly_emi: String,
    total_recoverable: String,
}

/// Writes an installment schedule as CSV, one row per installment.
///
/// Every row repeats the quote it was built from, so the output stays a
/// single rectangular table.
pub struct ScheduleWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ScheduleWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_schedule(&mut self, quote: &EmiQuote, schedule: &InstallmentSchedule) -> Result<()> {
        for (index, installment) in schedule.iter().enumerate() {
            self.writer.serialize(ScheduleRow {
                installment: index + 1,
                due_date: installment.due_date.to_string(),
                amount_due: format!("{:.2}", installment.amount_due),
                monthly_emi: format!("{:.2}", quote.monthly_emi),
                total_recoverable: format!("{:.2}", quote.total_recoverable),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
