use crate::domain::borrower::Borrower;
use crate::error::Result;
use std::io::Write;

/// Writes `borrower_id,credit_score` rows. Unscored borrowers get an empty score.
pub struct ScoreWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ScoreWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_scores<'a>(&mut self, borrowers: impl IntoIterator<Item = &'a Borrower>) -> Result<()> {
        self.writer.write_record(["borrower_id", "credit_score"])?;
        for borrower in borrowers {
            let score = borrower
                .credit_score
                .map(|s| s.to_string())
                .unwrap_or_default();
            self.writer.write_record([borrower.id.to_string(), score])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
