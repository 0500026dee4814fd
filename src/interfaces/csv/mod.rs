pub mod schedule_writer;
pub mod score_writer;
pub mod transaction_reader;
