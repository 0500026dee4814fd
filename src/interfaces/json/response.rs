use crate::error::{LoanError, Result};
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize, PartialEq)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
}

impl From<&LoanError> for ErrorBody {
    fn from(e: &LoanError) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

/// Serialized as `{"ok": ...}` or `{"error": {"kind", "message"}}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Response<T> {
    Ok(T),
    Error(ErrorBody),
}

/// Writes one JSON response per line and flushes after each, so a consumer
/// reading the other end of a pipe sees results as they happen.
pub struct ResponseWriter<W: Write> {
    sink: W,
}

impl<W: Write> ResponseWriter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    pub fn write_ok<T: Serialize>(&mut self, value: &T) -> Result<()> {
        self.write(&Response::Ok(value))
    }

    pub fn write_error(&mut self, error: &LoanError) -> Result<()> {
        self.write(&Response::<()>::Error(ErrorBody::from(error)))
    }

    fn write<T: Serialize>(&mut self, response: &Response<T>) -> Result<()> {
        serde_json::to_writer(&mut self.sink, response)?;
        self.sink.write_all(b"\n")?;
        self.sink.flush()?;
        Ok(())
    }
}
