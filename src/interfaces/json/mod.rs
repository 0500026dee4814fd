//! JSON-lines request/response codec for the `process` command.

pub mod request;
pub mod response;

use crate::application::engine::LoanEngine;
use crate::error::Result;
use chrono::{DateTime, Utc};
use request::Request;
use serde_json::Value;

/// Runs one request against the engine and renders the success payload.
///
/// `now` stands in for any timestamp the request leaves out.
pub async fn handle(engine: &LoanEngine, request: Request, now: DateTime<Utc>) -> Result<Value> {
    let value = match request {
        Request::Register(r) => serde_json::to_value(engine.register_borrower(r.into()).await?)?,
        Request::Apply(r) => serde_json::to_value(engine.apply_for_loan(r.into()).await?)?,
        Request::Pay(r) => serde_json::to_value(
            engine
                .apply_payment(r.loan_id, r.amount, r.paid_at.unwrap_or(now))
                .await?,
        )?,
        Request::Statement(r) => serde_json::to_value(engine.statement(r.loan_id).await?)?,
        Request::Transaction(r) => {
            serde_json::to_value(engine.record_transaction(r.into_transaction(now)).await?)?
        }
    };
    Ok(value)
}
