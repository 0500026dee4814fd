//! Orchestration over the domain: the loan engine, per-key locking and the
//! background credit-score worker.

pub mod engine;
pub mod jobs;
pub mod locks;
