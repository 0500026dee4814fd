//! Domain layer: the loan model and the pure engines that act on it.
//!
//! Nothing in here performs I/O. Storage is reached only through the traits
//! in [`ports`], which the application layer wires to an adapter.

pub mod amortization;
pub mod borrower;
pub mod credit_score;
pub mod eligibility;
pub mod ledger;
pub mod loan;
pub mod money;
pub mod ports;
pub mod schedule;
pub mod statement;
pub mod transaction;

pub type BorrowerId = u64;
pub type LoanId = u64;
pub type TransactionId = u64;
