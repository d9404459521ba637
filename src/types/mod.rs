//! Type definitions for the detection pipeline

pub mod alert;
pub mod transaction;

pub use alert::{AlertRecord, Severity};
pub use transaction::{Amount, Transaction};
