//! Data models for harness results

mod test_result;

pub use test_result::{SuiteSummary, TestResult, TestStatus};
