//! Shared utilities
//!
//! Logging setup, timing and polling helpers.

pub mod command;
pub mod logger;
pub mod poll;
pub mod timer;

pub use command::{run, run_checked, run_in_dir, CommandOutput};
pub use poll::{poll_until, PollConfig};
pub use timer::Timer;
