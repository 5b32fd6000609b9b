//! history and comparison operations over any store

mod diff;
mod log;

pub use diff::{diff, diff_trees};
pub use log::{log, LogEntry};
