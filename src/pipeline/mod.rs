pub mod guard;
pub mod runner;

pub use guard::{ExecutionGuard, GuardError};
pub use runner::{run, run_with, skip, RunError, RunOutcome, RunSummary};
