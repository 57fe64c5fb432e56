//! Cooperative execution of validation runs.

mod driver;

pub use driver::{Cancelled, DriveStats, Step, StepState, run_time_sliced, run_to_completion};
