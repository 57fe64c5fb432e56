//! Drivers for resumable tasks.
//!
//! A task does one small unit of work per [`Step::step`] call. The same task
//! can be driven to completion on the calling thread, or cooperatively in
//! time slices that yield to the async runtime between slices.

use std::time::{Duration, Instant};

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Result of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    MoreWork,
    Finished,
}

/// A task that makes progress one bounded step at a time.
pub trait Step {
    fn step(&mut self) -> StepState;
}

/// Counters for one drive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriveStats {
    /// Steps taken, including the final one.
    pub steps: usize,
    /// Times control was handed back to the runtime.
    pub yields: usize,
}

/// The cancellation token fired before the task finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("run cancelled after {steps} steps")]
pub struct Cancelled {
    pub steps: usize,
}

/// Drive `task` until it finishes, without yielding.
pub fn run_to_completion<S: Step + ?Sized>(task: &mut S) -> DriveStats {
    let mut stats = DriveStats::default();
    loop {
        stats.steps += 1;
        if task.step() == StepState::Finished {
            return stats;
        }
    }
}

/// Drive `task` in slices of roughly `budget` wall-clock time.
///
/// Yields to the runtime whenever a slice runs over budget. Cancellation is
/// observed before the first step and after every yield; a step in progress
/// is never interrupted.
pub async fn run_time_sliced<S: Step + ?Sized>(
    task: &mut S,
    budget: Duration,
    cancel: &CancellationToken,
) -> Result<DriveStats, Cancelled> {
    let mut stats = DriveStats::default();
    if cancel.is_cancelled() {
        return Err(Cancelled { steps: 0 });
    }
    let mut slice_start = Instant::now();
    loop {
        stats.steps += 1;
        if task.step() == StepState::Finished {
            return Ok(stats);
        }
        if slice_start.elapsed() >= budget {
            stats.yields += 1;
            tokio::task::yield_now().await;
            if cancel.is_cancelled() {
                return Err(Cancelled { steps: stats.steps });
            }
            slice_start = Instant::now();
        }
    }
}
