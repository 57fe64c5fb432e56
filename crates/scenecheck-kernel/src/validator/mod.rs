//! Validation runs: the context rules write into, the walkers that feed them,
//! and the collection a run produces.
//!
//! - **context**: assertions, scope, message formatting
//! - **issue** / **collection**: the issue arena and prefab parent resolution
//! - **hierarchy** / **dependencies**: stepwise walkers
//! - **run**: sequencing a full-scene or prefab run

mod collection;
mod context;
mod dependencies;
mod hierarchy;
mod issue;
mod run;

pub use collection::{IssueCollection, RunStatus};
pub use context::{AssertionKind, Check, ContextOptions, UNRESOLVED_LABEL, ValidationContext, strip_rich_text};
pub use dependencies::{DependencyCollector, DependencyWalk, collect_dependencies};
pub use hierarchy::{HierarchyWalk, skipped_by_validation_parent};
pub use issue::{AutoFix, Issue, IssueId};
pub use run::{RunOptions, RunTarget, ValidationRun};
