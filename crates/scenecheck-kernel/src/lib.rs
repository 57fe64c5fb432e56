//! scenecheck-kernel: the validation engine.
//!
//! This crate provides:
//!
//! - **Host**: traits for the editor the engine runs in, plus an in-memory host
//! - **Rules**: object, scene, field, and dependency-path rules; explicit registry and dispatch
//! - **Validator**: assertion context, issue collection with prefab parent resolution,
//!   hierarchy and dependency walkers, the run step machine
//! - **Scheduler**: driving a run to completion or in cancellable time slices
//! - **Engine**: one active run at a time, last request wins, aborts on simulation

pub mod config;
pub mod engine;
pub mod error;
pub mod host;
#[cfg(feature = "native")]
pub mod paths;
pub mod rules;
pub mod scheduler;
pub mod validator;

pub use config::{EngineConfig, RulesConfig};
pub use engine::{Engine, HostMode, RunEvent, RunState};
pub use error::ValidationError;
pub use host::{MemoryScene, SceneDocument, SceneHost};
pub use rules::RuleRegistry;
pub use validator::{
    Check, Issue, IssueCollection, IssueId, RunStatus, RunTarget, ValidationContext, ValidationRun,
};
