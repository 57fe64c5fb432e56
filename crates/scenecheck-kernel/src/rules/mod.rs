//! Rules and their dispatch.
//!
//! Four capabilities, each registered explicitly into a [`RuleRegistry`]:
//!
//! - [`ObjectValidator`]: per object, dispatched by [`ObjectClass`](scenecheck_types::ObjectClass)
//! - [`SceneValidator`]: once per full-scene run
//! - [`FieldValidator`]: per serialized field, with applicability cached per (type, path)
//! - [`DependencyPathValidator`]: per (root, dependency) asset path pair

pub mod builtin;
pub mod dispatch;
mod registry;
mod traits;

pub use builtin::register_builtins;
pub use registry::{FieldPlan, RuleRegistry};
pub use traits::{DependencyPathValidator, FieldValidator, ObjectValidator, RuleEnv, SceneValidator};
