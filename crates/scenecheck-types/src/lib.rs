//! scenecheck-types: pure data shared by the validation kernel, its hosts, and its front ends.
//!
//! Nothing in here talks to a host or runs a rule. These are the values that
//! flow between them:
//!
//! - **Objects**: opaque [`ObjectId`] handles plus the [`ObjectInfo`] a host reports for them
//! - **Scopes**: what a check is attributed to ([`ValidationScope`], [`ScopeKind`])
//! - **Call sites**: [`SourceInfo`], the identity of a check across object instances
//! - **Fields**: serialized component fields and their declared attributes

mod field;
mod object;
mod scope;
mod source;

pub use field::{FieldAttribute, FieldDescriptor, FieldKind, FieldValue};
pub use object::{ContainerInfo, ObjectClass, ObjectId, ObjectInfo, PrefabStage};
pub use scope::{ScopeKind, Severity, ValidationScope};
pub use source::SourceInfo;
