//! Rule capabilities.
//!
//! Rules are stateless and shared across runs; each returns `anyhow::Result`
//! and an error (or panic) is contained to the object being checked.

use scenecheck_types::{FieldAttribute, FieldDescriptor, FieldKind, ObjectClass, ObjectInfo};

use super::registry::RuleRegistry;
use crate::host::SceneHost;
use crate::validator::ValidationContext;

/// What a rule can see besides the context.
#[derive(Clone, Copy)]
pub struct RuleEnv<'a> {
    pub host: &'a dyn SceneHost,
    pub registry: &'a RuleRegistry,
}

/// Checks objects of one class.
pub trait ObjectValidator: Send + Sync {
    fn name(&self) -> &str;

    /// The object class this rule is dispatched for.
    fn target_class(&self) -> ObjectClass;

    fn can_validate(&self, object: &ObjectInfo) -> bool {
        let _ = object;
        true
    }

    fn validate(&self, object: &ObjectInfo, env: RuleEnv<'_>, ctx: &mut ValidationContext) -> anyhow::Result<()>;
}

/// Scene-wide checks with no target object.
pub trait SceneValidator: Send + Sync {
    fn name(&self) -> &str;

    fn validate(&self, env: RuleEnv<'_>, ctx: &mut ValidationContext) -> anyhow::Result<()>;
}

/// Checks serialized component fields.
pub trait FieldValidator: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this rule applies to `path` of `type_name`.
    ///
    /// Evaluated once per (type, path) and cached for the registry's lifetime,
    /// so it must depend only on its arguments.
    fn can_validate_field(
        &self,
        type_name: &str,
        path: &str,
        kind: FieldKind,
        attributes: &[FieldAttribute],
    ) -> bool {
        let _ = (type_name, path, kind, attributes);
        true
    }

    fn validate_field(
        &self,
        ctx: &mut ValidationContext,
        field: &FieldDescriptor,
        component: &ObjectInfo,
        attributes: &[FieldAttribute],
        host: &dyn SceneHost,
    ) -> anyhow::Result<()>;
}

/// Checks a (root, dependency) asset path pair.
pub trait DependencyPathValidator: Send + Sync {
    fn name(&self) -> &str;

    fn validate_path(&self, parent: &str, child: &str, ctx: &mut ValidationContext) -> anyhow::Result<()>;
}
