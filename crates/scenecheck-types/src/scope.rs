//! Validation scope: what the checks currently being made are attributed to.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ObjectId;

/// Classification of the current validation target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    /// Scene-wide checks with no single target object.
    Scene,
    /// An object living in an open scene.
    SceneObject,
    /// An object inside a prefab asset.
    Prefab,
    /// A standalone asset.
    Asset,
}

/// How severe a failed check is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    /// Highlight color used by rich-text messages.
    pub fn highlight_color(self) -> &'static str {
        match self {
            Severity::Error => "red",
            Severity::Warning => "yellow",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// The target and classification subsequent checks are attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidationScope {
    /// Object under inspection, if any.
    pub target: Option<ObjectId>,
    pub kind: ScopeKind,
    /// The target is only transitively referenced by the run's primary subject.
    pub is_dependency: bool,
}

impl ValidationScope {
    pub fn new(kind: ScopeKind, target: Option<ObjectId>, is_dependency: bool) -> Self {
        Self {
            target,
            kind,
            is_dependency,
        }
    }

    /// Scene-wide scope with no target.
    pub fn scene() -> Self {
        Self::new(ScopeKind::Scene, None, false)
    }

    /// Whether an issue raised in this scope may carry an auto-fix.
    ///
    /// False for prefabs and scene objects reached only as a dependency.
    pub fn allows_auto_fix(&self) -> bool {
        !self.is_dependency || self.kind == ScopeKind::Asset
    }

    pub fn is_scene_object(&self) -> bool {
        self.kind == ScopeKind::SceneObject
    }

    pub fn is_asset(&self) -> bool {
        self.kind == ScopeKind::Asset
    }
}

impl Default for ValidationScope {
    fn default() -> Self {
        Self::scene()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::scene(ScopeKind::Scene, false, true)]
    #[case::scene_object(ScopeKind::SceneObject, false, true)]
    #[case::open_prefab(ScopeKind::Prefab, false, true)]
    #[case::dependency_prefab(ScopeKind::Prefab, true, false)]
    #[case::dependency_asset(ScopeKind::Asset, true, true)]
    #[case::dependency_scene_object(ScopeKind::SceneObject, true, false)]
    fn auto_fix_permission(#[case] kind: ScopeKind, #[case] is_dependency: bool, #[case] allowed: bool) {
        let scope = ValidationScope::new(kind, Some(ObjectId(1)), is_dependency);
        assert_eq!(scope.allows_auto_fix(), allowed);
    }

    #[test]
    fn severity_orders_error_above_warning() {
        assert!(Severity::Error > Severity::Warning);
        assert_eq!(Severity::Error.highlight_color(), "red");
        assert_eq!(Severity::Warning.highlight_color(), "yellow");
    }
}
