//! Object handles and the metadata hosts report for them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque handle to a host object (node, component, or asset).
///
/// Handles are only meaningful to the host that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Broad class of a host object, used to pick a dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectClass {
    /// A node in a scene or prefab hierarchy.
    Node,
    /// A component attached to a node.
    Component,
    /// A standalone asset that is not a hierarchy.
    Asset,
}

impl ObjectClass {
    /// All classes, in dispatch-table order.
    pub const ALL: [ObjectClass; 3] = [ObjectClass::Node, ObjectClass::Component, ObjectClass::Asset];

    /// Index into a per-class table.
    pub fn index(self) -> usize {
        match self {
            ObjectClass::Node => 0,
            ObjectClass::Component => 1,
            ObjectClass::Asset => 2,
        }
    }
}

/// What a host knows about one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub id: ObjectId,
    pub class: ObjectClass,
    /// Declaring type, e.g. `Game.Enemy` or `UnityEngine.Light`.
    pub type_name: String,
    /// Display name.
    pub name: String,
}

impl ObjectInfo {
    pub fn new(id: ObjectId, class: ObjectClass, type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            class,
            type_name: type_name.into(),
            name: name.into(),
        }
    }

    /// True if the declaring type is `type_name` (exact match).
    pub fn is_type(&self, type_name: &str) -> bool {
        self.type_name == type_name
    }
}

impl fmt::Display for ObjectInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) {}", self.name, self.type_name, self.id)
    }
}

/// An open, loaded scene and its root nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    /// Asset path of the scene file.
    pub path: String,
    pub name: String,
}

/// A prefab opened for isolated editing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefabStage {
    /// Root of the editable prefab contents.
    pub root: ObjectId,
    /// Asset path of the prefab being edited.
    pub asset_path: String,
}

impl PrefabStage {
    /// File name of the prefab asset, without directories.
    pub fn file_name(&self) -> &str {
        self.asset_path
            .rsplit(|c| c == '/' || c == '\\')
            .next()
            .unwrap_or(&self.asset_path)
    }
}
