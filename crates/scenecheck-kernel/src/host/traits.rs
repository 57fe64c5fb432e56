//! Collaborator traits implemented by a host editor.

use std::sync::Arc;

use scenecheck_types::{
    ContainerInfo, FieldAttribute, FieldDescriptor, ObjectId, ObjectInfo, PrefabStage, SourceInfo,
};

use crate::error::ValidationError;
use crate::validator::{AssertionKind, ValidationContext};

/// Read access to the object graph.
pub trait ObjectGraph: Send + Sync {
    /// Open, loaded scenes.
    fn containers(&self) -> Vec<ContainerInfo>;

    /// Root nodes of the scene at `container` (its asset path).
    fn root_nodes(&self, container: &str) -> Vec<ObjectId>;

    /// Direct children of a node, including inactive ones, in hierarchy order.
    fn children(&self, node: ObjectId) -> Vec<ObjectId>;

    /// Parent node, or `None` for a root.
    fn parent(&self, node: ObjectId) -> Option<ObjectId>;

    /// Components attached to a node.
    fn components(&self, node: ObjectId) -> Vec<ObjectId>;

    /// Metadata for any object handle.
    fn object(&self, id: ObjectId) -> Option<ObjectInfo>;

    /// The template this object was instanced from (prefab instance → prefab asset).
    fn correspondence_source(&self, id: ObjectId) -> Option<ObjectId>;

    /// Asset path of the scene or prefab the object lives in.
    fn container_path(&self, id: ObjectId) -> Option<String>;

    /// Asset path of the prefab the nearest enclosing instance root was made from,
    /// or of the prefab asset the object lives in.
    fn prefab_asset_path(&self, id: ObjectId) -> Option<String>;

    /// True if the node is the root of a prefab instance.
    fn is_prefab_instance_root(&self, node: ObjectId) -> bool;

    /// The prefab currently opened for isolated editing, if any.
    fn prefab_stage(&self) -> Option<PrefabStage> {
        None
    }
}

/// Optional capabilities a node or component may carry.
pub trait Capabilities: Send + Sync {
    /// `Some(skip)` if the node carries the validation-parent capability.
    ///
    /// When the nearest capability-bearing ancestor (or the node itself)
    /// answers `Some(true)`, the node and its subtree are not validated.
    fn validation_parent(&self, node: ObjectId) -> Option<bool> {
        let _ = node;
        None
    }

    /// Validation logic carried by the object itself.
    fn self_validator(&self, id: ObjectId) -> Option<Arc<dyn SelfValidating>> {
        let _ = id;
        None
    }
}

/// An object that knows how to check itself.
pub trait SelfValidating: Send + Sync {
    fn validate(&self, ctx: &mut ValidationContext) -> anyhow::Result<()>;
}

/// The asset database: dependency edges and asset loading.
pub trait DependencyProvider: Send + Sync {
    /// Direct (one level) dependencies of the asset at `path`.
    fn direct_dependencies(&self, path: &str) -> Vec<String>;

    /// Load the asset at `path`. Prefabs load as their root node.
    fn load_asset(&self, path: &str) -> Option<ObjectId>;
}

/// Reflection over serialized component fields.
pub trait FieldReflection: Send + Sync {
    /// Serializable fields of a component instance, in declaration order.
    fn fields(&self, component: ObjectId) -> Vec<FieldDescriptor>;

    /// A single field by path.
    fn field(&self, component: ObjectId, path: &str) -> Option<FieldDescriptor> {
        self.fields(component).into_iter().find(|f| f.path == path)
    }

    /// Attributes declared on `path` of `type_name`.
    fn field_attributes(
        &self,
        type_name: &str,
        path: &str,
    ) -> Result<Vec<FieldAttribute>, ValidationError>;
}

/// Dirty-marking and saving after an auto-fix.
pub trait AssetPersistence: Send + Sync {
    fn mark_dirty(&self, id: ObjectId);
    fn save_if_dirty(&self, id: ObjectId);
    fn mark_all_scenes_dirty(&self);
}

/// Host lifecycle state.
pub trait HostState: Send + Sync {
    /// True while the host runs a simulation that can mutate the graph.
    fn is_simulating(&self) -> bool;
}

/// Everything a validation run needs from its host.
pub trait SceneHost:
    ObjectGraph + Capabilities + DependencyProvider + FieldReflection + AssetPersistence + HostState
{
}

impl<T> SceneHost for T where
    T: ObjectGraph
        + Capabilities
        + DependencyProvider
        + FieldReflection
        + AssetPersistence
        + HostState
        + ?Sized
{
}

/// Produces a readable identifier for an unlabeled assertion from its call site.
pub trait CallSiteResolver: Send + Sync {
    fn resolve(&self, site: &SourceInfo, assertion: AssertionKind) -> Result<String, ValidationError>;
}
