//! In-memory scene host.
//!
//! Used for tests and by the CLI. Holds scenes, prefab assets, plain assets,
//! dependency edges, and component fields, and records what auto-fixes dirty.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use scenecheck_types::{
    ContainerInfo, FieldAttribute, FieldDescriptor, FieldValue, ObjectClass, ObjectId, ObjectInfo,
    PrefabStage,
};

use super::traits::{
    AssetPersistence, Capabilities, DependencyProvider, FieldReflection, HostState, ObjectGraph,
    SelfValidating,
};
use crate::error::ValidationError;

/// Where a new node is attached.
#[derive(Debug, Clone)]
pub enum Parent {
    /// As a root of the scene at this path.
    Scene(String),
    /// As the last child of this node.
    Node(ObjectId),
}

struct Object {
    info: ObjectInfo,
    parent: Option<ObjectId>,
    children: Vec<ObjectId>,
    components: Vec<ObjectId>,
    fields: Vec<FieldDescriptor>,
    source: Option<ObjectId>,
    /// Scene path, prefab asset path, or the asset's own path.
    container: Option<String>,
    /// Prefab path if this node is a prefab instance root.
    instance_of: Option<String>,
    validation_parent: Option<bool>,
    self_validator: Option<Arc<dyn SelfValidating>>,
}

impl Object {
    fn new(info: ObjectInfo, container: Option<String>) -> Self {
        Self {
            info,
            parent: None,
            children: Vec::new(),
            components: Vec::new(),
            fields: Vec::new(),
            source: None,
            container,
            instance_of: None,
            validation_parent: None,
            self_validator: None,
        }
    }
}

struct Scene {
    info: ContainerInfo,
    roots: Vec<ObjectId>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    objects: HashMap<ObjectId, Object>,
    scenes: Vec<Scene>,
    assets: HashMap<String, ObjectId>,
    dependencies: HashMap<String, Vec<String>>,
    attributes: HashMap<(String, String), Vec<FieldAttribute>>,
    unresolvable: HashSet<(String, String)>,
    prefab_stage: Option<PrefabStage>,
    dirty: HashSet<ObjectId>,
    saved: Vec<ObjectId>,
    scenes_dirty: bool,
}

impl Inner {
    fn allocate(&mut self) -> ObjectId {
        self.next_id += 1;
        ObjectId(self.next_id)
    }

    fn insert(&mut self, class: ObjectClass, type_name: &str, name: &str, container: Option<String>) -> ObjectId {
        let id = self.allocate();
        let info = ObjectInfo::new(id, class, type_name, name);
        self.objects.insert(id, Object::new(info, container));
        id
    }

    fn add_dependency(&mut self, from: &str, to: &str) {
        let edges = self.dependencies.entry(from.to_string()).or_default();
        if !edges.iter().any(|e| e == to) {
            edges.push(to.to_string());
        }
    }

    fn attach_node(&mut self, parent: &Parent, name: &str) -> Option<ObjectId> {
        match parent {
            Parent::Scene(path) => {
                let index = self.scenes.iter().position(|s| &s.info.path == path)?;
                let id = self.insert(ObjectClass::Node, NODE_TYPE, name, Some(path.clone()));
                self.scenes[index].roots.push(id);
                Some(id)
            }
            Parent::Node(parent_id) => {
                let container = self.objects.get(parent_id)?.container.clone();
                let id = self.insert(ObjectClass::Node, NODE_TYPE, name, container);
                if let Some(obj) = self.objects.get_mut(&id) {
                    obj.parent = Some(*parent_id);
                }
                if let Some(parent) = self.objects.get_mut(parent_id) {
                    parent.children.push(id);
                }
                Some(id)
            }
        }
    }

    /// Deep-copy the hierarchy under `template` beneath `parent`, linking every
    /// copy back to its template.
    fn copy_hierarchy(&mut self, template: ObjectId, parent: &Parent) -> Option<ObjectId> {
        let (name, components, children, instance_of, validation_parent, self_validator) = {
            let t = self.objects.get(&template)?;
            (
                t.info.name.clone(),
                t.components.clone(),
                t.children.clone(),
                t.instance_of.clone(),
                t.validation_parent,
                t.self_validator.clone(),
            )
        };
        let node = self.attach_node(parent, &name)?;
        if let Some(obj) = self.objects.get_mut(&node) {
            obj.source = Some(template);
            obj.instance_of = instance_of;
            obj.validation_parent = validation_parent;
            obj.self_validator = self_validator;
        }
        for component in components {
            let Some((type_name, comp_name, fields, validator)) = self.objects.get(&component).map(|c| {
                (
                    c.info.type_name.clone(),
                    c.info.name.clone(),
                    c.fields.clone(),
                    c.self_validator.clone(),
                )
            }) else {
                continue;
            };
            let container = self.objects.get(&node).and_then(|n| n.container.clone());
            let copy = self.insert(ObjectClass::Component, &type_name, &comp_name, container);
            if let Some(obj) = self.objects.get_mut(&copy) {
                obj.parent = Some(node);
                obj.fields = fields;
                obj.source = Some(component);
                obj.self_validator = validator;
            }
            if let Some(obj) = self.objects.get_mut(&node) {
                obj.components.push(copy);
            }
        }
        for child in children {
            self.copy_hierarchy(child, &Parent::Node(node));
        }
        Some(node)
    }
}

/// Type name reported for hierarchy nodes.
pub const NODE_TYPE: &str = "GameObject";

/// In-memory [`SceneHost`](super::SceneHost).
///
/// Thread-safe via an internal `RwLock`; every mutator takes `&self`, so a
/// shared `Arc<MemoryScene>` can be captured by auto-fix closures.
pub struct MemoryScene {
    inner: RwLock<Inner>,
    simulating: AtomicBool,
}

impl Default for MemoryScene {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryScene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.read();
        f.debug_struct("MemoryScene")
            .field("objects", &inner.objects.len())
            .field("scenes", &inner.scenes.len())
            .field("assets", &inner.assets.len())
            .finish()
    }
}

impl MemoryScene {
    /// Create an empty host with no open scenes.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            simulating: AtomicBool::new(false),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open an empty scene at `path`.
    pub fn add_scene(&self, path: impl Into<String>) {
        let path = path.into();
        let name = file_stem(&path).to_string();
        let mut inner = self.write();
        if inner.scenes.iter().any(|s| s.info.path == path) {
            return;
        }
        inner.scenes.push(Scene {
            info: ContainerInfo { path, name },
            roots: Vec::new(),
        });
    }

    /// Add a scene root node. Returns `None` if the scene is not open.
    pub fn add_root(&self, scene: &str, name: &str) -> Option<ObjectId> {
        self.write().attach_node(&Parent::Scene(scene.to_string()), name)
    }

    /// Add a child node. Returns `None` if the parent does not exist.
    pub fn add_child(&self, parent: ObjectId, name: &str) -> Option<ObjectId> {
        self.write().attach_node(&Parent::Node(parent), name)
    }

    /// Register a prefab asset at `path` and return its root node.
    pub fn add_prefab(&self, path: impl Into<String>, root_name: &str) -> ObjectId {
        let path = path.into();
        let mut inner = self.write();
        let id = inner.insert(ObjectClass::Node, NODE_TYPE, root_name, Some(path.clone()));
        inner.assets.insert(path, id);
        id
    }

    /// Register a plain (non-hierarchical) asset.
    pub fn add_asset(&self, path: impl Into<String>, type_name: &str) -> ObjectId {
        let path = path.into();
        let name = file_stem(&path).to_string();
        let mut inner = self.write();
        let id = inner.insert(ObjectClass::Asset, type_name, &name, Some(path.clone()));
        inner.assets.insert(path, id);
        id
    }

    /// Attach a component of `type_name` to `node`.
    pub fn add_component(&self, node: ObjectId, type_name: &str) -> Option<ObjectId> {
        let mut inner = self.write();
        let container = inner.objects.get(&node)?.container.clone();
        let short = type_name.rsplit('.').next().unwrap_or(type_name);
        let id = inner.insert(ObjectClass::Component, type_name, short, container);
        if let Some(obj) = inner.objects.get_mut(&id) {
            obj.parent = Some(node);
        }
        if let Some(obj) = inner.objects.get_mut(&node) {
            obj.components.push(id);
        }
        Some(id)
    }

    /// Set (or add) a serialized field on a component.
    pub fn set_field(&self, component: ObjectId, path: &str, value: FieldValue) {
        let mut inner = self.write();
        let Some(obj) = inner.objects.get_mut(&component) else {
            return;
        };
        match obj.fields.iter_mut().find(|f| f.path == path) {
            Some(field) => {
                field.kind = value.kind();
                field.value = value;
            }
            None => obj.fields.push(FieldDescriptor::new(path, value)),
        }
    }

    /// Current value of a field, if present.
    pub fn field_value(&self, component: ObjectId, path: &str) -> Option<FieldValue> {
        let inner = self.read();
        let obj = inner.objects.get(&component)?;
        obj.fields.iter().find(|f| f.path == path).map(|f| f.value.clone())
    }

    /// Declare an attribute on `path` of every component of `type_name`.
    pub fn declare_attribute(&self, type_name: &str, path: &str, attribute: FieldAttribute) {
        self.write()
            .attributes
            .entry((type_name.to_string(), path.to_string()))
            .or_default()
            .push(attribute);
    }

    /// Make attribute lookups for `type_name.path` fail.
    pub fn make_unresolvable(&self, type_name: &str, path: &str) {
        self.write()
            .unresolvable
            .insert((type_name.to_string(), path.to_string()));
    }

    /// Record a direct dependency edge `from → to`.
    pub fn add_dependency(&self, from: &str, to: &str) {
        self.write().add_dependency(from, to);
    }

    /// Give a node the validation-parent capability.
    pub fn set_validation_parent(&self, node: ObjectId, skip_children: bool) {
        if let Some(obj) = self.write().objects.get_mut(&node) {
            obj.validation_parent = Some(skip_children);
        }
    }

    /// Give an object its own validation logic.
    pub fn set_self_validator(&self, id: ObjectId, validator: Arc<dyn SelfValidating>) {
        if let Some(obj) = self.write().objects.get_mut(&id) {
            obj.self_validator = Some(validator);
        }
    }

    /// Instantiate the prefab at `prefab_path` under `parent`.
    ///
    /// Every copied node and component records its template as correspondence
    /// source, and the scene or prefab asset it lands in gains a dependency on
    /// `prefab_path`.
    pub fn instantiate(&self, prefab_path: &str, parent: Parent) -> Option<ObjectId> {
        let mut inner = self.write();
        let template = *inner.assets.get(prefab_path)?;
        let root = inner.copy_hierarchy(template, &parent)?;
        let container = match inner.objects.get_mut(&root) {
            Some(obj) => {
                obj.instance_of = Some(prefab_path.to_string());
                obj.container.clone()
            }
            None => None,
        };
        if let Some(container) = container.filter(|c| c != prefab_path) {
            inner.add_dependency(&container, prefab_path);
        }
        Some(root)
    }

    /// Open the prefab at `path` for isolated editing.
    pub fn open_prefab_stage(&self, path: &str) -> Option<PrefabStage> {
        let mut inner = self.write();
        let root = *inner.assets.get(path)?;
        let stage = PrefabStage {
            root,
            asset_path: path.to_string(),
        };
        inner.prefab_stage = Some(stage.clone());
        Some(stage)
    }

    pub fn close_prefab_stage(&self) {
        self.write().prefab_stage = None;
    }

    pub fn set_simulating(&self, simulating: bool) {
        self.simulating.store(simulating, Ordering::SeqCst);
    }

    /// First component of `type_name` on `node`.
    pub fn component_of_type(&self, node: ObjectId, type_name: &str) -> Option<ObjectId> {
        let inner = self.read();
        inner.objects.get(&node)?.components.iter().copied().find(|c| {
            inner
                .objects
                .get(c)
                .is_some_and(|o| o.info.type_name == type_name)
        })
    }

    pub fn asset(&self, path: &str) -> Option<ObjectId> {
        self.read().assets.get(path).copied()
    }

    pub fn is_dirty(&self, id: ObjectId) -> bool {
        self.read().dirty.contains(&id)
    }

    /// Objects saved after being dirtied, in save order.
    pub fn saved(&self) -> Vec<ObjectId> {
        self.read().saved.clone()
    }

    pub fn scenes_marked_dirty(&self) -> bool {
        self.read().scenes_dirty
    }
}

impl ObjectGraph for MemoryScene {
    fn containers(&self) -> Vec<ContainerInfo> {
        self.read().scenes.iter().map(|s| s.info.clone()).collect()
    }

    fn root_nodes(&self, container: &str) -> Vec<ObjectId> {
        self.read()
            .scenes
            .iter()
            .find(|s| s.info.path == container)
            .map(|s| s.roots.clone())
            .unwrap_or_default()
    }

    fn children(&self, node: ObjectId) -> Vec<ObjectId> {
        self.read()
            .objects
            .get(&node)
            .map(|o| o.children.clone())
            .unwrap_or_default()
    }

    fn parent(&self, node: ObjectId) -> Option<ObjectId> {
        let inner = self.read();
        let obj = inner.objects.get(&node)?;
        match obj.info.class {
            ObjectClass::Node => obj.parent,
            _ => None,
        }
    }

    fn components(&self, node: ObjectId) -> Vec<ObjectId> {
        self.read()
            .objects
            .get(&node)
            .map(|o| o.components.clone())
            .unwrap_or_default()
    }

    fn object(&self, id: ObjectId) -> Option<ObjectInfo> {
        self.read().objects.get(&id).map(|o| o.info.clone())
    }

    fn correspondence_source(&self, id: ObjectId) -> Option<ObjectId> {
        self.read().objects.get(&id).and_then(|o| o.source)
    }

    fn container_path(&self, id: ObjectId) -> Option<String> {
        self.read().objects.get(&id).and_then(|o| o.container.clone())
    }

    fn prefab_asset_path(&self, id: ObjectId) -> Option<String> {
        let inner = self.read();
        let mut current = inner.objects.get(&id)?;
        if current.info.class == ObjectClass::Component {
            current = inner.objects.get(&current.parent?)?;
        }
        loop {
            if let Some(path) = &current.instance_of {
                return Some(path.clone());
            }
            match current.parent.and_then(|p| inner.objects.get(&p)) {
                Some(parent) => current = parent,
                None => break,
            }
        }
        // Not inside an instance: the object may live in a prefab asset itself.
        current
            .container
            .as_ref()
            .filter(|path| inner.assets.contains_key(*path))
            .cloned()
    }

    fn is_prefab_instance_root(&self, node: ObjectId) -> bool {
        self.read()
            .objects
            .get(&node)
            .is_some_and(|o| o.instance_of.is_some())
    }

    fn prefab_stage(&self) -> Option<PrefabStage> {
        self.read().prefab_stage.clone()
    }
}

impl Capabilities for MemoryScene {
    fn validation_parent(&self, node: ObjectId) -> Option<bool> {
        self.read().objects.get(&node).and_then(|o| o.validation_parent)
    }

    fn self_validator(&self, id: ObjectId) -> Option<Arc<dyn SelfValidating>> {
        self.read()
            .objects
            .get(&id)
            .and_then(|o| o.self_validator.clone())
    }
}

impl DependencyProvider for MemoryScene {
    fn direct_dependencies(&self, path: &str) -> Vec<String> {
        self.read()
            .dependencies
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    fn load_asset(&self, path: &str) -> Option<ObjectId> {
        self.asset(path)
    }
}

impl FieldReflection for MemoryScene {
    fn fields(&self, component: ObjectId) -> Vec<FieldDescriptor> {
        self.read()
            .objects
            .get(&component)
            .map(|o| o.fields.clone())
            .unwrap_or_default()
    }

    fn field_attributes(
        &self,
        type_name: &str,
        path: &str,
    ) -> Result<Vec<FieldAttribute>, ValidationError> {
        let inner = self.read();
        let key = (type_name.to_string(), path.to_string());
        if inner.unresolvable.contains(&key) {
            return Err(ValidationError::PropertyResolution {
                type_name: type_name.to_string(),
                path: path.to_string(),
                reason: "no field or property with this path".to_string(),
            });
        }
        Ok(inner.attributes.get(&key).cloned().unwrap_or_default())
    }
}

impl AssetPersistence for MemoryScene {
    fn mark_dirty(&self, id: ObjectId) {
        self.write().dirty.insert(id);
    }

    fn save_if_dirty(&self, id: ObjectId) {
        let mut inner = self.write();
        if inner.dirty.remove(&id) {
            inner.saved.push(id);
        }
    }

    fn mark_all_scenes_dirty(&self) {
        self.write().scenes_dirty = true;
    }
}

impl HostState for MemoryScene {
    fn is_simulating(&self) -> bool {
        self.simulating.load(Ordering::SeqCst)
    }
}

/// File name without directories or extension.
pub(crate) fn file_stem(path: &str) -> &str {
    let name = path.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene_with_prefab() -> (MemoryScene, ObjectId, ObjectId) {
        let host = MemoryScene::new();
        host.add_scene("Assets/Scenes/Main.unity");
        let prefab = host.add_prefab("Assets/Prefabs/Enemy.prefab", "Enemy");
        let body = host.add_child(prefab, "Body").expect("prefab root exists");
        let comp = host.add_component(body, "Game.Health").expect("body exists");
        host.set_field(comp, "max", FieldValue::Int(10));
        (host, prefab, comp)
    }

    #[test]
    fn test_scene_roots_and_children() {
        let host = MemoryScene::new();
        host.add_scene("Assets/Scenes/Main.unity");
        let root = host.add_root("Assets/Scenes/Main.unity", "World").expect("scene open");
        let child = host.add_child(root, "Player").expect("root exists");

        assert_eq!(host.root_nodes("Assets/Scenes/Main.unity"), vec![root]);
        assert_eq!(host.children(root), vec![child]);
        assert_eq!(host.parent(child), Some(root));
        assert_eq!(host.containers()[0].name, "Main");
        assert!(host.add_root("Assets/Scenes/Missing.unity", "X").is_none());
    }

    #[test]
    fn test_instantiate_links_sources() {
        let (host, prefab, comp) = scene_with_prefab();
        let instance = host
            .instantiate("Assets/Prefabs/Enemy.prefab", Parent::Scene("Assets/Scenes/Main.unity".into()))
            .expect("prefab exists");

        assert!(host.is_prefab_instance_root(instance));
        assert_eq!(host.correspondence_source(instance), Some(prefab));
        let body = host.children(instance)[0];
        let copy = host.components(body)[0];
        assert_eq!(host.correspondence_source(copy), Some(comp));
        assert_eq!(host.field_value(copy, "max"), Some(FieldValue::Int(10)));
        assert_eq!(host.container_path(copy).as_deref(), Some("Assets/Scenes/Main.unity"));
        assert_eq!(host.prefab_asset_path(copy).as_deref(), Some("Assets/Prefabs/Enemy.prefab"));
    }

    #[test]
    fn test_instantiate_records_dependency() {
        let (host, _prefab, _comp) = scene_with_prefab();
        host.add_prefab("Assets/Prefabs/Wheel.prefab", "Wheel");
        let enemy = host.asset("Assets/Prefabs/Enemy.prefab").expect("enemy prefab");
        host.instantiate("Assets/Prefabs/Wheel.prefab", Parent::Node(enemy)).expect("wheel exists");
        for _ in 0..2 {
            host.instantiate("Assets/Prefabs/Enemy.prefab", Parent::Scene("Assets/Scenes/Main.unity".into()))
                .expect("prefab exists");
        }

        assert_eq!(
            host.direct_dependencies("Assets/Scenes/Main.unity"),
            vec!["Assets/Prefabs/Enemy.prefab".to_string()]
        );
        assert_eq!(
            host.direct_dependencies("Assets/Prefabs/Enemy.prefab"),
            vec!["Assets/Prefabs/Wheel.prefab".to_string()]
        );
        assert!(host.direct_dependencies("Assets/Prefabs/Wheel.prefab").is_empty());
    }

    #[test]
    fn test_prefab_asset_path_inside_asset() {
        let (host, _prefab, comp) = scene_with_prefab();
        assert_eq!(host.prefab_asset_path(comp).as_deref(), Some("Assets/Prefabs/Enemy.prefab"));
    }

    #[test]
    fn test_set_field_replaces() {
        let (host, _prefab, comp) = scene_with_prefab();
        host.set_field(comp, "max", FieldValue::Int(20));
        assert_eq!(host.fields(comp).len(), 1);
        assert_eq!(host.field_value(comp, "max"), Some(FieldValue::Int(20)));
    }

    #[test]
    fn test_attributes_and_failures() {
        let host = MemoryScene::new();
        host.declare_attribute("Game.Door", "key", FieldAttribute::marker("OptionalReference"));
        host.make_unresolvable("Game.Door", "broken");

        let attrs = host.field_attributes("Game.Door", "key").expect("resolvable");
        assert_eq!(attrs.len(), 1);
        assert!(host.field_attributes("Game.Door", "other").expect("resolvable").is_empty());
        assert!(matches!(
            host.field_attributes("Game.Door", "broken"),
            Err(ValidationError::PropertyResolution { .. })
        ));
    }

    #[test]
    fn test_dirty_then_save() {
        let (host, prefab, _comp) = scene_with_prefab();
        host.save_if_dirty(prefab);
        assert!(host.saved().is_empty());
        host.mark_dirty(prefab);
        assert!(host.is_dirty(prefab));
        host.save_if_dirty(prefab);
        assert!(!host.is_dirty(prefab));
        assert_eq!(host.saved(), vec![prefab]);
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("Assets/Scenes/Main.unity"), "Main");
        assert_eq!(file_stem("README"), "README");
        assert_eq!(file_stem("dir/.hidden"), ".hidden");
    }
}
