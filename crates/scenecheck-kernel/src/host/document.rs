//! JSON scene documents.
//!
//! A document describes open scenes, prefab assets, plain assets, dependency
//! edges, and declared field attributes, and loads into a [`MemoryScene`]:
//!
//! ```json
//! {
//!   "prefabs": [{ "path": "Assets/Prefabs/Enemy.prefab",
//!                 "root": { "name": "Enemy",
//!                           "components": [{ "type": "Game.Enemy", "fields": { "target": null } }] } }],
//!   "scenes": [{ "path": "Assets/Scenes/Main.unity",
//!                "roots": [{ "name": "Player" },
//!                          { "name": "Enemy A", "prefab": "Assets/Prefabs/Enemy.prefab",
//!                            "overrides": { "Game.Enemy/target": { "ref": "Player" } } }] }],
//!   "dependencies": { "Assets/Scenes/Main.unity": ["Assets/Prefabs/Enemy.prefab"] },
//!   "attributes": { "Game.Enemy": { "target": ["OptionalReferenceInPrefab"] } }
//! }
//! ```
//!
//! A `{"ref": ...}` names an asset path or a node name; bare `null` is an
//! unassigned reference. Prefabs must be declared before they are instantiated.
//! Instancing a prefab already records the dependency on it, so `dependencies`
//! only needs the edges the hierarchy does not show.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use scenecheck_types::{FieldAttribute, FieldValue, ObjectId};

use super::memory::{MemoryScene, Parent};
use crate::error::ValidationError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SceneDocument {
    #[serde(default)]
    pub scenes: Vec<SceneDoc>,
    #[serde(default)]
    pub prefabs: Vec<PrefabDoc>,
    #[serde(default)]
    pub assets: Vec<AssetDoc>,
    /// Asset path → direct dependency paths.
    #[serde(default)]
    pub dependencies: BTreeMap<String, Vec<String>>,
    /// Type name → field path → attributes (`Name` or `Name(arg)`).
    #[serde(default)]
    pub attributes: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    /// Prefab path to open for isolated editing.
    #[serde(default)]
    pub prefab_stage: Option<String>,
    /// Asset labels of the document, e.g. `ExcludeValidation`.
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub simulating: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SceneDoc {
    pub path: String,
    #[serde(default)]
    pub roots: Vec<NodeDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrefabDoc {
    pub path: String,
    pub root: NodeDoc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssetDoc {
    pub path: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeDoc {
    pub name: String,
    /// Instantiate this prefab instead of building the node from scratch.
    #[serde(default)]
    pub prefab: Option<String>,
    /// `"Type/field"` → value, applied to the instance root's components.
    #[serde(default)]
    pub overrides: BTreeMap<String, FieldDoc>,
    /// Validation-parent capability.
    #[serde(default)]
    pub skip_children: Option<bool>,
    #[serde(default)]
    pub components: Vec<ComponentDoc>,
    #[serde(default)]
    pub children: Vec<NodeDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentDoc {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldDoc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldDoc {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Ref {
        #[serde(rename = "ref")]
        target: String,
    },
}

/// A field assignment deferred until every node in the item exists.
struct Pending {
    component: ObjectId,
    path: String,
    value: FieldDoc,
}

struct Loader {
    host: MemoryScene,
    names: HashMap<String, ObjectId>,
    pending: Vec<Pending>,
}

impl Loader {
    fn defer(&mut self, component: ObjectId, fields: &BTreeMap<String, FieldDoc>) {
        self.pending.extend(fields.iter().map(|(path, value)| Pending {
            component,
            path: path.clone(),
            value: value.clone(),
        }));
    }

    fn attach_components(&mut self, node: ObjectId, doc: &NodeDoc) -> Result<(), ValidationError> {
        if let Some(skip) = doc.skip_children {
            self.host.set_validation_parent(node, skip);
        }
        for component in &doc.components {
            let id = self.host.add_component(node, &component.type_name).ok_or_else(|| {
                ValidationError::document(format!("cannot attach {} to '{}'", component.type_name, doc.name))
            })?;
            self.defer(id, &component.fields);
        }
        Ok(())
    }

    fn build_node(&mut self, doc: &NodeDoc, parent: Parent) -> Result<ObjectId, ValidationError> {
        let node = match &doc.prefab {
            Some(prefab) => {
                let node = self.host.instantiate(prefab, parent).ok_or_else(|| {
                    ValidationError::document(format!(
                        "node '{}' instantiates undeclared prefab '{}'",
                        doc.name, prefab
                    ))
                })?;
                for (key, value) in &doc.overrides {
                    let (type_name, path) = key.split_once('/').ok_or_else(|| {
                        ValidationError::document(format!("override '{key}' is not 'Type/field'"))
                    })?;
                    let component = self.host.component_of_type(node, type_name).ok_or_else(|| {
                        ValidationError::document(format!(
                            "override '{key}': instance '{}' has no {type_name}",
                            doc.name
                        ))
                    })?;
                    self.pending.push(Pending {
                        component,
                        path: path.to_string(),
                        value: value.clone(),
                    });
                }
                node
            }
            None => match parent {
                Parent::Scene(scene) => self.host.add_root(&scene, &doc.name),
                Parent::Node(parent) => self.host.add_child(parent, &doc.name),
            }
            .ok_or_else(|| ValidationError::document(format!("cannot attach node '{}'", doc.name)))?,
        };

        self.names.entry(doc.name.clone()).or_insert(node);
        self.attach_components(node, doc)?;
        for child in &doc.children {
            self.build_node(child, Parent::Node(node))?;
        }
        Ok(node)
    }

    fn field_value(&self, doc: &FieldDoc) -> Result<FieldValue, ValidationError> {
        Ok(match doc {
            FieldDoc::Null => FieldValue::Null,
            FieldDoc::Bool(b) => FieldValue::Bool(*b),
            FieldDoc::Int(i) => FieldValue::Int(*i),
            FieldDoc::Float(x) => FieldValue::Float(*x),
            FieldDoc::Text(s) => FieldValue::String(s.clone()),
            FieldDoc::Ref { target } => {
                let id = self
                    .host
                    .asset(target)
                    .or_else(|| self.names.get(target).copied())
                    .ok_or_else(|| {
                        ValidationError::document(format!("reference to unknown object '{target}'"))
                    })?;
                FieldValue::Reference(id)
            }
        })
    }

    /// Assign every deferred field now that the item's nodes exist.
    fn flush(&mut self) -> Result<(), ValidationError> {
        for pending in std::mem::take(&mut self.pending) {
            let value = self.field_value(&pending.value)?;
            self.host.set_field(pending.component, &pending.path, value);
        }
        Ok(())
    }
}

impl SceneDocument {
    pub fn from_json(text: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(text).map_err(|e| ValidationError::document(e.to_string()))
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

impl MemoryScene {
    /// Build a host from a document.
    pub fn from_document(doc: &SceneDocument) -> Result<Self, ValidationError> {
        let mut loader = Loader {
            host: MemoryScene::new(),
            names: HashMap::new(),
            pending: Vec::new(),
        };

        for asset in &doc.assets {
            loader.host.add_asset(asset.path.clone(), &asset.type_name);
        }

        for prefab in &doc.prefabs {
            if prefab.root.prefab.is_some() {
                return Err(ValidationError::document(format!(
                    "prefab '{}' root cannot itself be a prefab instance",
                    prefab.path
                )));
            }
            let root = loader.host.add_prefab(prefab.path.clone(), &prefab.root.name);
            loader.names.entry(prefab.root.name.clone()).or_insert(root);
            loader.attach_components(root, &prefab.root)?;
            for child in &prefab.root.children {
                loader.build_node(child, Parent::Node(root))?;
            }
            // Instances copy fields, so the prefab must be complete before later items use it.
            loader.flush()?;
        }

        for scene in &doc.scenes {
            loader.host.add_scene(scene.path.clone());
            for root in &scene.roots {
                loader.build_node(root, Parent::Scene(scene.path.clone()))?;
            }
            loader.flush()?;
        }

        for (from, edges) in &doc.dependencies {
            for to in edges {
                loader.host.add_dependency(from, to);
            }
        }

        for (type_name, fields) in &doc.attributes {
            for (path, attributes) in fields {
                for attribute in attributes {
                    loader
                        .host
                        .declare_attribute(type_name, path, FieldAttribute::parse(attribute));
                }
            }
        }

        if let Some(stage) = &doc.prefab_stage {
            loader.host.open_prefab_stage(stage).ok_or_else(|| {
                ValidationError::document(format!("prefab stage '{stage}' is not a declared prefab"))
            })?;
        }
        loader.host.set_simulating(doc.simulating);

        Ok(loader.host)
    }

    /// Parse and load a JSON document.
    pub fn from_json(text: &str) -> Result<Self, ValidationError> {
        Self::from_document(&SceneDocument::from_json(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Capabilities, FieldReflection, ObjectGraph};

    const DOC: &str = r#"{
        "assets": [{ "path": "Assets/Materials/Red.mat", "type": "Material" }],
        "prefabs": [{
            "path": "Assets/Prefabs/Enemy.prefab",
            "root": {
                "name": "Enemy",
                "components": [{ "type": "Game.Enemy", "fields": { "target": null, "skin": { "ref": "Assets/Materials/Red.mat" } } }]
            }
        }],
        "scenes": [{
            "path": "Assets/Scenes/Main.unity",
            "roots": [
                { "name": "Player", "skip_children": true,
                  "components": [{ "type": "Game.Player", "fields": { "speed": 2.5, "lives": 3, "tag": "hero", "god": false } }] },
                { "name": "Enemy A", "prefab": "Assets/Prefabs/Enemy.prefab",
                  "overrides": { "Game.Enemy/target": { "ref": "Player" } } }
            ]
        }],
        "dependencies": { "Assets/Scenes/Main.unity": ["Assets/Prefabs/Enemy.prefab"] },
        "attributes": { "Game.Enemy": { "target": ["OptionalReferenceInPrefab", "RequiredIf(armed)"] } }
    }"#;

    #[test]
    fn test_load_document() {
        let host = MemoryScene::from_json(DOC).expect("valid document");

        let roots = host.root_nodes("Assets/Scenes/Main.unity");
        assert_eq!(roots.len(), 2);
        let player = roots[0];
        let enemy = roots[1];
        assert_eq!(host.validation_parent(player), Some(true));
        assert!(host.is_prefab_instance_root(enemy));

        let player_comp = host.component_of_type(player, "Game.Player").expect("player component");
        assert_eq!(host.field_value(player_comp, "speed"), Some(FieldValue::Float(2.5)));
        assert_eq!(host.field_value(player_comp, "lives"), Some(FieldValue::Int(3)));
        assert_eq!(host.field_value(player_comp, "tag"), Some(FieldValue::String("hero".into())));
        assert_eq!(host.field_value(player_comp, "god"), Some(FieldValue::Bool(false)));

        let enemy_comp = host.component_of_type(enemy, "Game.Enemy").expect("instance component");
        assert_eq!(host.field_value(enemy_comp, "target"), Some(FieldValue::Reference(player)));
        let material = host.asset("Assets/Materials/Red.mat").expect("material asset");
        assert_eq!(host.field_value(enemy_comp, "skin"), Some(FieldValue::Reference(material)));

        let template = host.correspondence_source(enemy_comp).expect("linked to prefab");
        assert_eq!(host.field_value(template, "target"), Some(FieldValue::Null));

        let attrs = host.field_attributes("Game.Enemy", "target").expect("resolvable");
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[1].argument.as_deref(), Some("armed"));
    }

    #[test]
    fn test_unknown_reference_is_an_error() {
        let doc = r#"{ "scenes": [{ "path": "a.unity", "roots": [
            { "name": "A", "components": [{ "type": "T", "fields": { "x": { "ref": "Nope" } } }] }
        ] }] }"#;
        let err = MemoryScene::from_json(doc).expect_err("dangling ref");
        assert!(err.to_string().contains("Nope"));
    }

    #[test]
    fn test_undeclared_prefab_is_an_error() {
        let doc = r#"{ "scenes": [{ "path": "a.unity", "roots": [{ "name": "A", "prefab": "Missing.prefab" }] }] }"#;
        assert!(matches!(MemoryScene::from_json(doc), Err(ValidationError::Document { .. })));
    }

    #[test]
    fn test_labels_are_optional() {
        let doc = SceneDocument::from_json(r#"{ "labels": ["ExcludeValidation"] }"#).expect("valid");
        assert!(doc.has_label("ExcludeValidation"));
        assert!(!doc.has_label("Exclude"));
        assert!(SceneDocument::from_json("{}").expect("valid").labels.is_empty());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(SceneDocument::from_json(r#"{ "scenez": [] }"#).is_err());
    }

    #[test]
    fn test_prefab_stage_and_simulating() {
        let doc = r#"{
            "prefabs": [{ "path": "Assets/P.prefab", "root": { "name": "P" } }],
            "prefab_stage": "Assets/P.prefab",
            "simulating": true
        }"#;
        let host = MemoryScene::from_json(doc).expect("valid");
        let stage = host.prefab_stage().expect("stage open");
        assert_eq!(stage.asset_path, "Assets/P.prefab");
        assert!(crate::host::HostState::is_simulating(&host));
    }
}
