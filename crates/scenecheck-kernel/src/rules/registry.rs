//! Rule registry: registered rules per capability, plus the field plan cache.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use scenecheck_types::{FieldAttribute, FieldDescriptor, ObjectClass};

use super::traits::{DependencyPathValidator, FieldValidator, ObjectValidator, SceneValidator};
use crate::error::ValidationError;
use crate::host::FieldReflection;

/// Attributes of one (type, field path) and the field rules that apply to it.
pub struct FieldPlan {
    pub attributes: Vec<FieldAttribute>,
    pub validators: Vec<Arc<dyn FieldValidator>>,
}

impl FieldPlan {
    pub fn validator_names(&self) -> Vec<&str> {
        self.validators.iter().map(|v| v.name()).collect()
    }
}

impl std::fmt::Debug for FieldPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldPlan")
            .field("attributes", &self.attributes)
            .field("validators", &self.validator_names())
            .finish()
    }
}

/// Type name → field path → plan.
type PlanTable = HashMap<String, HashMap<String, Arc<FieldPlan>>>;

/// Registry of rules, built once and shared by every run.
#[derive(Default)]
pub struct RuleRegistry {
    objects: [Vec<Arc<dyn ObjectValidator>>; 3],
    scenes: Vec<Arc<dyn SceneValidator>>,
    fields: Vec<Arc<dyn FieldValidator>>,
    paths: Vec<Arc<dyn DependencyPathValidator>>,
    plans: RwLock<PlanTable>,
}

impl RuleRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_object(&mut self, rule: impl ObjectValidator + 'static) {
        let rule: Arc<dyn ObjectValidator> = Arc::new(rule);
        self.objects[rule.target_class().index()].push(rule);
    }

    pub fn register_scene(&mut self, rule: impl SceneValidator + 'static) {
        self.scenes.push(Arc::new(rule));
    }

    /// Register a field rule. Cached plans are dropped.
    pub fn register_field(&mut self, rule: impl FieldValidator + 'static) {
        self.fields.push(Arc::new(rule));
        self.plans.get_mut().unwrap_or_else(PoisonError::into_inner).clear();
    }

    pub fn register_path(&mut self, rule: impl DependencyPathValidator + 'static) {
        self.paths.push(Arc::new(rule));
    }

    /// Object rules dispatched for `class`, in registration order.
    pub fn object_validators(&self, class: ObjectClass) -> &[Arc<dyn ObjectValidator>] {
        &self.objects[class.index()]
    }

    pub fn scene_validators(&self) -> &[Arc<dyn SceneValidator>] {
        &self.scenes
    }

    pub fn field_validators(&self) -> &[Arc<dyn FieldValidator>] {
        &self.fields
    }

    pub fn path_validators(&self) -> &[Arc<dyn DependencyPathValidator>] {
        &self.paths
    }

    /// The plan for `field` of `type_name`, computed on first request.
    ///
    /// Attribute lookup failures are returned and not cached.
    pub fn field_plan<R: FieldReflection + ?Sized>(
        &self,
        reflection: &R,
        type_name: &str,
        field: &FieldDescriptor,
    ) -> Result<Arc<FieldPlan>, ValidationError> {
        if let Some(plan) = self
            .plans
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(type_name)
            .and_then(|paths| paths.get(&field.path))
        {
            return Ok(Arc::clone(plan));
        }

        let attributes = reflection.field_attributes(type_name, &field.path)?;
        let validators = self
            .fields
            .iter()
            .filter(|v| v.can_validate_field(type_name, &field.path, field.kind, &attributes))
            .cloned()
            .collect();
        let plan = Arc::new(FieldPlan {
            attributes,
            validators,
        });

        let mut plans = self.plans.write().unwrap_or_else(PoisonError::into_inner);
        let plan = plans
            .entry(type_name.to_string())
            .or_default()
            .entry(field.path.clone())
            .or_insert(plan);
        Ok(Arc::clone(plan))
    }

    /// Number of cached field plans.
    pub fn cached_plans(&self) -> usize {
        self.plans
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(HashMap::len)
            .sum()
    }

    /// All rule names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .objects
            .iter()
            .flatten()
            .map(|r| r.name())
            .chain(self.scenes.iter().map(|r| r.name()))
            .chain(self.fields.iter().map(|r| r.name()))
            .chain(self.paths.iter().map(|r| r.name()))
            .collect();
        names.sort_unstable();
        names
    }

    /// Number of registered rules.
    pub fn len(&self) -> usize {
        self.objects.iter().map(Vec::len).sum::<usize>() + self.scenes.len() + self.fields.len() + self.paths.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("rules", &self.names())
            .field("cached_plans", &self.cached_plans())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use scenecheck_types::{FieldKind, FieldValue, ObjectInfo};

    use super::*;
    use crate::host::{MemoryScene, SceneHost};
    use crate::rules::RuleEnv;
    use crate::validator::ValidationContext;

    struct OnlyReferences {
        asked: Arc<AtomicUsize>,
    }

    impl FieldValidator for OnlyReferences {
        fn name(&self) -> &str {
            "only-references"
        }

        fn can_validate_field(&self, _: &str, _: &str, kind: FieldKind, _: &[FieldAttribute]) -> bool {
            self.asked.fetch_add(1, Ordering::SeqCst);
            kind == FieldKind::ObjectReference
        }

        fn validate_field(
            &self,
            _: &mut ValidationContext,
            _: &FieldDescriptor,
            _: &ObjectInfo,
            _: &[FieldAttribute],
            _: &dyn SceneHost,
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct NodeRule;

    impl ObjectValidator for NodeRule {
        fn name(&self) -> &str {
            "node-rule"
        }

        fn target_class(&self) -> ObjectClass {
            ObjectClass::Node
        }

        fn validate(&self, _: &ObjectInfo, _: RuleEnv<'_>, _: &mut ValidationContext) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn object_rules_grouped_by_class() {
        let mut registry = RuleRegistry::new();
        registry.register_object(NodeRule);
        assert_eq!(registry.object_validators(ObjectClass::Node).len(), 1);
        assert!(registry.object_validators(ObjectClass::Component).is_empty());
        assert_eq!(registry.names(), vec!["node-rule"]);
    }

    #[test]
    fn field_plan_computed_once_per_type_and_path() {
        let asked = Arc::new(AtomicUsize::new(0));
        let mut registry = RuleRegistry::new();
        registry.register_field(OnlyReferences { asked: asked.clone() });
        let host = MemoryScene::new();
        let reference = FieldDescriptor::new("target", FieldValue::Null);
        let number = FieldDescriptor::new("speed", FieldValue::Float(1.0));

        for _ in 0..5 {
            let plan = registry.field_plan(&host, "Game.Enemy", &reference).expect("resolvable");
            assert_eq!(plan.validator_names(), vec!["only-references"]);
        }
        let plan = registry.field_plan(&host, "Game.Enemy", &number).expect("resolvable");
        assert!(plan.validators.is_empty());

        assert_eq!(asked.load(Ordering::SeqCst), 2);
        assert_eq!(registry.cached_plans(), 2);
    }

    #[test]
    fn failed_attribute_lookup_is_not_cached() {
        let mut registry = RuleRegistry::new();
        registry.register_field(OnlyReferences {
            asked: Arc::new(AtomicUsize::new(0)),
        });
        let host = MemoryScene::new();
        host.make_unresolvable("Game.Enemy", "target");
        let field = FieldDescriptor::new("target", FieldValue::Null);

        assert!(registry.field_plan(&host, "Game.Enemy", &field).is_err());
        assert_eq!(registry.cached_plans(), 0);
    }

    #[test]
    fn registering_a_field_rule_drops_plans() {
        let mut registry = RuleRegistry::new();
        let host = MemoryScene::new();
        let field = FieldDescriptor::new("target", FieldValue::Null);
        registry.field_plan(&host, "Game.Enemy", &field).expect("resolvable");
        assert_eq!(registry.cached_plans(), 1);

        registry.register_field(OnlyReferences {
            asked: Arc::new(AtomicUsize::new(0)),
        });
        assert_eq!(registry.cached_plans(), 0);
        let plan = registry.field_plan(&host, "Game.Enemy", &field).expect("resolvable");
        assert_eq!(plan.validators.len(), 1);
    }
}
