//! Prefab instances as dependency edges.

use std::collections::HashSet;

use scenecheck_types::{ObjectClass, ObjectInfo};

use crate::rules::{ObjectValidator, RuleEnv, dispatch};
use crate::validator::ValidationContext;

/// Offers (container, prefab) path pairs to the path rules for every prefab
/// instance root.
///
/// Instances of nested or variant prefabs also offer every prefab up the
/// correspondence chain, each path once.
pub struct PrefabUsage;

impl ObjectValidator for PrefabUsage {
    fn name(&self) -> &str {
        "prefab-usage"
    }

    fn target_class(&self) -> ObjectClass {
        ObjectClass::Node
    }

    fn validate(&self, object: &ObjectInfo, env: RuleEnv<'_>, ctx: &mut ValidationContext) -> anyhow::Result<()> {
        if env.registry.path_validators().is_empty() || !env.host.is_prefab_instance_root(object.id) {
            return Ok(());
        }
        let Some(parent_path) = env.host.container_path(object.id) else {
            return Ok(());
        };

        let mut seen = HashSet::new();
        let mut current = Some(object.id);
        while let Some(id) = current {
            if let Some(prefab_path) = env.host.prefab_asset_path(id) {
                if seen.insert(prefab_path.clone()) {
                    dispatch::validate_path(env, ctx, &parent_path, &prefab_path);
                }
            }
            current = env.host.correspondence_source(id).filter(|source| *source != id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex, PoisonError};

    use scenecheck_types::ScopeKind;

    use super::*;
    use crate::host::{MemoryScene, ObjectGraph, Parent};
    use crate::rules::{DependencyPathValidator, RuleRegistry};
    use crate::validator::ContextOptions;

    #[derive(Clone, Default)]
    struct Pairs(Arc<Mutex<Vec<(String, String)>>>);

    impl DependencyPathValidator for Pairs {
        fn name(&self) -> &str {
            "pairs"
        }

        fn validate_path(&self, parent: &str, child: &str, _: &mut ValidationContext) -> anyhow::Result<()> {
            self.0
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((parent.to_string(), child.to_string()));
            Ok(())
        }
    }

    #[test]
    fn nested_prefab_offers_each_path_once() {
        let host = MemoryScene::new();
        host.add_scene("Main.unity");
        let wheel = host.add_prefab("Wheel.prefab", "Wheel");
        host.add_child(wheel, "Hub").expect("wheel root");
        let car = host.add_prefab("Car.prefab", "Car");
        host.instantiate("Wheel.prefab", Parent::Node(car)).expect("wheel exists");
        let car_instance = host
            .instantiate("Car.prefab", Parent::Scene("Main.unity".into()))
            .expect("car exists");
        let wheel_instance = host.children(car_instance)[0];

        let pairs = Pairs::default();
        let mut registry = RuleRegistry::new();
        registry.register_path(pairs.clone());
        let env = RuleEnv {
            host: &host,
            registry: &registry,
        };
        let mut ctx = ValidationContext::new(&host, ContextOptions::default()).expect("not simulating");
        ctx.set_scope(ScopeKind::SceneObject, Some(car_instance), false);

        for node in [car_instance, wheel_instance, host.children(wheel_instance)[0]] {
            let info = host.object(node).expect("node exists");
            PrefabUsage.validate(&info, env, &mut ctx).expect("rule runs");
        }

        let seen = pairs.0.lock().unwrap_or_else(PoisonError::into_inner).clone();
        assert_eq!(
            seen,
            vec![
                ("Main.unity".to_string(), "Car.prefab".to_string()),
                ("Main.unity".to_string(), "Wheel.prefab".to_string()),
            ]
        );
    }
}
