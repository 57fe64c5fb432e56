//! Routing objects, fields, and path pairs through the applicable rules.

use std::any::Any;
use std::fmt::Display;
use std::panic::{AssertUnwindSafe, catch_unwind};

use scenecheck_types::{ObjectClass, ObjectInfo};

use super::traits::RuleEnv;
use crate::error::ValidationError;
use crate::validator::ValidationContext;

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Run one rule against one target, containing errors and panics.
///
/// Returns false if the rule failed; the failure has already been logged.
pub fn isolate(rule: &str, target: &dyn Display, check: impl FnOnce() -> anyhow::Result<()>) -> bool {
    let reason = match catch_unwind(AssertUnwindSafe(check)) {
        Ok(Ok(())) => return true,
        Ok(Err(e)) => format!("{e:#}"),
        Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
    };
    let error = ValidationError::RuleExecution {
        rule: rule.to_string(),
        target: target.to_string(),
        reason,
    };
    tracing::error!(rule, target = %target, "{error}");
    false
}

/// Run every matching object rule on `object`, then its field rules if it is a component.
pub fn validate_object(env: RuleEnv<'_>, ctx: &mut ValidationContext, object: &ObjectInfo) {
    for rule in env.registry.object_validators(object.class) {
        if !rule.can_validate(object) {
            continue;
        }
        isolate(rule.name(), object, || rule.validate(object, env, ctx));
    }
    if object.class == ObjectClass::Component {
        validate_fields(env, ctx, object);
    }
}

/// Run the cached applicable field rules on every serialized field of `component`.
pub fn validate_fields(env: RuleEnv<'_>, ctx: &mut ValidationContext, component: &ObjectInfo) {
    for field in env.host.fields(component.id) {
        let plan = match env.registry.field_plan(env.host, &component.type_name, &field) {
            Ok(plan) => plan,
            Err(e) => {
                tracing::warn!(component = %component, field = %field.path, "skipping field: {e}");
                continue;
            }
        };
        for rule in &plan.validators {
            isolate(rule.name(), component, || {
                rule.validate_field(ctx, &field, component, &plan.attributes, env.host)
            });
        }
    }
}

/// Run every scene rule.
pub fn validate_scene(env: RuleEnv<'_>, ctx: &mut ValidationContext) {
    for rule in env.registry.scene_validators() {
        isolate(rule.name(), &"scene", || rule.validate(env, ctx));
    }
}

/// Offer one (parent, child) path pair to every path rule.
pub fn validate_path(env: RuleEnv<'_>, ctx: &mut ValidationContext, parent: &str, child: &str) {
    for rule in env.registry.path_validators() {
        let pair = format!("{parent} -> {child}");
        isolate(rule.name(), &pair, || rule.validate_path(parent, child, ctx));
    }
}

#[cfg(test)]
mod tests {
    use scenecheck_types::{FieldAttribute, FieldDescriptor, FieldValue};

    use super::*;
    use crate::host::{MemoryScene, ObjectGraph, SceneHost};
    use crate::rules::{FieldValidator, ObjectValidator, RuleRegistry};
    use crate::validator::{Check, ContextOptions};

    struct Exploding;

    impl ObjectValidator for Exploding {
        fn name(&self) -> &str {
            "exploding"
        }

        fn target_class(&self) -> ObjectClass {
            ObjectClass::Component
        }

        fn can_validate(&self, object: &ObjectInfo) -> bool {
            object.name == "Bomb" || object.name == "Faulty"
        }

        fn validate(&self, object: &ObjectInfo, _: RuleEnv<'_>, _: &mut ValidationContext) -> anyhow::Result<()> {
            if object.name == "Bomb" {
                panic!("boom");
            }
            anyhow::bail!("faulty data")
        }
    }

    struct NameSet;

    impl ObjectValidator for NameSet {
        fn name(&self) -> &str {
            "name-set"
        }

        fn target_class(&self) -> ObjectClass {
            ObjectClass::Component
        }

        fn validate(&self, object: &ObjectInfo, _: RuleEnv<'_>, ctx: &mut ValidationContext) -> anyhow::Result<()> {
            ctx.assert_true(object.name.is_empty(), "name is empty");
            Ok(())
        }
    }

    struct NonZero;

    impl FieldValidator for NonZero {
        fn name(&self) -> &str {
            "non-zero"
        }

        fn validate_field(
            &self,
            ctx: &mut ValidationContext,
            field: &FieldDescriptor,
            _: &ObjectInfo,
            _: &[FieldAttribute],
            _: &dyn SceneHost,
        ) -> anyhow::Result<()> {
            ctx.assert_not_equal(FieldValue::Int(0), field.value.clone(), Check::labeled(field.path.as_str()));
            Ok(())
        }
    }

    #[test]
    fn isolate_contains_errors_and_panics() {
        assert!(isolate("ok", &"t", || Ok(())));
        assert!(!isolate("err", &"t", || anyhow::bail!("nope")));
        assert!(!isolate("panic", &"t", || panic!("boom")));
    }

    #[test]
    fn failing_rule_does_not_stop_other_objects() {
        let host = MemoryScene::new();
        host.add_scene("Main.unity");
        let node = host.add_root("Main.unity", "Root").expect("scene open");
        let components: Vec<_> = ["Game.Bomb", "Game.Faulty", "Game.Fine"]
            .into_iter()
            .filter_map(|t| host.add_component(node, t))
            .collect();

        let mut registry = RuleRegistry::new();
        registry.register_object(Exploding);
        registry.register_object(NameSet);
        let env = RuleEnv {
            host: &host,
            registry: &registry,
        };
        let mut ctx = ValidationContext::new(&host, ContextOptions::default()).expect("not simulating");
        for id in components {
            let info = host.object(id).expect("component exists");
            validate_object(env, &mut ctx, &info);
        }
        assert_eq!(ctx.issues().len(), 3);
    }

    #[test]
    fn unresolvable_field_is_skipped() {
        let host = MemoryScene::new();
        host.add_scene("Main.unity");
        let node = host.add_root("Main.unity", "Root").expect("scene open");
        let comp = host.add_component(node, "Game.Gun").expect("node exists");
        host.set_field(comp, "ammo", FieldValue::Int(0));
        host.set_field(comp, "clips", FieldValue::Int(0));
        host.make_unresolvable("Game.Gun", "ammo");

        let mut registry = RuleRegistry::new();
        registry.register_field(NonZero);
        let env = RuleEnv {
            host: &host,
            registry: &registry,
        };
        let mut ctx = ValidationContext::new(&host, ContextOptions::default()).expect("not simulating");
        let info = host.object(comp).expect("component exists");
        validate_fields(env, &mut ctx, &info);

        assert_eq!(ctx.issues().len(), 1);
        assert!(ctx.issues()[0].info_text().starts_with("clips"));
    }
}
