//! Unassigned object references.

use regex::RegexSet;

use scenecheck_types::{FieldAttribute, FieldDescriptor, FieldKind, FieldValue, ObjectInfo};

use crate::host::SceneHost;
use crate::rules::FieldValidator;
use crate::validator::{Check, ValidationContext};

/// Flags object-reference fields that are not assigned.
///
/// Fields tagged `OptionalReference` and fields of ignored types are never
/// checked. `OptionalReferenceInPrefab` fields are only checked on scene
/// objects. `RequiredIf(flag)` fields are only checked while `flag` is true.
pub struct NullReference {
    ignored: RegexSet,
}

impl NullReference {
    pub fn new(ignored: RegexSet) -> Self {
        Self { ignored }
    }
}

impl FieldValidator for NullReference {
    fn name(&self) -> &str {
        "null-reference"
    }

    fn can_validate_field(
        &self,
        type_name: &str,
        _path: &str,
        kind: FieldKind,
        attributes: &[FieldAttribute],
    ) -> bool {
        kind == FieldKind::ObjectReference
            && !FieldAttribute::contains(attributes, FieldAttribute::OPTIONAL_REFERENCE)
            && !self.ignored.is_match(type_name)
    }

    fn validate_field(
        &self,
        ctx: &mut ValidationContext,
        field: &FieldDescriptor,
        component: &ObjectInfo,
        attributes: &[FieldAttribute],
        host: &dyn SceneHost,
    ) -> anyhow::Result<()> {
        if FieldAttribute::contains(attributes, FieldAttribute::OPTIONAL_REFERENCE_IN_PREFAB) && !ctx.is_scene_object() {
            return Ok(());
        }

        if let Some(required_if) = FieldAttribute::find(attributes, FieldAttribute::REQUIRED_IF) {
            let condition = required_if.argument.as_deref().unwrap_or_default();
            match host.field(component.id, condition).map(|f| f.value) {
                Some(FieldValue::Bool(false)) => return Ok(()),
                Some(FieldValue::Bool(true)) => {}
                _ => tracing::warn!(
                    component = %component,
                    field = %field.path,
                    "RequiredIf names '{condition}', which is not a boolean field"
                ),
            }
        }

        ctx.assert_not_null(
            field.value.as_reference(),
            Check::new().message(|| format!("Property <b>{}</b> is <b><color=red>null</color></b>", field.path)),
        );
        Ok(())
    }
}
