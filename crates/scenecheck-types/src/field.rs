//! Serialized component fields and their declared attributes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ObjectId;

/// Storage kind of a serialized field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    ObjectReference,
    Boolean,
    Integer,
    Float,
    String,
    /// Nested struct or array container.
    Generic,
}

/// Current value of a serialized field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    /// Unassigned object reference.
    Null,
    Reference(ObjectId),
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Generic,
}

impl FieldValue {
    /// Storage kind implied by the value. `Null` is an unassigned reference.
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Null | FieldValue::Reference(_) => FieldKind::ObjectReference,
            FieldValue::Bool(_) => FieldKind::Boolean,
            FieldValue::Int(_) => FieldKind::Integer,
            FieldValue::Float(_) => FieldKind::Float,
            FieldValue::String(_) => FieldKind::String,
            FieldValue::Generic => FieldKind::Generic,
        }
    }

    /// The referenced object, if this is an assigned reference.
    pub fn as_reference(&self) -> Option<ObjectId> {
        match self {
            FieldValue::Reference(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "null"),
            FieldValue::Reference(id) => write!(f, "{id}"),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Int(i) => write!(f, "{i}"),
            FieldValue::Float(x) => write!(f, "{x}"),
            FieldValue::String(s) => write!(f, "{s:?}"),
            FieldValue::Generic => write!(f, "{{..}}"),
        }
    }
}

/// One serialized field of a component instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Dotted property path, e.g. `target` or `settings.spawnPoint`.
    pub path: String,
    pub kind: FieldKind,
    pub value: FieldValue,
}

impl FieldDescriptor {
    pub fn new(path: impl Into<String>, value: FieldValue) -> Self {
        Self {
            path: path.into(),
            kind: value.kind(),
            value,
        }
    }
}

/// A declared attribute on a field, e.g. `OptionalReference` or `RequiredIf(enabled)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldAttribute {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument: Option<String>,
}

impl FieldAttribute {
    /// Field may be null everywhere.
    pub const OPTIONAL_REFERENCE: &'static str = "OptionalReference";
    /// Field may be null in prefabs but must be set in scenes.
    pub const OPTIONAL_REFERENCE_IN_PREFAB: &'static str = "OptionalReferenceInPrefab";
    /// Field is required only while the named boolean field is true.
    pub const REQUIRED_IF: &'static str = "RequiredIf";

    pub fn marker(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            argument: None,
        }
    }

    pub fn with_argument(name: impl Into<String>, argument: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            argument: Some(argument.into()),
        }
    }

    /// Parse `Name` or `Name(argument)`.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        match text.split_once('(') {
            Some((name, rest)) if rest.ends_with(')') => {
                Self::with_argument(name.trim(), rest[..rest.len() - 1].trim())
            }
            _ => Self::marker(text),
        }
    }

    /// First attribute named `name` in `attributes`.
    pub fn find<'a>(attributes: &'a [FieldAttribute], name: &str) -> Option<&'a FieldAttribute> {
        attributes.iter().find(|a| a.name == name)
    }

    pub fn contains(attributes: &[FieldAttribute], name: &str) -> bool {
        Self::find(attributes, name).is_some()
    }
}

impl fmt::Display for FieldAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.argument {
            Some(arg) => write!(f, "{}({})", self.name, arg),
            None => write!(f, "{}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::marker("OptionalReference", "OptionalReference", None)]
    #[case::argument("RequiredIf(useTarget)", "RequiredIf", Some("useTarget"))]
    #[case::spaced(" RequiredIf( useTarget ) ", "RequiredIf", Some("useTarget"))]
    #[case::unclosed("RequiredIf(useTarget", "RequiredIf(useTarget", None)]
    fn parse_attribute(#[case] text: &str, #[case] name: &str, #[case] argument: Option<&str>) {
        let attr = FieldAttribute::parse(text);
        assert_eq!(attr.name, name);
        assert_eq!(attr.argument.as_deref(), argument);
    }

    #[test]
    fn null_is_a_reference_kind() {
        assert_eq!(FieldValue::Null.kind(), FieldKind::ObjectReference);
        assert_eq!(FieldDescriptor::new("target", FieldValue::Null).kind, FieldKind::ObjectReference);
        assert_eq!(FieldValue::Null.as_reference(), None);
        assert_eq!(FieldValue::Reference(ObjectId(4)).as_reference(), Some(ObjectId(4)));
    }

    #[test]
    fn attribute_lookup() {
        let attrs = vec![
            FieldAttribute::marker(FieldAttribute::OPTIONAL_REFERENCE_IN_PREFAB),
            FieldAttribute::with_argument(FieldAttribute::REQUIRED_IF, "armed"),
        ];
        assert!(FieldAttribute::contains(&attrs, FieldAttribute::OPTIONAL_REFERENCE_IN_PREFAB));
        assert!(!FieldAttribute::contains(&attrs, FieldAttribute::OPTIONAL_REFERENCE));
        let required = FieldAttribute::find(&attrs, FieldAttribute::REQUIRED_IF);
        assert_eq!(required.and_then(|a| a.argument.as_deref()), Some("armed"));
    }
}
