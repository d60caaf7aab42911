//! Field resolution: the first provider, in registry order, that parsed a
//! field supplies its value.
//!
//! Resolution only reads the canonical record, so it works on whatever a run
//! left behind, including an aborted or cancelled one.

use super::providers::Registry;
use super::record::CanonicalRecord;
use super::types::{Field, FieldValue, ValueKind};
use serde::Serialize;

/// Point-in-time snapshot of one resolved field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolved<T> {
    pub resolved: bool,
    pub value: Option<T>,
    /// Name of the provider that supplied `value`.
    pub source: Option<String>,
    pub description: String,
}

impl<T> Resolved<T> {
    fn unresolved(description: impl Into<String>) -> Self {
        Self {
            resolved: false,
            value: None,
            source: None,
            description: description.into(),
        }
    }
}

/// Rust types a canonical field value can be read as.
pub trait FromFieldValue: Sized {
    const KIND: ValueKind;

    fn from_field_value(value: &FieldValue) -> Option<Self>;
}

impl FromFieldValue for String {
    const KIND: ValueKind = ValueKind::Text;

    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Text(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromFieldValue for f64 {
    const KIND: ValueKind = ValueKind::Float;

    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromFieldValue for i64 {
    const KIND: ValueKind = ValueKind::Integer;

    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Integer(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromFieldValue for bool {
    const KIND: ValueKind = ValueKind::Flag;

    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Flag(v) => Some(*v),
            _ => None,
        }
    }
}

pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

/// Resolve `field` as an untyped value. Rounding for coordinates is applied
/// here, never at parse time.
pub fn resolve_value(record: &CanonicalRecord, registry: &Registry, field: Field) -> Resolved<FieldValue> {
    for (position, provider) in registry.providers().iter().enumerate() {
        let Some(slot) = record.slot(position, field) else {
            continue;
        };
        if let Some(value) = &slot.value {
            let value = match (value, field.precision()) {
                (FieldValue::Float(v), Some(places)) => FieldValue::Float(round_to(*v, places)),
                _ => value.clone(),
            };
            return Resolved {
                resolved: true,
                value: Some(value),
                source: Some(provider.name.to_string()),
                description: field.description().to_string(),
            };
        }
    }
    Resolved::unresolved(field.description())
}

/// Resolve `field` as `T`. Asking for the wrong type yields an unresolved
/// result naming the field's actual kind.
pub fn resolve<T: FromFieldValue>(record: &CanonicalRecord, registry: &Registry, field: Field) -> Resolved<T> {
    if T::KIND != field.kind() {
        return Resolved::unresolved(format!(
            "field {} holds {} values, not {}",
            field,
            field.kind(),
            T::KIND
        ));
    }

    let found = resolve_value(record, registry, field);
    match found.value.as_ref().and_then(T::from_field_value) {
        Some(value) => Resolved {
            resolved: true,
            value: Some(value),
            source: found.source,
            description: found.description,
        },
        None => Resolved::unresolved(found.description),
    }
}
