//! The canonical record: one slot per (field, provider) pair.

use super::providers::Provider;
use super::types::{Field, FieldValue};
use std::collections::BTreeMap;

pub const NOT_QUERIED: &str = "provider was not queried";

/// Parse state of one field for one provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub value: Option<FieldValue>,
    /// Failure reason when unparsed; empty once parsed.
    pub description: String,
}

impl Slot {
    pub fn unparsed(description: impl Into<String>) -> Self {
        Self {
            value: None,
            description: description.into(),
        }
    }

    pub fn parsed(value: FieldValue) -> Self {
        Self {
            value: Some(value),
            description: String::new(),
        }
    }

    pub fn is_parsed(&self) -> bool {
        self.value.is_some()
    }
}

/// All field slots belonging to one provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSlots {
    slots: BTreeMap<Field, Slot>,
}

impl Default for ProviderSlots {
    fn default() -> Self {
        Self::unparsed(NOT_QUERIED)
    }
}

impl ProviderSlots {
    /// Every canonical field present and unparsed with `reason`.
    pub fn unparsed(reason: &str) -> Self {
        Self {
            slots: Field::ALL.iter().map(|f| (*f, Slot::unparsed(reason))).collect(),
        }
    }

    /// Fresh slots for `provider`; fields it does not map say so.
    pub fn for_provider(provider: &Provider, reason: &str) -> Self {
        let mut slots = Self::unparsed(reason);
        for field in Field::ALL {
            if !provider.supports(field) {
                slots.set(field, Slot::unparsed(format!("not provided by {}", provider.name)));
            }
        }
        slots
    }

    pub fn get(&self, field: Field) -> &Slot {
        // Every field is inserted on construction.
        &self.slots[&field]
    }

    pub fn set(&mut self, field: Field, slot: Slot) {
        self.slots.insert(field, slot);
    }

    pub fn parsed_count(&self) -> usize {
        self.slots.values().filter(|s| s.is_parsed()).count()
    }
}

/// Field slots of every provider for one query, indexed by registry position.
#[derive(Debug, Clone, Default)]
pub struct CanonicalRecord {
    providers: Vec<ProviderSlots>,
}

impl CanonicalRecord {
    pub fn new(provider_count: usize) -> Self {
        Self {
            providers: vec![ProviderSlots::default(); provider_count],
        }
    }

    /// Put every slot back to unparsed.
    pub fn clear(&mut self) {
        for slots in &mut self.providers {
            *slots = ProviderSlots::default();
        }
    }

    pub fn slot(&self, position: usize, field: Field) -> Option<&Slot> {
        self.providers.get(position).map(|s| s.get(field))
    }

    pub fn provider(&self, position: usize) -> Option<&ProviderSlots> {
        self.providers.get(position)
    }

    /// Replace one provider's slots. Providers own disjoint slot sets.
    pub fn store(&mut self, position: usize, slots: ProviderSlots) {
        if let Some(existing) = self.providers.get_mut(position) {
            *existing = slots;
        }
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::providers::IPWHOIS_APP;

    #[test]
    fn test_new_record_is_unparsed() {
        let record = CanonicalRecord::new(2);
        for pos in 0..2 {
            for field in Field::ALL {
                let slot = record.slot(pos, field).unwrap();
                assert!(!slot.is_parsed());
                assert_eq!(slot.description, NOT_QUERIED);
            }
        }
        assert!(record.slot(2, Field::City).is_none());
    }

    #[test]
    fn test_clear_resets_stored_slots() {
        let mut record = CanonicalRecord::new(1);
        let mut slots = ProviderSlots::default();
        slots.set(Field::City, Slot::parsed(FieldValue::Text("Oslo".into())));
        record.store(0, slots);
        assert!(record.slot(0, Field::City).unwrap().is_parsed());

        record.clear();
        assert!(!record.slot(0, Field::City).unwrap().is_parsed());
    }

    #[test]
    fn test_for_provider_marks_unmapped_fields() {
        let slots = ProviderSlots::for_provider(&IPWHOIS_APP, "pending");
        assert_eq!(slots.get(Field::City).description, "pending");
        assert_eq!(slots.get(Field::Hosting).description, "not provided by ipwhois.app");
        assert_eq!(slots.parsed_count(), 0);
    }

    #[test]
    fn test_store_out_of_range_is_ignored() {
        let mut record = CanonicalRecord::new(1);
        record.store(5, ProviderSlots::default());
        assert_eq!(record.len(), 1);
    }
}
