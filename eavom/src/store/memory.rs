use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::{EavStore, ValueRow};
use crate::{
    errors::{EavError, EavResult},
    models::{Attribute, EnumGroup, EnumValue},
    types::{AttributeId, EnumGroupId, EnumValueId, ValueId},
};

type ValueTable = BTreeMap<(String, AttributeId), ValueRow>;

/// In-memory store.
///
/// Uses `RefCell` for interior mutability since the engine is single-threaded,
/// so the `EavStore` trait can take `&self` everywhere.
#[derive(Default)]
pub struct MemStore {
    sequence: Cell<u64>,
    enum_groups: RefCell<BTreeMap<EnumGroupId, EnumGroup>>,
    enum_values: RefCell<BTreeMap<EnumValueId, EnumValue>>,
    attributes: RefCell<BTreeMap<AttributeId, Attribute>>,
    values: RefCell<HashMap<String, ValueTable>>,
    #[cfg(test)]
    simulate_link_error: Cell<bool>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `set_enum_links` call fail.
    #[cfg(test)]
    pub(crate) fn set_simulate_link_error(&self, simulate: bool) {
        self.simulate_link_error.set(simulate);
    }

    fn next_id(&self) -> u64 {
        let next = self.sequence.get() + 1;
        self.sequence.set(next);
        next
    }
}

impl EavStore for MemStore {
    fn save_enum_group(&self, group: &EnumGroup) -> EavResult<EnumGroupId> {
        let id = group.id.unwrap_or_else(|| EnumGroupId(self.next_id()));
        let mut stored = group.clone();
        stored.id = Some(id);
        self.enum_groups.borrow_mut().insert(id, stored);
        Ok(id)
    }

    fn enum_group(&self, id: EnumGroupId) -> EavResult<Option<EnumGroup>> {
        Ok(self.enum_groups.borrow().get(&id).cloned())
    }

    fn enum_group_by_name(&self, name: &str) -> EavResult<Option<EnumGroup>> {
        Ok(self
            .enum_groups
            .borrow()
            .values()
            .find(|group| group.name == name)
            .cloned())
    }

    fn enum_groups(&self) -> EavResult<Vec<EnumGroup>> {
        Ok(self.enum_groups.borrow().values().cloned().collect())
    }

    fn save_enum_value(&self, value: &EnumValue) -> EavResult<EnumValueId> {
        let id = value.id.unwrap_or_else(|| EnumValueId(self.next_id()));
        let mut stored = value.clone();
        stored.id = Some(id);
        self.enum_values.borrow_mut().insert(id, stored);
        Ok(id)
    }

    fn enum_value(&self, id: EnumValueId) -> EavResult<Option<EnumValue>> {
        Ok(self.enum_values.borrow().get(&id).cloned())
    }

    fn enum_value_by_value(&self, value: &str) -> EavResult<Option<EnumValue>> {
        Ok(self
            .enum_values
            .borrow()
            .values()
            .find(|candidate| candidate.value == value)
            .cloned())
    }

    fn enum_values_in_group(&self, group: EnumGroupId) -> EavResult<Vec<EnumValue>> {
        Ok(self
            .enum_values
            .borrow()
            .values()
            .filter(|value| value.group == Some(group))
            .cloned()
            .collect())
    }

    fn save_attribute(&self, attribute: &Attribute) -> EavResult<AttributeId> {
        let id = attribute.id.unwrap_or_else(|| AttributeId(self.next_id()));
        let mut stored = attribute.clone();
        stored.id = Some(id);
        self.attributes.borrow_mut().insert(id, stored);
        Ok(id)
    }

    fn attribute(&self, namespace: &str, id: AttributeId) -> EavResult<Option<Attribute>> {
        Ok(self
            .attributes
            .borrow()
            .get(&id)
            .filter(|attribute| attribute.namespace == namespace)
            .cloned())
    }

    fn attribute_by_id(&self, id: AttributeId) -> EavResult<Option<Attribute>> {
        Ok(self.attributes.borrow().get(&id).cloned())
    }

    fn attributes(&self, namespace: &str) -> EavResult<Vec<Attribute>> {
        let mut matching: Vec<Attribute> = self
            .attributes
            .borrow()
            .values()
            .filter(|attribute| attribute.namespace == namespace)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(matching)
    }

    fn delete_attribute(&self, namespace: &str, id: AttributeId) -> EavResult<bool> {
        let mut attributes = self.attributes.borrow_mut();
        match attributes.get(&id) {
            Some(attribute) if attribute.namespace == namespace => {
                attributes.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn value_rows(&self, value_type: &str, entity_id: &str) -> EavResult<Vec<ValueRow>> {
        Ok(self
            .values
            .borrow()
            .get(value_type)
            .map(|table| {
                table
                    .values()
                    .filter(|row| row.entity_id == entity_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn value_row(&self, value_type: &str, entity_id: &str, attribute: AttributeId) -> EavResult<Option<ValueRow>> {
        Ok(self
            .values
            .borrow()
            .get(value_type)
            .and_then(|table| table.get(&(entity_id.to_string(), attribute)))
            .cloned())
    }

    fn values_for_attribute(&self, value_type: &str, attribute: AttributeId) -> EavResult<Vec<ValueRow>> {
        Ok(self
            .values
            .borrow()
            .get(value_type)
            .map(|table| {
                table
                    .values()
                    .filter(|row| row.attribute_id == attribute)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn attribute_in_use(&self, attribute: AttributeId) -> EavResult<bool> {
        Ok(self
            .values
            .borrow()
            .values()
            .any(|table| table.values().any(|row| row.attribute_id == attribute)))
    }

    fn save_value_row(&self, value_type: &str, row: &ValueRow) -> EavResult<ValueId> {
        let key = (row.entity_id.clone(), row.attribute_id);
        let existing = self
            .values
            .borrow()
            .get(value_type)
            .and_then(|table| table.get(&key))
            .map(|stored| (stored.id, stored.value_enum.clone()));

        let (id, links) = match existing {
            Some((Some(id), links)) => (id, links),
            _ => (ValueId(self.next_id()), BTreeSet::new()),
        };

        let mut stored = row.clone();
        stored.id = Some(id);
        stored.value_enum = links;
        self.values
            .borrow_mut()
            .entry(value_type.to_string())
            .or_default()
            .insert(key, stored);
        Ok(id)
    }

    fn set_enum_links(&self, value_type: &str, value: ValueId, links: &BTreeSet<EnumValueId>) -> EavResult<()> {
        #[cfg(test)]
        if self.simulate_link_error.get() {
            return Err(EavError::Other {
                message: "simulated enum link failure".into(),
            });
        }
        let mut values = self.values.borrow_mut();
        let row = values
            .get_mut(value_type)
            .and_then(|table| table.values_mut().find(|row| row.id == Some(value)))
            .ok_or_else(|| EavError::not_found("value", value))?;
        row.value_enum = links.clone();
        Ok(())
    }

    fn delete_value_row(&self, value_type: &str, entity_id: &str, attribute: AttributeId) -> EavResult<bool> {
        Ok(self
            .values
            .borrow_mut()
            .get_mut(value_type)
            .and_then(|table| table.remove(&(entity_id.to_string(), attribute)))
            .is_some())
    }

    fn count_values(&self, value_type: &str) -> EavResult<usize> {
        Ok(self.values.borrow().get(value_type).map(BTreeMap::len).unwrap_or(0))
    }
}
