use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    errors::{EavError, EavResult, SchemaError},
    store::EavStore,
    types::{AttrValue, EnumGroupId, EnumValueId},
};

/// Named closed set of choices referenced by ENUM attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumGroup {
    pub id: Option<EnumGroupId>,
    pub name: String,
}

impl EnumGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self { id: None, name: name.into() }
    }

    /// Persists the group. Group names are unique.
    pub fn save(&mut self, store: &dyn EavStore) -> EavResult<EnumGroupId> {
        if let Some(existing) = store.enum_group_by_name(&self.name)?
            && existing.id != self.id
        {
            return Err(SchemaError::DuplicateEnumGroup {
                name: self.name.clone(),
            }
            .into());
        }
        let id = store.save_enum_group(self)?;
        self.id = Some(id);
        Ok(id)
    }

    pub fn require_id(&self) -> EavResult<EnumGroupId> {
        self.id
            .ok_or_else(|| EavError::state(format!("enum group '{}' has not been saved", self.name)))
    }

    /// Adds `value` to this group, saving the value.
    pub fn add(&self, store: &dyn EavStore, value: &mut EnumValue) -> EavResult<EnumValueId> {
        value.group = Some(self.require_id()?);
        value.save(store)
    }

    pub fn members(&self, store: &dyn EavStore) -> EavResult<Vec<EnumValue>> {
        store.enum_values_in_group(self.require_id()?)
    }
}

impl fmt::Display for EnumGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// One choice. Values are unique across all groups and belong to at most one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumValue {
    pub id: Option<EnumValueId>,
    pub value: String,
    pub group: Option<EnumGroupId>,
}

impl EnumValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            id: None,
            value: value.into(),
            group: None,
        }
    }

    pub fn save(&mut self, store: &dyn EavStore) -> EavResult<EnumValueId> {
        if let Some(existing) = store.enum_value_by_value(&self.value)?
            && existing.id != self.id
        {
            return Err(SchemaError::DuplicateEnumValue {
                value: self.value.clone(),
            }
            .into());
        }
        let id = store.save_enum_value(self)?;
        self.id = Some(id);
        Ok(id)
    }

    /// Reference to this value for use as an attribute value. Unsaved values have none.
    pub fn reference(&self) -> EavResult<EnumValueId> {
        self.id
            .ok_or_else(|| EavError::state(format!("enum value '{}' has not been saved", self.value)))
    }

    pub fn to_attr_value(&self) -> EavResult<AttrValue> {
        self.reference().map(AttrValue::from)
    }
}

impl fmt::Display for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}
