use std::collections::BTreeSet;
use std::fmt;

use super::Attribute;
use crate::{
    errors::{EavError, EavResult, ValidationError},
    store::{EavStore, ValueRow},
    types::{AttrValue, Datatype, EnumChoice, EnumValueId, ValueId},
};

/// Putting the **V** in EAV: one typed fact binding an [`Attribute`] to an entity.
///
/// The stored slot is selected by the attribute's datatype. Rows only carry
/// the sparse columns at the store boundary; here the value is an [`AttrValue`].
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub id: Option<ValueId>,
    pub entity_id: String,
    pub attribute: Attribute,
    value: Option<AttrValue>,
}

impl Value {
    pub fn new(entity_id: impl Into<String>, attribute: Attribute) -> Self {
        Self {
            id: None,
            entity_id: entity_id.into(),
            attribute,
            value: None,
        }
    }

    /// Reads the slot matching the attribute's datatype out of a stored row.
    pub fn from_row(row: ValueRow, attribute: Attribute) -> Self {
        let value = match attribute.datatype {
            Datatype::Text => row.value_text.map(AttrValue::Text),
            Datatype::Float => row.value_float.map(AttrValue::Float),
            Datatype::Int => row.value_int.map(AttrValue::Int),
            Datatype::Date => row.value_date.map(AttrValue::Date),
            Datatype::Bool => row.value_bool.map(AttrValue::Bool),
            Datatype::Enum if row.value_enum.is_empty() => None,
            Datatype::Enum => Some(AttrValue::Enum(EnumChoice::Many(row.value_enum))),
            Datatype::Object => row.value_object.map(AttrValue::Object),
        };
        Self {
            id: row.id,
            entity_id: row.entity_id,
            attribute,
            value,
        }
    }

    /// Writes the value into the slot matching the attribute's datatype.
    ///
    /// Values of another variant leave every slot empty; `clean` rejects them first.
    pub fn to_row(&self) -> EavResult<ValueRow> {
        let mut row = ValueRow::empty(self.entity_id.clone(), self.attribute.require_id()?);
        row.id = self.id;
        match (&self.value, self.attribute.datatype) {
            (Some(AttrValue::Text(text)), Datatype::Text) => row.value_text = Some(text.clone()),
            (Some(AttrValue::Float(number)), Datatype::Float) => row.value_float = Some(*number),
            (Some(AttrValue::Int(number)), Datatype::Int) => row.value_int = Some(*number),
            (Some(AttrValue::Date(date)), Datatype::Date) => row.value_date = Some(*date),
            (Some(AttrValue::Bool(flag)), Datatype::Bool) => row.value_bool = Some(*flag),
            (Some(AttrValue::Enum(choice)), Datatype::Enum) => row.value_enum = choice.ids(),
            (Some(AttrValue::Object(reference)), Datatype::Object) => row.value_object = Some(reference.clone()),
            _ => {}
        }
        Ok(row)
    }

    pub fn value(&self) -> Option<&AttrValue> {
        self.value.as_ref()
    }

    pub fn set_value(&mut self, value: Option<AttrValue>) {
        self.value = value;
    }

    pub fn is_m2m(&self) -> bool {
        self.attribute.datatype.is_m2m()
    }

    /// Full validation, including enum group membership.
    pub fn clean(&self, store: &dyn EavStore) -> EavResult<()> {
        match &self.value {
            Some(value) => self.attribute.validate_value(store, value),
            None => Err(ValidationError::single(
                &self.attribute.slug,
                "validation.missing",
                "has no value to store",
            )
            .into()),
        }
    }

    /// Validates and persists the row.
    ///
    /// Multi-valued rows are written first to obtain an id, then linked. If
    /// linking a freshly inserted row fails the row is removed again.
    pub fn save(&mut self, store: &dyn EavStore, value_type: &str) -> EavResult<ValueId> {
        self.clean(store)?;
        let row = self.to_row()?;
        let inserted = self.id.is_none();
        let id = store.save_value_row(value_type, &row)?;

        if self.is_m2m()
            && let Err(err) = store.set_enum_links(value_type, id, &row.value_enum)
        {
            if inserted {
                store.delete_value_row(value_type, &self.entity_id, row.attribute_id)?;
            }
            return Err(err);
        }

        self.id = Some(id);
        Ok(id)
    }

    /// Links of an m2m value. Unsaved rows have no identity to link against.
    pub fn links(&self) -> EavResult<BTreeSet<EnumValueId>> {
        if self.id.is_none() {
            return Err(EavError::state(format!(
                "value of '{}' must be saved before its choices can be used",
                self.attribute.slug
            )));
        }
        Ok(self
            .value
            .as_ref()
            .and_then(AttrValue::as_enum)
            .unwrap_or_default())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{} - {}: \"{value}\"", self.entity_id, self.attribute.name),
            None => write!(f, "{} - {}: (unset)", self.entity_id, self.attribute.name),
        }
    }
}
