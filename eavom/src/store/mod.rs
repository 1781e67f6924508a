//! Persistence boundary.
//!
//! The core talks to storage only through [`EavStore`]. Values cross this
//! boundary as [`ValueRow`]s with one sparse column per datatype; everything
//! above it works with [`AttrValue`](crate::types::AttrValue).

mod memory;
mod redis_store;

pub use memory::MemStore;
pub use redis_store::RedisStore;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    errors::EavResult,
    models::{Attribute, EnumGroup, EnumValue},
    types::{AttributeId, EntityRef, EnumGroupId, EnumValueId, ValueId},
};

/// Storage-level value record: one row per (entity, attribute) with sparse typed columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueRow {
    pub id: Option<ValueId>,
    pub entity_id: String,
    pub attribute_id: AttributeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_float: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_int: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_bool: Option<bool>,
    /// Join-table links. Written separately, after the row has an id.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub value_enum: BTreeSet<EnumValueId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_object: Option<EntityRef>,
}

impl ValueRow {
    pub fn empty(entity_id: impl Into<String>, attribute_id: AttributeId) -> Self {
        Self {
            id: None,
            entity_id: entity_id.into(),
            attribute_id,
            value_text: None,
            value_float: None,
            value_int: None,
            value_date: None,
            value_bool: None,
            value_enum: BTreeSet::new(),
            value_object: None,
        }
    }
}

/// Abstract interface for EAV storage I/O.
///
/// Methods take `&self`; implementations use interior mutability since the
/// engine is single-threaded.
pub trait EavStore {
    // --- Enum groups and values ---

    /// Inserts (id `None`) or updates the group, returning its id.
    fn save_enum_group(&self, group: &EnumGroup) -> EavResult<EnumGroupId>;

    fn enum_group(&self, id: EnumGroupId) -> EavResult<Option<EnumGroup>>;

    fn enum_group_by_name(&self, name: &str) -> EavResult<Option<EnumGroup>>;

    fn enum_groups(&self) -> EavResult<Vec<EnumGroup>>;

    /// Inserts (id `None`) or updates the enum value, returning its id.
    fn save_enum_value(&self, value: &EnumValue) -> EavResult<EnumValueId>;

    fn enum_value(&self, id: EnumValueId) -> EavResult<Option<EnumValue>>;

    fn enum_value_by_value(&self, value: &str) -> EavResult<Option<EnumValue>>;

    /// Members of a group, ordered by id.
    fn enum_values_in_group(&self, group: EnumGroupId) -> EavResult<Vec<EnumValue>>;

    // --- Attributes ---

    /// Inserts (id `None`) or updates the attribute, returning its id.
    /// Attribute ids are unique across namespaces.
    fn save_attribute(&self, attribute: &Attribute) -> EavResult<AttributeId>;

    fn attribute(&self, namespace: &str, id: AttributeId) -> EavResult<Option<Attribute>>;

    /// Looks the attribute up by id alone, whatever namespace it is stored in.
    fn attribute_by_id(&self, id: AttributeId) -> EavResult<Option<Attribute>>;

    /// All attributes of a namespace, ordered by name.
    fn attributes(&self, namespace: &str) -> EavResult<Vec<Attribute>>;

    fn delete_attribute(&self, namespace: &str, id: AttributeId) -> EavResult<bool>;

    // --- Values ---

    /// All value rows of one entity, enum links included.
    fn value_rows(&self, value_type: &str, entity_id: &str) -> EavResult<Vec<ValueRow>>;

    fn value_row(&self, value_type: &str, entity_id: &str, attribute: AttributeId) -> EavResult<Option<ValueRow>>;

    /// All value rows of one attribute within a value type.
    fn values_for_attribute(&self, value_type: &str, attribute: AttributeId) -> EavResult<Vec<ValueRow>>;

    /// Whether any value row, in any value type, references the attribute.
    fn attribute_in_use(&self, attribute: AttributeId) -> EavResult<bool>;

    /// Upserts the scalar columns of the (entity, attribute) row and returns its id.
    /// Enum links are left untouched; see [`EavStore::set_enum_links`].
    fn save_value_row(&self, value_type: &str, row: &ValueRow) -> EavResult<ValueId>;

    /// Replaces the enum links of a stored row. Fails if the row does not exist.
    fn set_enum_links(&self, value_type: &str, value: ValueId, links: &BTreeSet<EnumValueId>) -> EavResult<()>;

    fn delete_value_row(&self, value_type: &str, entity_id: &str, attribute: AttributeId) -> EavResult<bool>;

    fn count_values(&self, value_type: &str) -> EavResult<usize>;
}
