use crate::types::{AttributeId, EnumGroupId, EnumValueId, ValueId};

/// Key-construction helpers for the Redis layout.
///
/// Definitions live under `prefix:attribute:*` / `prefix:enum_group:*` /
/// `prefix:enum_value:*`; value rows live under `prefix:values:<value_type>:*`
/// so each value type behaves like its own table.
#[derive(Debug, Clone)]
pub struct KeyContext<'a> {
    pub prefix: &'a str,
}

impl<'a> KeyContext<'a> {
    pub fn new(prefix: &'a str) -> Self {
        Self { prefix }
    }

    /// Counter used to allocate ids; one shared sequence for every record kind.
    pub fn sequence(&self) -> String {
        format!("{}:seq", self.prefix)
    }

    pub fn enum_group(&self, id: EnumGroupId) -> String {
        format!("{}:enum_group:{}", self.prefix, id)
    }

    pub fn enum_groups(&self) -> String {
        format!("{}:enum_groups", self.prefix)
    }

    pub fn enum_group_members(&self, id: EnumGroupId) -> String {
        format!("{}:enum_group:{}:members", self.prefix, id)
    }

    pub fn enum_value(&self, id: EnumValueId) -> String {
        format!("{}:enum_value:{}", self.prefix, id)
    }

    pub fn enum_values(&self) -> String {
        format!("{}:enum_values", self.prefix)
    }

    pub fn attribute(&self, id: AttributeId) -> String {
        format!("{}:attribute:{}", self.prefix, id)
    }

    /// Set of attribute ids belonging to one attribute namespace.
    pub fn attributes(&self, namespace: &str) -> String {
        format!("{}:attributes:{}", self.prefix, namespace)
    }

    /// Set of every value type that has ever stored a row.
    pub fn value_types(&self) -> String {
        format!("{}:value_types", self.prefix)
    }

    /// Hash holding the sparse columns of one value row.
    pub fn value(&self, value_type: &str, id: ValueId) -> String {
        format!("{}:values:{}:{}", self.prefix, value_type, id)
    }

    /// Join-table set of enum value ids linked to one value row.
    pub fn value_enum(&self, value_type: &str, id: ValueId) -> String {
        format!("{}:values:{}:{}:enum", self.prefix, value_type, id)
    }

    /// Hash mapping `entity_id|attribute_id` to the row id.
    pub fn value_lookup(&self, value_type: &str) -> String {
        format!("{}:values:{}:lookup", self.prefix, value_type)
    }

    pub fn value_lookup_field(entity_id: &str, attribute: AttributeId) -> String {
        format!("{entity_id}|{attribute}")
    }

    /// Set of row ids of one entity.
    pub fn entity_values(&self, value_type: &str, entity_id: &str) -> String {
        format!("{}:values:{}:entity:{}", self.prefix, value_type, entity_id)
    }

    /// Set of row ids referencing one attribute.
    pub fn attribute_values(&self, value_type: &str, attribute: AttributeId) -> String {
        format!("{}:values:{}:attribute:{}", self.prefix, value_type, attribute)
    }

    /// Glob matching every key written under this prefix.
    pub fn pattern(&self) -> String {
        format!("{}:*", self.prefix)
    }
}
