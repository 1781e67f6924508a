use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

record_id!(
    /// Store-assigned identifier of an [`Attribute`](crate::models::Attribute).
    AttributeId
);
record_id!(
    /// Store-assigned identifier of an [`EnumGroup`](crate::models::EnumGroup).
    EnumGroupId
);
record_id!(
    /// Store-assigned identifier of an [`EnumValue`](crate::models::EnumValue).
    EnumValueId
);
record_id!(
    /// Store-assigned identifier of a stored value row.
    ValueId
);

/// Declared type of an attribute. Selects which typed slot of a value row is populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Datatype {
    Text,
    Float,
    Int,
    Date,
    Bool,
    Enum,
    Object,
}

impl Datatype {
    pub const ALL: [Datatype; 7] = [
        Datatype::Text,
        Datatype::Float,
        Datatype::Int,
        Datatype::Date,
        Datatype::Bool,
        Datatype::Enum,
        Datatype::Object,
    ];

    /// Short code used in configuration and storage (`value_<code>` column names).
    pub fn as_str(self) -> &'static str {
        match self {
            Datatype::Text => "text",
            Datatype::Float => "float",
            Datatype::Int => "int",
            Datatype::Date => "date",
            Datatype::Bool => "bool",
            Datatype::Enum => "enum",
            Datatype::Object => "object",
        }
    }

    /// Human readable label.
    pub fn label(self) -> &'static str {
        match self {
            Datatype::Text => "Text",
            Datatype::Float => "Float",
            Datatype::Int => "Integer",
            Datatype::Date => "Date",
            Datatype::Bool => "True / False",
            Datatype::Enum => "Multiple Choice",
            Datatype::Object => "Object",
        }
    }

    /// Name of the sparse storage column holding values of this type.
    pub fn column(self) -> &'static str {
        match self {
            Datatype::Text => "value_text",
            Datatype::Float => "value_float",
            Datatype::Int => "value_int",
            Datatype::Date => "value_date",
            Datatype::Bool => "value_bool",
            Datatype::Enum => "value_enum",
            Datatype::Object => "value_object",
        }
    }

    /// Whether the storage slot is a multi-valued relation.
    pub fn is_m2m(self) -> bool {
        matches!(self, Datatype::Enum)
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Datatype {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Datatype::Text),
            "float" => Ok(Datatype::Float),
            "int" | "integer" => Ok(Datatype::Int),
            "date" => Ok(Datatype::Date),
            "bool" | "boolean" => Ok(Datatype::Bool),
            "enum" => Ok(Datatype::Enum),
            "object" => Ok(Datatype::Object),
            other => Err(format!("unknown datatype '{other}'")),
        }
    }
}

/// Reference to another entity instance, the payload of OBJECT attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: String,
    pub id: String,
}

impl EntityRef {
    pub fn new(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.id)
    }
}

/// Enum selection. A bare reference is wrapped into a one-element set when persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnumChoice {
    Single(EnumValueId),
    Many(BTreeSet<EnumValueId>),
}

impl EnumChoice {
    pub fn ids(&self) -> BTreeSet<EnumValueId> {
        match self {
            EnumChoice::Single(id) => BTreeSet::from([*id]),
            EnumChoice::Many(ids) => ids.clone(),
        }
    }

    /// Normalizes into the multi-value form used by storage.
    pub fn into_many(self) -> Self {
        match self {
            EnumChoice::Single(id) => EnumChoice::Many(BTreeSet::from([id])),
            many => many,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, EnumChoice::Many(ids) if ids.is_empty())
    }
}

impl FromIterator<EnumValueId> for EnumChoice {
    fn from_iter<I: IntoIterator<Item = EnumValueId>>(iter: I) -> Self {
        EnumChoice::Many(iter.into_iter().collect())
    }
}

/// Runtime representation of an attribute value.
///
/// Exactly one variant per [`Datatype`]; values of the wrong variant for an
/// attribute are rejected (or coerced, for numeric widening) during validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum AttrValue {
    Text(String),
    Float(f64),
    Int(i64),
    Date(DateTime<Utc>),
    Bool(bool),
    Enum(EnumChoice),
    Object(EntityRef),
}

impl AttrValue {
    /// Name of the variant, used in validation messages.
    pub fn kind(&self) -> &'static str {
        match self {
            AttrValue::Text(_) => "text",
            AttrValue::Float(_) => "float",
            AttrValue::Int(_) => "int",
            AttrValue::Date(_) => "date",
            AttrValue::Bool(_) => "bool",
            AttrValue::Enum(_) => "enum",
            AttrValue::Object(_) => "object",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            AttrValue::Float(value) => Some(*value),
            AttrValue::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            AttrValue::Date(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<BTreeSet<EnumValueId>> {
        match self {
            AttrValue::Enum(choice) => Some(choice.ids()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&EntityRef> {
        match self {
            AttrValue::Object(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Text(value) => f.write_str(value),
            AttrValue::Float(value) => write!(f, "{value}"),
            AttrValue::Int(value) => write!(f, "{value}"),
            AttrValue::Date(value) => write!(f, "{}", value.to_rfc3339()),
            AttrValue::Bool(value) => write!(f, "{value}"),
            AttrValue::Enum(choice) => {
                let ids: Vec<String> = choice.ids().iter().map(ToString::to_string).collect();
                write!(f, "[{}]", ids.join(", "))
            }
            AttrValue::Object(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Text(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        AttrValue::Int(i64::from(value))
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<DateTime<Utc>> for AttrValue {
    fn from(value: DateTime<Utc>) -> Self {
        AttrValue::Date(value)
    }
}

impl From<NaiveDate> for AttrValue {
    fn from(value: NaiveDate) -> Self {
        AttrValue::Date(value.and_time(chrono::NaiveTime::MIN).and_utc())
    }
}

impl From<EnumValueId> for AttrValue {
    fn from(value: EnumValueId) -> Self {
        AttrValue::Enum(EnumChoice::Single(value))
    }
}

impl From<EnumChoice> for AttrValue {
    fn from(value: EnumChoice) -> Self {
        AttrValue::Enum(value)
    }
}

impl From<EntityRef> for AttrValue {
    fn from(value: EntityRef) -> Self {
        AttrValue::Object(value)
    }
}

/// Static capability implemented by every host entity that can carry EAV attributes.
///
/// Usually derived with `#[derive(EavEntity)]`.
pub trait EavEntity {
    /// Stable entity type name used as the registry key.
    const ENTITY_TYPE: &'static str;

    /// Identity of the stored instance; `None` until the host has persisted it.
    fn entity_id(&self) -> Option<String>;

    fn entity_ref(&self) -> Option<EntityRef> {
        self.entity_id().map(|id| EntityRef::new(Self::ENTITY_TYPE, id))
    }
}

/// Conversion used by the derive macro to read the `#[eav(id)]` field.
pub trait EntityIdField {
    fn to_entity_id(&self) -> Option<String>;
}

impl EntityIdField for String {
    fn to_entity_id(&self) -> Option<String> {
        if self.is_empty() { None } else { Some(self.clone()) }
    }
}

impl<T: EntityIdField> EntityIdField for Option<T> {
    fn to_entity_id(&self) -> Option<String> {
        self.as_ref().and_then(EntityIdField::to_entity_id)
    }
}

macro_rules! numeric_entity_id {
    ($($ty:ty),*) => {
        $(
            impl EntityIdField for $ty {
                fn to_entity_id(&self) -> Option<String> {
                    Some(self.to_string())
                }
            }
        )*
    };
}

numeric_entity_id!(u32, u64, i32, i64, usize);
