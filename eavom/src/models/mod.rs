//! Stored records: enum groups and values, attribute definitions and typed values.

mod attribute;
mod enums;
mod value;

pub use attribute::{Attribute, DEFAULT_ATTRIBUTE_NAMESPACE};
pub use enums::{EnumGroup, EnumValue};
pub use value::Value;
