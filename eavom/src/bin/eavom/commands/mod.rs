pub mod attributes;
pub mod enums;
pub mod values;
