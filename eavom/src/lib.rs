//! eavom core library.
//!
//! Entity-attribute-value storage for host entities: typed attribute
//! definitions, sparse value rows behind the [`EavStore`] trait, a registry that
//! binds entity types to attribute and value tables, and a runtime adapter that
//! stages, validates and flushes values around the host's own save.

extern crate self as eavom;

pub mod config;
pub mod entity;
pub mod errors;
pub mod forms;
pub mod keys;
pub mod manager;
pub mod models;
pub mod registry;
pub mod signals;
pub mod slug;
pub mod store;
pub mod types;
pub mod validators;

pub use config::{AttributeScope, AttributeSelector, EavConfig, EavSettings, default_attributes};
pub use eavom_macros::EavEntity;
pub use entity::{AdapterState, EntityAdapter, Instance};
pub use errors::*;
pub use forms::{DynamicEntityForm, FieldKind, FieldOverrides, FormData, FormField};
pub use manager::EntityManager;
pub use models::{Attribute, DEFAULT_ATTRIBUTE_NAMESPACE, EnumGroup, EnumValue, Value};
pub use registry::{Binding, Registry, Relation};
pub use signals::{Signal, SignalContext, Signals};
pub use store::{EavStore, MemStore, RedisStore, ValueRow};
pub use types::{
    AttrValue, AttributeId, Datatype, EavEntity, EntityIdField, EntityRef, EnumChoice, EnumGroupId, EnumValueId,
    ValueId,
};

// Re-export redis so users don't need to depend on a specific redis version
pub use redis;
