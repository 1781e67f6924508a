use std::collections::BTreeMap;

use crate::{
    config::{AttributeScope, EavConfig},
    entity::EntityAdapter,
    errors::{EavError, EavResult},
    models::{Attribute, Value},
    signals::{Signal, Signals},
    store::EavStore,
    types::{AttributeId, EavEntity},
};

const ATTACH_UID: &str = "eav.attach_adapter";
const VALIDATE_UID: &str = "eav.validate_attributes";
const FLUSH_UID: &str = "eav.flush_values";

/// One entity type bound to an attribute namespace and a value type.
#[derive(Debug, Clone)]
pub struct Binding {
    pub entity_type: String,
    /// Attribute table the entity draws its attributes from.
    pub attribute_type: String,
    /// Value table the entity's values are stored in.
    pub value_type: String,
    pub config: EavConfig,
}

impl Binding {
    pub fn scope(&self, entity_id: Option<String>) -> AttributeScope {
        AttributeScope {
            entity_type: self.entity_type.clone(),
            entity_id,
            namespace: self.attribute_type.clone(),
            site: self.config.site.clone(),
        }
    }

    /// Name of the attribute type -> values relation.
    pub fn attribute_relation_name(&self) -> &str {
        self.config
            .attribute_relation_attr
            .as_deref()
            .unwrap_or(&self.value_type)
    }
}

/// Convenience relation installed by [`Registry::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relation {
    /// Entity -> its value rows. Keyed by entity id.
    EntityValues { value_type: String, attribute_type: String },
    /// Attribute type -> every value row of one attribute. Keyed by attribute id.
    AttributeValues { value_type: String, attribute_type: String },
}

#[derive(Debug, Clone)]
struct RelationEntry {
    relation: Relation,
    installed_by: String,
}

/// Binds entity types to their attribute and value types and owns the lifecycle hooks.
///
/// Registration is idempotent; unregistering removes the binding, the hooks and
/// the relations it installed.
#[derive(Debug, Default)]
pub struct Registry {
    bindings: BTreeMap<String, Binding>,
    signals: Signals,
    // owner (entity type or attribute type) -> relation name -> relation
    relations: BTreeMap<String, BTreeMap<String, RelationEntry>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `entity_type`. Returns `false` if it was already registered.
    pub fn register(
        &mut self,
        entity_type: &str,
        attribute_type: &str,
        value_type: &str,
        config: EavConfig,
    ) -> bool {
        if self.bindings.contains_key(entity_type) {
            return false;
        }

        let binding = Binding {
            entity_type: entity_type.to_string(),
            attribute_type: attribute_type.to_string(),
            value_type: value_type.to_string(),
            config,
        };

        if !binding.config.manager_only {
            self.install_hooks(&binding);
        }
        self.install_relations(&binding);

        log::debug!(
            "registered {entity_type} (attributes: {attribute_type}, values: {value_type}, manager_only: {})",
            binding.config.manager_only
        );
        self.bindings.insert(entity_type.to_string(), binding);
        true
    }

    pub fn register_type<T: EavEntity>(&mut self, attribute_type: &str, value_type: &str, config: EavConfig) -> bool {
        self.register(T::ENTITY_TYPE, attribute_type, value_type, config)
    }

    /// Removes the binding of `entity_type`. Returns `false` if it was not registered.
    pub fn unregister(&mut self, entity_type: &str) -> bool {
        let Some(binding) = self.bindings.remove(entity_type) else {
            return false;
        };

        let removed_hooks = self.signals.disconnect_all(entity_type);
        for relations in self.relations.values_mut() {
            relations.retain(|_, entry| entry.installed_by != entity_type);
        }
        self.relations.retain(|_, relations| !relations.is_empty());

        log::debug!(
            "unregistered {entity_type} ({removed_hooks} hooks removed, values: {})",
            binding.value_type
        );
        true
    }

    pub fn unregister_type<T: EavEntity>(&mut self) -> bool {
        self.unregister(T::ENTITY_TYPE)
    }

    pub fn is_registered(&self, entity_type: &str) -> bool {
        self.bindings.contains_key(entity_type)
    }

    pub fn binding(&self, entity_type: &str) -> Option<&Binding> {
        self.bindings.get(entity_type)
    }

    pub fn require_binding(&self, entity_type: &str) -> EavResult<&Binding> {
        self.binding(entity_type).ok_or_else(|| EavError::NotRegistered {
            entity_type: entity_type.to_string(),
        })
    }

    /// Registered entity types, sorted.
    pub fn bindings(&self) -> Vec<&str> {
        self.bindings.keys().map(String::as_str).collect()
    }

    pub fn signals(&self) -> &Signals {
        &self.signals
    }

    /// Relations installed on `owner`, by name.
    pub fn relations(&self, owner: &str) -> Vec<(&str, &Relation)> {
        self.relations
            .get(owner)
            .map(|relations| {
                relations
                    .iter()
                    .map(|(name, entry)| (name.as_str(), &entry.relation))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn relation(&self, owner: &str, name: &str) -> Option<&Relation> {
        self.relations
            .get(owner)
            .and_then(|relations| relations.get(name))
            .map(|entry| &entry.relation)
    }

    /// Follows the relation `name` of `owner` for `key` (entity id or attribute id).
    pub fn resolve_relation(&self, store: &dyn EavStore, owner: &str, name: &str, key: &str) -> EavResult<Vec<Value>> {
        let relation = self
            .relation(owner, name)
            .ok_or_else(|| EavError::not_found("relation", format!("{owner}.{name}")))?;

        match relation {
            Relation::EntityValues {
                value_type,
                attribute_type,
            } => {
                let rows = store.value_rows(value_type, key)?;
                let mut values = Vec::with_capacity(rows.len());
                for row in rows {
                    if let Some(attribute) = store.attribute(attribute_type, row.attribute_id)? {
                        values.push(Value::from_row(row, attribute));
                    }
                }
                Ok(values)
            }
            Relation::AttributeValues {
                value_type,
                attribute_type,
            } => {
                let id = key
                    .parse::<u64>()
                    .map(AttributeId)
                    .map_err(|_| EavError::not_found("attribute", key))?;
                let attribute = store
                    .attribute(attribute_type, id)?
                    .ok_or_else(|| EavError::not_found("attribute", id))?;
                Ok(store
                    .values_for_attribute(value_type, id)?
                    .into_iter()
                    .map(|row| Value::from_row(row, attribute.clone()))
                    .collect())
            }
        }
    }

    /// Attributes applicable to one entity, through the binding's selector.
    pub fn get_attributes(
        &self,
        store: &dyn EavStore,
        entity_type: &str,
        entity_id: Option<String>,
    ) -> EavResult<Vec<Attribute>> {
        let binding = self.require_binding(entity_type)?;
        binding.config.select_attributes(store, &binding.scope(entity_id))
    }

    fn install_hooks(&mut self, binding: &Binding) {
        let entity_type = binding.entity_type.as_str();

        let attach = binding.clone();
        self.signals.connect(Signal::PostInit, entity_type, ATTACH_UID, move |context| {
            *context.adapter = Some(EntityAdapter::new(
                attach.clone(),
                context.store.clone(),
                context.entity_id.clone(),
            ));
            Ok(())
        });

        self.signals.connect(Signal::PreSave, entity_type, VALIDATE_UID, |context| {
            let entity_type = context.entity_type;
            let adapter = context.adapter.as_mut().ok_or_else(|| EavError::NotRegistered {
                entity_type: entity_type.to_string(),
            })?;
            adapter.validate_attributes()
        });

        self.signals.connect(Signal::PostSave, entity_type, FLUSH_UID, |context| {
            let entity_type = context.entity_type;
            let adapter = context.adapter.as_mut().ok_or_else(|| EavError::NotRegistered {
                entity_type: entity_type.to_string(),
            })?;
            adapter.bind_entity_id(context.entity_id.clone());
            adapter.save()
        });
    }

    fn install_relations(&mut self, binding: &Binding) {
        self.relations.entry(binding.entity_type.clone()).or_default().insert(
            binding.config.eav_relation_attr.clone(),
            RelationEntry {
                relation: Relation::EntityValues {
                    value_type: binding.value_type.clone(),
                    attribute_type: binding.attribute_type.clone(),
                },
                installed_by: binding.entity_type.clone(),
            },
        );

        let attribute_relations = self.relations.entry(binding.attribute_type.clone()).or_default();
        let name = binding.attribute_relation_name().to_string();
        // A relation already installed by another binding sharing the attribute type stays its own.
        attribute_relations.entry(name).or_insert_with(|| RelationEntry {
            relation: Relation::AttributeValues {
                value_type: binding.value_type.clone(),
                attribute_type: binding.attribute_type.clone(),
            },
            installed_by: binding.entity_type.clone(),
        });
    }
}
