//! Runtime adapter composed onto entity instances.

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use once_cell::unsync::OnceCell;

use crate::{
    errors::{EavError, EavResult, ValidationError, ValidationIssue},
    models::{Attribute, Value},
    registry::Binding,
    store::EavStore,
    types::{AttrValue, AttributeId, EavEntity},
};

/// Where an adapter is in the save cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    /// Attached, nothing staged.
    Unbound,
    /// Values staged since the last flush.
    Dirty,
    /// Staged values passed validation; waiting for the host to persist.
    Validating,
    /// Staged values flushed to the store.
    Persisted,
}

/// Exposes get/set over the EAV attributes of one entity instance.
///
/// Writes are staged in memory. `validate_attributes` runs before the host
/// persists the entity and `save` flushes the staged values afterwards.
/// Reads prefer staged values, then fall back to a cached query of the store.
pub struct EntityAdapter {
    binding: Binding,
    store: Rc<dyn EavStore>,
    entity_id: Option<String>,
    state: AdapterState,
    // None stages a deletion.
    staged: BTreeMap<String, Option<AttrValue>>,
    attributes: OnceCell<Vec<Attribute>>,
    stored: OnceCell<BTreeMap<AttributeId, Value>>,
}

impl EntityAdapter {
    pub fn new(binding: Binding, store: Rc<dyn EavStore>, entity_id: Option<String>) -> Self {
        Self {
            binding,
            store,
            entity_id,
            state: AdapterState::Unbound,
            staged: BTreeMap::new(),
            attributes: OnceCell::new(),
            stored: OnceCell::new(),
        }
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    pub fn store(&self) -> &dyn EavStore {
        self.store.as_ref()
    }

    pub fn state(&self) -> AdapterState {
        self.state
    }

    pub fn is_dirty(&self) -> bool {
        !self.staged.is_empty()
    }

    pub fn staged(&self) -> &BTreeMap<String, Option<AttrValue>> {
        &self.staged
    }

    /// Updates the entity id once the host has persisted the entity.
    pub fn bind_entity_id(&mut self, entity_id: Option<String>) {
        if self.entity_id != entity_id {
            self.entity_id = entity_id;
            self.stored.take();
            self.attributes.take();
        }
    }

    /// Attributes applicable to this entity, queried once per adapter.
    pub fn get_all_attributes(&self) -> EavResult<&[Attribute]> {
        self.attributes
            .get_or_try_init(|| {
                self.binding
                    .config
                    .select_attributes(self.store.as_ref(), &self.binding.scope(self.entity_id.clone()))
            })
            .map(Vec::as_slice)
    }

    pub fn get_all_attribute_slugs(&self) -> EavResult<Vec<String>> {
        Ok(self
            .get_all_attributes()?
            .iter()
            .map(|attribute| attribute.slug.clone())
            .collect())
    }

    pub fn get_attribute_by_slug(&self, slug: &str) -> EavResult<&Attribute> {
        self.get_all_attributes()?
            .iter()
            .find(|attribute| attribute.slug == slug)
            .ok_or_else(|| EavError::UnknownAttribute {
                entity_type: self.binding.entity_type.clone(),
                slug: slug.to_string(),
            })
    }

    fn stored_values(&self) -> EavResult<&BTreeMap<AttributeId, Value>> {
        self.stored.get_or_try_init(|| {
            let Some(entity_id) = self.entity_id.as_deref() else {
                return Ok(BTreeMap::new());
            };
            let applicable = self.get_all_attributes()?;
            let mut values = BTreeMap::new();
            for row in self.store.value_rows(&self.binding.value_type, entity_id)? {
                let attribute = match applicable.iter().find(|attribute| attribute.id == Some(row.attribute_id)) {
                    Some(attribute) => Some(attribute.clone()),
                    None => self.store.attribute(&self.binding.attribute_type, row.attribute_id)?,
                };
                if let Some(attribute) = attribute {
                    values.insert(row.attribute_id, Value::from_row(row, attribute));
                }
            }
            Ok(values)
        })
    }

    /// Stored value row for `attribute`, ignoring staged changes.
    pub fn get_value_by_attribute(&self, attribute: &Attribute) -> EavResult<Option<&Value>> {
        let Some(id) = attribute.id else {
            return Ok(None);
        };
        Ok(self.stored_values()?.get(&id))
    }

    /// Current value of `slug`: staged first, then stored. Unknown slugs are an error.
    pub fn get(&self, slug: &str) -> EavResult<Option<AttrValue>> {
        let attribute = self.get_attribute_by_slug(slug)?;
        if let Some(staged) = self.staged.get(slug) {
            return Ok(staged.clone());
        }
        Ok(self
            .get_value_by_attribute(attribute)?
            .and_then(|value| value.value().cloned()))
    }

    /// Like [`get`](Self::get), but an unset attribute is an error too.
    pub fn require(&self, slug: &str) -> EavResult<AttrValue> {
        self.get(slug)?.ok_or_else(|| EavError::Unset { slug: slug.to_string() })
    }

    /// Whether `slug` is applicable and currently holds a value.
    pub fn contains(&self, slug: &str) -> EavResult<bool> {
        match self.get(slug) {
            Ok(value) => Ok(value.is_some()),
            Err(EavError::UnknownAttribute { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Stages `value` for `slug`. Nothing is validated or written until save.
    pub fn set(&mut self, slug: &str, value: impl Into<AttrValue>) -> EavResult<()> {
        self.get_attribute_by_slug(slug)?;
        self.staged.insert(slug.to_string(), Some(value.into()));
        self.state = AdapterState::Dirty;
        Ok(())
    }

    /// Stages removal of the stored value of `slug`.
    pub fn unset(&mut self, slug: &str) -> EavResult<()> {
        self.get_attribute_by_slug(slug)?;
        self.staged.insert(slug.to_string(), None);
        self.state = AdapterState::Dirty;
        Ok(())
    }

    /// Validates every applicable attribute holding a staged or stored value,
    /// and flags required attributes holding neither. Issues are aggregated.
    pub fn validate_attributes(&mut self) -> EavResult<()> {
        let mut issues = Vec::new();
        for attribute in self.get_all_attributes()? {
            let current = match self.staged.get(&attribute.slug) {
                Some(staged) => staged.clone(),
                None => self
                    .get_value_by_attribute(attribute)?
                    .and_then(|value| value.value().cloned()),
            };
            match current {
                Some(value) => issues.extend(attribute.collect_issues(self.store.as_ref(), &value)?),
                None if attribute.required => issues.push(ValidationIssue::new(
                    &attribute.slug,
                    "validation.required",
                    "cannot be blank",
                )),
                None => {}
            }
        }

        if issues.is_empty() {
            self.state = AdapterState::Validating;
            return Ok(());
        }
        log::warn!(
            "{} {} failed EAV validation: {} issue(s)",
            self.binding.entity_type,
            self.entity_id.as_deref().unwrap_or("(unsaved)"),
            issues.len()
        );
        Err(ValidationError::new(issues).into())
    }

    /// Flushes every staged value through `Attribute::save_value`.
    ///
    /// Staged values are cleared only when every write succeeded.
    pub fn save(&mut self) -> EavResult<()> {
        let entity_id = self.entity_id.clone().ok_or_else(|| {
            EavError::state(format!(
                "{} must be saved before its EAV values can be stored",
                self.binding.entity_type
            ))
        })?;

        let flushed: EavResult<usize> = self.staged.iter().try_fold(0, |written, (slug, value)| {
            let attribute = self.get_attribute_by_slug(slug)?;
            let changed =
                attribute.save_value(self.store.as_ref(), &self.binding.value_type, &entity_id, value.clone())?;
            Ok(written + usize::from(changed))
        });
        // Earlier writes may have landed before the failure.
        let written = match flushed {
            Ok(written) => written,
            Err(err) => {
                self.stored.take();
                return Err(err);
            }
        };

        log::debug!(
            "flushed {} staged EAV values of {} {entity_id} ({written} written)",
            self.staged.len(),
            self.binding.entity_type
        );
        self.staged.clear();
        self.stored.take();
        self.state = AdapterState::Persisted;
        Ok(())
    }

    /// Persisted values only; staged changes are not included.
    pub fn values(&self) -> EavResult<Vec<&Value>> {
        Ok(self.stored_values()?.values().collect())
    }

    /// Slug -> current value for every applicable attribute holding one.
    pub fn get_attributes_and_values(&self) -> EavResult<BTreeMap<String, AttrValue>> {
        let mut snapshot = BTreeMap::new();
        for attribute in self.get_all_attributes()? {
            if let Some(value) = self.get(&attribute.slug)? {
                snapshot.insert(attribute.slug.clone(), value);
            }
        }
        Ok(snapshot)
    }
}

impl std::fmt::Debug for EntityAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityAdapter")
            .field("entity_type", &self.binding.entity_type)
            .field("entity_id", &self.entity_id)
            .field("state", &self.state)
            .field("staged", &self.staged)
            .finish()
    }
}

/// A host entity together with its EAV adapter.
///
/// Built by `EntityManager::init`; instances of unregistered types carry no adapter.
#[derive(Debug)]
pub struct Instance<T> {
    model: T,
    adapter: Option<EntityAdapter>,
}

impl<T: EavEntity> Instance<T> {
    pub(crate) fn new(model: T) -> Self {
        Self { model, adapter: None }
    }

    pub fn model(&self) -> &T {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut T {
        &mut self.model
    }

    pub fn into_inner(self) -> T {
        self.model
    }

    pub fn has_adapter(&self) -> bool {
        self.adapter.is_some()
    }

    pub fn eav(&self) -> EavResult<&EntityAdapter> {
        self.adapter.as_ref().ok_or_else(|| EavError::NotRegistered {
            entity_type: T::ENTITY_TYPE.to_string(),
        })
    }

    pub fn eav_mut(&mut self) -> EavResult<&mut EntityAdapter> {
        self.adapter.as_mut().ok_or_else(|| EavError::NotRegistered {
            entity_type: T::ENTITY_TYPE.to_string(),
        })
    }

    /// The adapter, looked up under its configured attribute name.
    pub fn adapter(&self, name: &str) -> Option<&EntityAdapter> {
        self.adapter
            .as_ref()
            .filter(|adapter| adapter.binding.config.eav_attr == name)
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut T, &mut Option<EntityAdapter>) {
        (&mut self.model, &mut self.adapter)
    }
}

impl<T> Deref for Instance<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.model
    }
}

impl<T> DerefMut for Instance<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.model
    }
}
