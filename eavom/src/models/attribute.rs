use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EnumValue, Value};
use crate::{
    errors::{EavError, EavResult, SchemaError, ValidationError, ValidationIssue},
    slug::{is_valid_slug, slug_from_name},
    store::EavStore,
    types::{AttrValue, AttributeId, Datatype, EnumGroupId},
    validators::{self, Validator, ValueRule},
};

/// Namespace used when an attribute is created without an explicit one.
pub const DEFAULT_ATTRIBUTE_NAMESPACE: &str = "attributes";

fn default_namespace() -> String {
    DEFAULT_ATTRIBUTE_NAMESPACE.to_string()
}

/// Putting the **A** in EAV: a named, typed field that can be attached to entities.
///
/// Examples: color, height, number of children, has fever?.
///
/// The slug is derived from the name on first save when left blank. Once any
/// value references the attribute its datatype can no longer change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: Option<AttributeId>,
    /// Attribute table this definition lives in.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub slug: String,
    pub datatype: Datatype,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub enum_group: Option<EnumGroupId>,
    /// Partition key.
    #[serde(default)]
    pub site: Option<String>,
    /// Entity type the attribute is limited to; `None` applies to every entity type.
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub rules: Vec<ValueRule>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, datatype: Datatype) -> Self {
        Self {
            id: None,
            namespace: default_namespace(),
            name: name.into(),
            slug: String::new(),
            datatype,
            required: false,
            description: None,
            enum_group: None,
            site: None,
            parent: None,
            rules: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = slug.into();
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_enum_group(mut self, group: EnumGroupId) -> Self {
        self.enum_group = Some(group);
        self
    }

    pub fn on_site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }

    pub fn for_parent(mut self, entity_type: impl Into<String>) -> Self {
        self.parent = Some(entity_type.into());
        self
    }

    pub fn with_rule(mut self, rule: ValueRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn help_text(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn require_id(&self) -> EavResult<AttributeId> {
        self.id
            .ok_or_else(|| EavError::state(format!("attribute '{}' has not been saved", self.name)))
    }

    /// Whether the attribute can be set on entities of `entity_type`.
    pub fn applies_to(&self, entity_type: &str) -> bool {
        self.parent.as_deref().is_none_or(|parent| parent == entity_type)
    }

    /// Attributes of `namespace` applicable to `entity_type`, ordered by name.
    pub fn get_for_model(store: &dyn EavStore, namespace: &str, entity_type: &str) -> EavResult<Vec<Attribute>> {
        Ok(store
            .attributes(namespace)?
            .into_iter()
            .filter(|attribute| attribute.applies_to(entity_type))
            .collect())
    }

    /// Creates a saved attribute in one call.
    pub fn create(store: &dyn EavStore, mut attribute: Attribute) -> EavResult<Attribute> {
        attribute.save(store)?;
        Ok(attribute)
    }

    /// Saves the attribute, deriving the slug from the name when blank.
    ///
    /// Every check failure is a [`SchemaError`]; nothing is silently corrected.
    pub fn save(&mut self, store: &dyn EavStore) -> EavResult<AttributeId> {
        if self.slug.is_empty() {
            self.slug = slug_from_name(&self.name);
        }
        self.clean(store)?;

        let now = Utc::now();
        self.created_at.get_or_insert(now);
        self.updated_at = Some(now);

        let id = store.save_attribute(self)?;
        self.id = Some(id);
        log::debug!("saved attribute {} ({}) in {}", self.slug, self.datatype.as_str(), self.namespace);
        Ok(id)
    }

    /// Full validation of the definition against the store.
    pub fn clean(&self, store: &dyn EavStore) -> EavResult<()> {
        if self.name.trim().is_empty() {
            return Err(SchemaError::EmptyName.into());
        }
        if !is_valid_slug(&self.slug) {
            return Err(SchemaError::InvalidSlug {
                slug: self.slug.clone(),
            }
            .into());
        }
        for rule in &self.rules {
            rule.check_definition().map_err(|message| SchemaError::InvalidRule {
                slug: self.slug.clone(),
                message,
            })?;
        }

        match (self.datatype, self.enum_group) {
            (Datatype::Enum, None) => {
                return Err(SchemaError::MissingEnumGroup {
                    slug: self.slug.clone(),
                }
                .into());
            }
            (Datatype::Enum, Some(group)) => {
                if store.enum_group(group)?.is_none() {
                    return Err(SchemaError::UnknownEnumGroup {
                        slug: self.slug.clone(),
                        group: group.0,
                    }
                    .into());
                }
            }
            (datatype, Some(_)) => {
                return Err(SchemaError::UnexpectedEnumGroup {
                    slug: self.slug.clone(),
                    datatype,
                }
                .into());
            }
            (_, None) => {}
        }

        if let Some(id) = self.id
            && let Some(stored) = store.attribute_by_id(id)?
            && (stored.datatype != self.datatype || stored.namespace != self.namespace)
            && store.attribute_in_use(id)?
        {
            if stored.datatype != self.datatype {
                return Err(SchemaError::DatatypeInUse {
                    slug: self.slug.clone(),
                    from: stored.datatype,
                    to: self.datatype,
                }
                .into());
            }
            return Err(SchemaError::NamespaceInUse {
                slug: self.slug.clone(),
                from: stored.namespace,
                to: self.namespace.clone(),
            }
            .into());
        }

        let duplicate = store.attributes(&self.namespace)?.into_iter().any(|other| {
            other.id != self.id && other.slug == self.slug && other.site == self.site && other.parent == self.parent
        });
        if duplicate {
            return Err(SchemaError::DuplicateSlug {
                slug: self.slug.clone(),
            }
            .into());
        }
        Ok(())
    }

    /// Deletes the attribute. Refused while any value references it.
    pub fn delete(&self, store: &dyn EavStore) -> EavResult<bool> {
        let id = self.require_id()?;
        if store.attribute_in_use(id)? {
            return Err(SchemaError::InUse {
                slug: self.slug.clone(),
            }
            .into());
        }
        store.delete_attribute(&self.namespace, id)
    }

    /// Ordered validators for this attribute: the datatype validator, then extra rules.
    pub fn get_validators(&self) -> Vec<Validator> {
        std::iter::once(Validator::Datatype(self.datatype))
            .chain(self.rules.iter().cloned().map(Validator::Rule))
            .collect()
    }

    /// Checks `value` against [`get_validators`](Self::get_validators) and, for ENUM
    /// attributes, that every referenced choice belongs to the attribute's group.
    pub fn validate_value(&self, store: &dyn EavStore, value: &AttrValue) -> EavResult<()> {
        let issues = self.collect_issues(store, value)?;
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(issues).into())
        }
    }

    /// The datatype validator runs first; rules and choice membership then see the
    /// coerced value, so `"200"` on an INT attribute is range-checked as `200`.
    pub(crate) fn collect_issues(&self, store: &dyn EavStore, value: &AttrValue) -> EavResult<Vec<ValidationIssue>> {
        let coerced = match validators::coerce(self.datatype, value.clone()) {
            Ok(coerced) => coerced,
            Err(violation) => return Ok(vec![ValidationIssue::new(&self.slug, violation.code, violation.message)]),
        };
        let mut issues = Vec::new();
        for rule in &self.rules {
            if let Err(violation) = Validator::Rule(rule.clone()).check(&coerced) {
                issues.push(ValidationIssue::new(&self.slug, violation.code, violation.message));
            }
        }
        if issues.is_empty() && self.datatype == Datatype::Enum {
            issues.extend(self.membership_issues(store, &coerced)?);
        }
        Ok(issues)
    }

    pub(crate) fn membership_issues(&self, store: &dyn EavStore, value: &AttrValue) -> EavResult<Vec<ValidationIssue>> {
        let Some(ids) = value.as_enum() else {
            return Ok(Vec::new());
        };
        let mut issues = Vec::new();
        for id in ids {
            let member = store.enum_value(id)?;
            let valid = matches!((&member, self.enum_group), (Some(choice), Some(group)) if choice.group == Some(group));
            if !valid {
                let label = member.map(|choice| choice.value).unwrap_or_else(|| format!("#{id}"));
                issues.push(ValidationIssue::new(
                    &self.slug,
                    "validation.choice",
                    format!("{label} is not a valid choice for {self}"),
                ));
            }
        }
        Ok(issues)
    }

    /// Members of the enum group for ENUM attributes, `None` otherwise.
    pub fn get_choices(&self, store: &dyn EavStore) -> EavResult<Option<Vec<EnumValue>>> {
        match (self.datatype, self.enum_group) {
            (Datatype::Enum, Some(group)) => store.enum_values_in_group(group).map(Some),
            _ => Ok(None),
        }
    }

    /// Change policy: enum selections compare as sets of references, scalars by equality.
    pub fn value_has_changed(&self, old: Option<&AttrValue>, new: Option<&AttrValue>) -> bool {
        match (old, new) {
            (None, None) => false,
            (Some(old), Some(new)) if self.datatype == Datatype::Enum => old.as_enum() != new.as_enum(),
            (old, new) => old != new,
        }
    }

    /// Upserts the value row for (`entity_id`, self) in `value_type`.
    ///
    /// `None` deletes an existing row. The value is validated before anything is
    /// written, coerced to the stored representation, and only written when it
    /// differs from what is stored. Returns whether the store was modified.
    pub fn save_value(
        &self,
        store: &dyn EavStore,
        value_type: &str,
        entity_id: &str,
        value: Option<AttrValue>,
    ) -> EavResult<bool> {
        let attribute_id = self.require_id()?;

        let Some(value) = value else {
            let deleted = store.delete_value_row(value_type, entity_id, attribute_id)?;
            if deleted {
                log::debug!("deleted {} value of {entity_id} in {value_type}", self.slug);
            }
            return Ok(deleted);
        };

        self.validate_value(store, &value)?;
        let coerced = validators::coerce(self.datatype, value)
            .map_err(|violation| ValidationError::single(&self.slug, violation.code, violation.message))?;

        let mut record = match store.value_row(value_type, entity_id, attribute_id)? {
            Some(row) => Value::from_row(row, self.clone()),
            None => Value::new(entity_id, self.clone()),
        };
        if !self.value_has_changed(record.value(), Some(&coerced)) {
            return Ok(false);
        }

        record.set_value(Some(coerced));
        record.save(store, value_type)?;
        log::debug!("saved {} value of {entity_id} in {value_type}", self.slug);
        Ok(true)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.datatype.label())
    }
}
