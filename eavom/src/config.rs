//! Per-binding configuration.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::{errors::EavResult, models::Attribute, store::EavStore};

pub const DEFAULT_EAV_ATTR: &str = "eav";
pub const DEFAULT_EAV_RELATION_ATTR: &str = "eav_values";

/// What the attribute selector is asked about: one entity of a bound type.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeScope {
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub namespace: String,
    pub site: Option<String>,
}

/// Selects the attributes applicable to one entity.
pub type AttributeSelector = Arc<dyn Fn(&dyn EavStore, &AttributeScope) -> EavResult<Vec<Attribute>> + Send + Sync>;

/// Default selector: every attribute of the bound namespace applicable to the
/// entity type, restricted to the configured site when one is set.
pub fn default_attributes(store: &dyn EavStore, scope: &AttributeScope) -> EavResult<Vec<Attribute>> {
    let attributes = Attribute::get_for_model(store, &scope.namespace, &scope.entity_type)?;
    Ok(match &scope.site {
        Some(site) => attributes
            .into_iter()
            .filter(|attribute| attribute.site.as_ref().is_none_or(|own| own == site))
            .collect(),
        None => attributes,
    })
}

#[derive(Clone)]
pub struct EavConfig {
    /// Name under which the adapter is reachable on an instance.
    pub eav_attr: String,
    /// Name of the entity -> values relation.
    pub eav_relation_attr: String,
    /// Name of the attribute -> values relation. Defaults to the value type name.
    pub attribute_relation_attr: Option<String>,
    pub site: Option<String>,
    /// Register the binding and relations without lifecycle hooks.
    pub manager_only: bool,
    selector: Option<AttributeSelector>,
}

impl Default for EavConfig {
    fn default() -> Self {
        Self {
            eav_attr: DEFAULT_EAV_ATTR.to_string(),
            eav_relation_attr: DEFAULT_EAV_RELATION_ATTR.to_string(),
            attribute_relation_attr: None,
            site: None,
            manager_only: false,
            selector: None,
        }
    }
}

impl fmt::Debug for EavConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EavConfig")
            .field("eav_attr", &self.eav_attr)
            .field("eav_relation_attr", &self.eav_relation_attr)
            .field("attribute_relation_attr", &self.attribute_relation_attr)
            .field("site", &self.site)
            .field("manager_only", &self.manager_only)
            .field("custom_selector", &self.selector.is_some())
            .finish()
    }
}

impl EavConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eav_attr(mut self, name: impl Into<String>) -> Self {
        self.eav_attr = name.into();
        self
    }

    pub fn eav_relation_attr(mut self, name: impl Into<String>) -> Self {
        self.eav_relation_attr = name.into();
        self
    }

    pub fn attribute_relation_attr(mut self, name: impl Into<String>) -> Self {
        self.attribute_relation_attr = Some(name.into());
        self
    }

    pub fn site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }

    pub fn manager_only(mut self, manager_only: bool) -> Self {
        self.manager_only = manager_only;
        self
    }

    /// Overrides attribute selection for the bound entity type.
    pub fn get_attributes<F>(mut self, selector: F) -> Self
    where
        F: Fn(&dyn EavStore, &AttributeScope) -> EavResult<Vec<Attribute>> + Send + Sync + 'static,
    {
        self.selector = Some(Arc::new(selector));
        self
    }

    pub fn has_custom_selector(&self) -> bool {
        self.selector.is_some()
    }

    pub fn select_attributes(&self, store: &dyn EavStore, scope: &AttributeScope) -> EavResult<Vec<Attribute>> {
        match &self.selector {
            Some(selector) => selector(store, scope),
            None => default_attributes(store, scope),
        }
    }

    pub fn from_settings(settings: EavSettings) -> Self {
        let defaults = Self::default();
        Self {
            eav_attr: settings.eav_attr.unwrap_or(defaults.eav_attr),
            eav_relation_attr: settings.eav_relation_attr.unwrap_or(defaults.eav_relation_attr),
            attribute_relation_attr: settings.attribute_relation_attr,
            site: settings.site,
            manager_only: settings.manager_only,
            selector: None,
        }
    }
}

/// Serializable subset of [`EavConfig`], for bindings declared in TOML.
///
/// ```toml
/// eav_attr = "attrs"
/// site = "clinic-a"
/// manager_only = false
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EavSettings {
    pub eav_attr: Option<String>,
    pub eav_relation_attr: Option<String>,
    pub attribute_relation_attr: Option<String>,
    pub site: Option<String>,
    pub manager_only: bool,
}

impl EavSettings {
    pub fn from_toml_str(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }
}

impl From<EavSettings> for EavConfig {
    fn from(settings: EavSettings) -> Self {
        EavConfig::from_settings(settings)
    }
}
