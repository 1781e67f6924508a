//! Dynamic form synthesis.
//!
//! Builds one input field per applicable attribute of an entity, cleans
//! submitted string data into typed values and copies them onto the adapter.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};

use crate::{
    entity::{EntityAdapter, Instance},
    errors::{EavError, EavResult},
    manager::EntityManager,
    models::Attribute,
    types::{AttrValue, Datatype, EavEntity, EnumChoice, EnumValueId},
    validators::Validator,
};

/// Input widget family a field is rendered and cleaned as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Float,
    Integer,
    /// Separate date (`<slug>_0`) and time (`<slug>_1`) inputs.
    SplitDateTime,
    /// Yes / no / unknown.
    NullBoolean,
    MultipleChoice,
}

impl FieldKind {
    /// Default kind for a datatype. OBJECT attributes get no field.
    pub fn for_datatype(datatype: Datatype) -> Option<Self> {
        match datatype {
            Datatype::Text => Some(FieldKind::Text),
            Datatype::Float => Some(FieldKind::Float),
            Datatype::Int => Some(FieldKind::Integer),
            Datatype::Date => Some(FieldKind::SplitDateTime),
            Datatype::Bool => Some(FieldKind::NullBoolean),
            Datatype::Enum => Some(FieldKind::MultipleChoice),
            Datatype::Object => None,
        }
    }
}

/// Per-datatype replacement of the default field kind.
pub type FieldOverrides = BTreeMap<Datatype, FieldKind>;

#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    /// Attribute slug; also the submitted data key.
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    pub required: bool,
    pub help_text: Option<String>,
    pub validators: Vec<Validator>,
    /// `(id, label)` pairs, for choice fields.
    pub choices: Vec<(EnumValueId, String)>,
    pub initial: Option<AttrValue>,
}

/// Submitted form data: every key can carry several values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    values: BTreeMap<String, Vec<String>>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `value` under `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.entry(key.into()).or_default().push(value.into());
        self
    }

    pub fn set<I, V>(&mut self, key: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.values
            .insert(key.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// First value under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|values| values.first()).map(String::as_str)
    }

    pub fn get_all(&self, key: &str) -> &[String] {
        self.values.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut data = FormData::new();
        for (key, value) in iter {
            data.insert(key, value);
        }
        data
    }
}

/// Field messages keyed by slug.
pub type FormErrors = BTreeMap<String, Vec<String>>;

/// Cleaned values keyed by slug; `None` means the field was left empty.
pub type CleanedData = BTreeMap<String, Option<AttrValue>>;

/// Form over the EAV attributes of one entity instance.
///
/// Bound forms are cleaned on construction; the host entity's own fields are
/// never touched.
pub struct DynamicEntityForm<'i, T> {
    instance: &'i mut Instance<T>,
    fields: Vec<FormField>,
    data: Option<FormData>,
    cleaned: CleanedData,
    errors: FormErrors,
}

impl<'i, T: EavEntity> DynamicEntityForm<'i, T> {
    /// Bound form with default field kinds.
    pub fn new(instance: &'i mut Instance<T>, data: FormData) -> EavResult<Self> {
        Self::build(instance, Some(data), &FieldOverrides::new())
    }

    /// Form without submitted data, for displaying initial values.
    pub fn unbound(instance: &'i mut Instance<T>) -> EavResult<Self> {
        Self::build(instance, None, &FieldOverrides::new())
    }

    pub fn build(instance: &'i mut Instance<T>, data: Option<FormData>, overrides: &FieldOverrides) -> EavResult<Self> {
        let fields = {
            let adapter = instance.eav()?;
            let mut fields = Vec::new();
            for attribute in adapter.get_all_attributes()? {
                if let Some(field) = build_field(adapter, attribute, overrides)? {
                    fields.push(field);
                }
            }
            fields
        };

        let mut form = Self {
            instance,
            fields,
            data,
            cleaned: CleanedData::new(),
            errors: FormErrors::new(),
        };
        form.full_clean();
        Ok(form)
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn is_bound(&self) -> bool {
        self.data.is_some()
    }

    pub fn is_valid(&self) -> bool {
        self.is_bound() && self.errors.is_empty()
    }

    pub fn errors(&self) -> &FormErrors {
        &self.errors
    }

    /// Cleaned values, available only when the form is valid.
    pub fn cleaned_data(&self) -> Option<&CleanedData> {
        self.is_valid().then_some(&self.cleaned)
    }

    /// Copies cleaned values onto the adapter and saves the entity through `manager`.
    ///
    /// Empty fields unset the stored value.
    pub fn save<F>(self, manager: &EntityManager<'_>, persist: F) -> EavResult<()>
    where
        F: FnOnce(&mut T) -> EavResult<()>,
    {
        if !self.is_valid() {
            return Err(EavError::state(format!(
                "the {} could not be saved because the data didn't validate",
                T::ENTITY_TYPE
            )));
        }

        let adapter = self.instance.eav_mut()?;
        for (slug, value) in self.cleaned {
            match value {
                Some(value) => adapter.set(&slug, value)?,
                None => adapter.unset(&slug)?,
            }
        }
        manager.save(self.instance, persist)
    }

    fn full_clean(&mut self) {
        let Some(data) = &self.data else {
            return;
        };
        for field in &self.fields {
            match clean_field(field, data) {
                Ok(value) => {
                    self.cleaned.insert(field.name.clone(), value);
                }
                Err(message) => self.errors.entry(field.name.clone()).or_default().push(message),
            }
        }
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn build_field(adapter: &EntityAdapter, attribute: &Attribute, overrides: &FieldOverrides) -> EavResult<Option<FormField>> {
    let Some(default_kind) = FieldKind::for_datatype(attribute.datatype) else {
        return Ok(None);
    };
    let kind = overrides.get(&attribute.datatype).copied().unwrap_or(default_kind);

    let (validators, choices) = if attribute.datatype == Datatype::Enum {
        let choices = attribute
            .get_choices(adapter.store())?
            .unwrap_or_default()
            .into_iter()
            .filter_map(|choice| choice.id.map(|id| (id, choice.value)))
            .collect();
        (Vec::new(), choices)
    } else {
        (attribute.get_validators(), Vec::new())
    };

    Ok(Some(FormField {
        name: attribute.slug.clone(),
        label: capitalize(&attribute.name),
        kind,
        required: attribute.required,
        help_text: attribute.help_text().map(str::to_string),
        validators,
        choices,
        initial: adapter.get(&attribute.slug)?,
    }))
}

const REQUIRED: &str = "This field is required.";

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn clean_field(field: &FormField, data: &FormData) -> Result<Option<AttrValue>, String> {
    let value = clean_raw(field, data)?;
    match &value {
        None if field.required => return Err(REQUIRED.to_string()),
        None => return Ok(None),
        Some(value) => {
            for validator in &field.validators {
                validator.check(value).map_err(|violation| violation.message)?;
            }
        }
    }
    Ok(value)
}

fn clean_raw(field: &FormField, data: &FormData) -> Result<Option<AttrValue>, String> {
    let name = field.name.as_str();
    match field.kind {
        FieldKind::Text => Ok(non_empty(data.get(name)).map(AttrValue::from)),
        FieldKind::Float => non_empty(data.get(name))
            .map(|raw| {
                raw.parse::<f64>()
                    .ok()
                    .filter(|number| number.is_finite())
                    .map(AttrValue::Float)
                    .ok_or_else(|| "Enter a number.".to_string())
            })
            .transpose(),
        FieldKind::Integer => non_empty(data.get(name))
            .map(|raw| {
                raw.parse::<i64>()
                    .map(AttrValue::Int)
                    .map_err(|_| "Enter a whole number.".to_string())
            })
            .transpose(),
        FieldKind::SplitDateTime => {
            let date = non_empty(data.get(&format!("{name}_0")));
            let time = non_empty(data.get(&format!("{name}_1")));
            match (date, time) {
                (None, None) => Ok(None),
                (None, Some(_)) => Err("Enter a valid date.".to_string()),
                (Some(_), None) => Err("Enter a valid time.".to_string()),
                (Some(date), Some(time)) => {
                    let date =
                        NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| "Enter a valid date.".to_string())?;
                    let time = NaiveTime::parse_from_str(time, "%H:%M:%S")
                        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M"))
                        .map_err(|_| "Enter a valid time.".to_string())?;
                    Ok(Some(AttrValue::Date(date.and_time(time).and_utc())))
                }
            }
        }
        FieldKind::NullBoolean => match non_empty(data.get(name)).map(str::to_ascii_lowercase).as_deref() {
            None | Some("unknown" | "none" | "null") => Ok(None),
            Some("true" | "1" | "on" | "yes") => Ok(Some(AttrValue::Bool(true))),
            Some("false" | "0" | "off" | "no") => Ok(Some(AttrValue::Bool(false))),
            Some(other) => Err(format!("'{other}' is not a yes/no value.")),
        },
        FieldKind::MultipleChoice => {
            let mut selected = Vec::new();
            for raw in data.get_all(name).iter().filter_map(|raw| non_empty(Some(raw.as_str()))) {
                let id = raw
                    .parse::<u64>()
                    .ok()
                    .map(EnumValueId)
                    .filter(|id| field.choices.iter().any(|(choice, _)| choice == id))
                    .ok_or_else(|| format!("Select a valid choice. {raw} is not one of the available choices."))?;
                selected.push(id);
            }
            if selected.is_empty() {
                Ok(None)
            } else {
                Ok(Some(AttrValue::Enum(selected.into_iter().collect::<EnumChoice>())))
            }
        }
    }
}
