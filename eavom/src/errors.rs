use std::borrow::Cow;

use thiserror::Error;

use crate::types::Datatype;

/// Top-level error type returned by eavom operations.
#[derive(Debug, Error)]
pub enum EavError {
    /// An attribute definition is invalid and was not saved.
    #[error("invalid attribute definition: {0}")]
    Schema(#[from] SchemaError),

    /// Validation failed for one or more attribute values.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// The slug is not among the attributes applicable to the entity.
    #[error("{entity_type} has no EAV attribute named '{slug}'")]
    UnknownAttribute { entity_type: String, slug: String },

    /// The attribute applies to the entity but holds no value.
    #[error("EAV attribute '{slug}' is not set")]
    Unset { slug: String },

    /// The entity type has no EAV binding (or no adapter was attached).
    #[error("{entity_type} is not registered with eav")]
    NotRegistered { entity_type: String },

    /// The operation is not allowed in the current state.
    #[error("{message}")]
    State { message: Cow<'static, str> },

    /// A referenced record does not exist.
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// Underlying Redis command failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A stored record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{message}")]
    Other { message: Cow<'static, str> },
}

impl EavError {
    pub fn state(message: impl Into<Cow<'static, str>>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Returns the validation issues if this is a value validation failure.
    pub fn validation_issues(&self) -> Option<&[ValidationIssue]> {
        match self {
            EavError::Validation(err) => Some(&err.issues),
            _ => None,
        }
    }
}

/// Invalid attribute definitions, raised from `Attribute::save`.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaError {
    #[error("attribute name must not be empty")]
    EmptyName,

    #[error("slug '{slug}' must be all lower case, start with a letter, and contain only letters, numbers, or underscores")]
    InvalidSlug { slug: String },

    #[error("you must set the choice group for multiple choice attribute '{slug}'")]
    MissingEnumGroup { slug: String },

    #[error("you can only assign a choice group to multiple choice attributes ('{slug}' is {datatype})")]
    UnexpectedEnumGroup { slug: String, datatype: Datatype },

    #[error("choice group {group} referenced by '{slug}' does not exist")]
    UnknownEnumGroup { slug: String, group: u64 },

    #[error("you cannot change the datatype of attribute '{slug}' from {from} to {to}: it is already in use")]
    DatatypeInUse { slug: String, from: Datatype, to: Datatype },

    #[error("you cannot move attribute '{slug}' from namespace '{from}' to '{to}': it is already in use")]
    NamespaceInUse { slug: String, from: String, to: String },

    #[error("invalid value rule on '{slug}': {message}")]
    InvalidRule { slug: String, message: String },

    #[error("attribute slug '{slug}' already exists in this scope")]
    DuplicateSlug { slug: String },

    #[error("attribute '{slug}' cannot be deleted while values reference it")]
    InUse { slug: String },

    #[error("enum group name '{name}' already exists")]
    DuplicateEnumGroup { name: String },

    #[error("enum value '{value}' already exists")]
    DuplicateEnumValue { value: String },
}

/// Collection of validation issues encountered while validating attribute values.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("validation failed: {}", summarize(.issues))]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

fn summarize(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("{} EAV field {}", issue.field, issue.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    pub fn new<I>(issues: I) -> Self
    where
        I: IntoIterator<Item = ValidationIssue>,
    {
        Self {
            issues: issues.into_iter().collect(),
        }
    }

    /// Convenience helper for constructing a single-field validation error.
    pub fn single(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new([ValidationIssue::new(field, code, message)])
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Returns the issues recorded for one attribute slug.
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a ValidationIssue> + 'a {
        self.issues.iter().filter(move |issue| issue.field == field)
    }
}

/// Detailed validation failure for a single attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Convenience alias used when validation is the only failure mode.
pub type ValidationResult<T> = Result<T, ValidationError>;

pub type EavResult<T> = Result<T, EavError>;
