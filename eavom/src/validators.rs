//! Value validators.
//!
//! One validator per [`Datatype`] plus optional [`ValueRule`]s an attribute can
//! carry. Validators are pure: they never touch the store. Enum group membership
//! needs the store and is checked by `Attribute::validate_value`.

use email_address::EmailAddress;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::types::{AttrValue, Datatype};

/// Returns `true` if the provided string is a syntactically valid email address.
pub fn is_valid_email(value: &str) -> bool {
    EmailAddress::is_valid(value)
}

/// Returns `true` if the provided string parses as a URL with a scheme.
pub fn is_valid_url(value: &str) -> bool {
    Url::parse(value).is_ok()
}

/// Returns `true` if the provided string parses as a UUID.
pub fn is_valid_uuid(value: &str) -> bool {
    Uuid::parse_str(value).is_ok()
}

/// A failed check, before it is attributed to an attribute slug.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub code: &'static str,
    pub message: String,
}

impl Violation {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

pub type CheckResult = Result<(), Violation>;

pub fn validate_text(value: &AttrValue) -> CheckResult {
    match value {
        AttrValue::Text(_) => Ok(()),
        other => Err(Violation::new(
            "validation.text",
            format!("must be text, got {}", other.kind()),
        )),
    }
}

pub fn validate_float(value: &AttrValue) -> CheckResult {
    coerce_float(value).map(|_| ())
}

pub fn validate_int(value: &AttrValue) -> CheckResult {
    coerce_int(value).map(|_| ())
}

pub fn validate_date(value: &AttrValue) -> CheckResult {
    match value {
        AttrValue::Date(_) => Ok(()),
        other => Err(Violation::new(
            "validation.date",
            format!("must be a date or datetime, got {}", other.kind()),
        )),
    }
}

pub fn validate_bool(value: &AttrValue) -> CheckResult {
    match value {
        AttrValue::Bool(_) => Ok(()),
        other => Err(Violation::new(
            "validation.bool",
            format!("must be a boolean, got {}", other.kind()),
        )),
    }
}

pub fn validate_enum(value: &AttrValue) -> CheckResult {
    match value {
        AttrValue::Enum(choice) if !choice.is_empty() => Ok(()),
        AttrValue::Enum(_) => Err(Violation::new("validation.enum", "must reference at least one choice")),
        other => Err(Violation::new(
            "validation.enum",
            format!("must be an enum value, got {}", other.kind()),
        )),
    }
}

pub fn validate_object(value: &AttrValue) -> CheckResult {
    match value {
        AttrValue::Object(reference) if !reference.id.is_empty() && !reference.entity_type.is_empty() => Ok(()),
        AttrValue::Object(_) => Err(Violation::new("validation.object", "must reference a saved entity")),
        other => Err(Violation::new(
            "validation.object",
            format!("must be an entity reference, got {}", other.kind()),
        )),
    }
}

fn coerce_float(value: &AttrValue) -> Result<f64, Violation> {
    match value {
        AttrValue::Float(number) if number.is_finite() => Ok(*number),
        AttrValue::Int(number) => Ok(*number as f64),
        AttrValue::Text(text) => text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|number| number.is_finite())
            .ok_or_else(|| Violation::new("validation.float", format!("'{text}' is not a float"))),
        other => Err(Violation::new(
            "validation.float",
            format!("must be a float, got {}", other.kind()),
        )),
    }
}

fn coerce_int(value: &AttrValue) -> Result<i64, Violation> {
    match value {
        AttrValue::Int(number) => Ok(*number),
        // i64::MAX as f64 rounds up to 2^63, hence the exclusive upper bound.
        AttrValue::Float(number) if number.fract() == 0.0 && number.is_finite() => {
            if *number >= i64::MIN as f64 && *number < i64::MAX as f64 {
                Ok(*number as i64)
            } else {
                Err(Violation::new("validation.int", format!("{number} is out of range for an integer")))
            }
        }
        AttrValue::Text(text) => text
            .trim()
            .parse::<i64>()
            .map_err(|_| Violation::new("validation.int", format!("'{text}' is not an integer"))),
        other => Err(Violation::new(
            "validation.int",
            format!("must be an integer, got {}", other.kind()),
        )),
    }
}

/// Runs the datatype validator and converts the value into the variant stored for `datatype`.
///
/// Numeric strings and integer/float widening are accepted for numeric datatypes;
/// a bare enum reference becomes a one-element set.
pub fn coerce(datatype: Datatype, value: AttrValue) -> Result<AttrValue, Violation> {
    match datatype {
        Datatype::Float => coerce_float(&value).map(AttrValue::Float),
        Datatype::Int => coerce_int(&value).map(AttrValue::Int),
        Datatype::Enum => {
            validate_enum(&value)?;
            match value {
                AttrValue::Enum(choice) => Ok(AttrValue::Enum(choice.into_many())),
                other => Ok(other),
            }
        }
        _ => {
            Validator::Datatype(datatype).check(&value)?;
            Ok(value)
        }
    }
}

/// Extra constraint an attribute can carry on top of its datatype validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ValueRule {
    Length {
        #[serde(default)]
        min: Option<usize>,
        #[serde(default)]
        max: Option<usize>,
    },
    Range {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    Regex {
        pattern: String,
    },
    Email,
    Url,
    Uuid,
}

impl ValueRule {
    /// Checks that the rule itself is well formed.
    pub fn check_definition(&self) -> Result<(), String> {
        match self {
            ValueRule::Regex { pattern } => Regex::new(pattern).map(|_| ()).map_err(|err| err.to_string()),
            ValueRule::Length {
                min: Some(min),
                max: Some(max),
            } if min > max => Err(format!("length min {min} exceeds max {max}")),
            ValueRule::Range {
                min: Some(min),
                max: Some(max),
            } if min > max => Err(format!("range min {min} exceeds max {max}")),
            _ => Ok(()),
        }
    }

    fn check(&self, value: &AttrValue) -> CheckResult {
        match self {
            ValueRule::Length { min, max } => {
                let Some(len) = value.as_text().map(|text| text.chars().count()) else {
                    return Ok(());
                };
                if let Some(min_len) = min
                    && len < *min_len
                {
                    return Err(Violation::new(
                        "validation.length",
                        format!("length must be at least {min_len}"),
                    ));
                }
                if let Some(max_len) = max
                    && len > *max_len
                {
                    return Err(Violation::new(
                        "validation.length",
                        format!("length must be at most {max_len}"),
                    ));
                }
                Ok(())
            }
            ValueRule::Range { min, max } => {
                let Some(candidate) = value.as_float() else {
                    return Ok(());
                };
                if let Some(lower) = min
                    && candidate < *lower
                {
                    return Err(Violation::new("validation.range", format!("value must be at least {lower}")));
                }
                if let Some(upper) = max
                    && candidate > *upper
                {
                    return Err(Violation::new("validation.range", format!("value must be at most {upper}")));
                }
                Ok(())
            }
            ValueRule::Regex { pattern } => {
                let Some(candidate) = value.as_text() else {
                    return Ok(());
                };
                let regex = Regex::new(pattern)
                    .map_err(|err| Violation::new("validation.regex", format!("invalid pattern {pattern}: {err}")))?;
                if regex.is_match(candidate) {
                    Ok(())
                } else {
                    Err(Violation::new(
                        "validation.regex",
                        format!("value does not match pattern {pattern}"),
                    ))
                }
            }
            ValueRule::Email => text_check(value, is_valid_email, "validation.email", "value must be a valid email address"),
            ValueRule::Url => text_check(value, is_valid_url, "validation.url", "value must be a valid URL"),
            ValueRule::Uuid => text_check(value, is_valid_uuid, "validation.uuid", "value must be a valid UUID"),
        }
    }
}

fn text_check(value: &AttrValue, predicate: fn(&str) -> bool, code: &'static str, message: &str) -> CheckResult {
    match value.as_text() {
        Some(candidate) if !predicate(candidate) => Err(Violation::new(code, message)),
        _ => Ok(()),
    }
}

/// A single entry of the ordered list returned by `Attribute::get_validators`.
#[derive(Debug, Clone, PartialEq)]
pub enum Validator {
    Datatype(Datatype),
    Rule(ValueRule),
}

impl Validator {
    pub fn check(&self, value: &AttrValue) -> CheckResult {
        match self {
            Validator::Datatype(datatype) => match datatype {
                Datatype::Text => validate_text(value),
                Datatype::Float => validate_float(value),
                Datatype::Int => validate_int(value),
                Datatype::Date => validate_date(value),
                Datatype::Bool => validate_bool(value),
                Datatype::Enum => validate_enum(value),
                Datatype::Object => validate_object(value),
            },
            Validator::Rule(rule) => rule.check(value),
        }
    }
}
