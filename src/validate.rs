//! Record validation against resolved descriptors
//!
//! Validation checks shape only: presence of required fields and relations,
//! and that values match their declared semantic type. It always reports the
//! complete list of violations. Cross-record uniqueness can only be checked
//! over a collection the caller supplies, see [`duplicate_values`].

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::descriptor::EntityDescriptor;
use crate::schema::{Cardinality, FieldType, RelationDef, ScalarType};

/// Field name used for violations about the record as a whole
pub const ROOT_FIELD: &str = "<root>";

/// What is wrong with a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    MissingRequiredField,
    FieldTypeMismatch { expected: String, found: String },
    UnknownField,
    DuplicateValue { first_record: usize, value: String },
}

/// A single validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub field: String,
    #[serde(flatten)]
    pub kind: ViolationKind,
}

impl Violation {
    pub fn missing(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind: ViolationKind::MissingRequiredField,
        }
    }

    pub fn mismatch(field: impl Into<String>, expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind: ViolationKind::FieldTypeMismatch {
                expected: expected.into(),
                found: found.into(),
            },
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self.kind, ViolationKind::MissingRequiredField)
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationKind::MissingRequiredField => write!(f, "{}: missing required field", self.field),
            ViolationKind::FieldTypeMismatch { expected, found } => {
                write!(f, "{}: expected {}, found {}", self.field, expected, found)
            }
            ViolationKind::UnknownField => write!(f, "{}: not declared on this entity", self.field),
            ViolationKind::DuplicateValue { first_record, value } => {
                write!(f, "{}: value {} already used by record {}", self.field, value, first_record)
            }
        }
    }
}

/// A violation found in one record of a collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordViolation {
    pub record: usize,
    #[serde(flatten)]
    pub violation: Violation,
}

impl fmt::Display for RecordViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.record, self.violation)
    }
}

/// Validation switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOptions {
    /// Report keys the entity does not declare
    #[serde(default)]
    pub reject_unknown_fields: bool,
}

/// Validate one record against a resolved descriptor
pub fn validate(descriptor: &EntityDescriptor, record: &Value, options: &ValidationOptions) -> Vec<Violation> {
    let Some(obj) = record.as_object() else {
        return vec![Violation::mismatch(ROOT_FIELD, "object", json_kind(record))];
    };

    let mut violations = Vec::new();

    for field in &descriptor.fields {
        match present(obj, &field.name) {
            None if field.required => violations.push(Violation::missing(&field.name)),
            None => {}
            Some(value) => {
                if let Err(found) = check_type(&field.field_type, value) {
                    violations.push(Violation::mismatch(&field.name, field.field_type.to_string(), found));
                }
            }
        }
    }

    for relation in &descriptor.relations {
        match present(obj, &relation.name) {
            None if relation.required => violations.push(Violation::missing(&relation.name)),
            None => {}
            Some(value) => {
                if let Err(found) = check_relation(relation, value) {
                    violations.push(Violation::mismatch(&relation.name, relation_expectation(relation), found));
                }
            }
        }
    }

    if options.reject_unknown_fields {
        for key in obj.keys() {
            if descriptor.field(key).is_none() && descriptor.relation(key).is_none() {
                violations.push(Violation {
                    field: key.clone(),
                    kind: ViolationKind::UnknownField,
                });
            }
        }
    }

    violations
}

/// Report unique-flagged field values that repeat across `records`
pub fn duplicate_values(descriptor: &EntityDescriptor, records: &[Value]) -> Vec<RecordViolation> {
    let mut violations = Vec::new();

    for field in descriptor.fields.iter().filter(|f| f.unique) {
        let mut seen: HashMap<String, usize> = HashMap::new();
        for (index, record) in records.iter().enumerate() {
            let Some(value) = record.as_object().and_then(|obj| present(obj, &field.name)) else {
                continue;
            };
            let canonical = value.to_string();
            match seen.get(&canonical) {
                Some(&first_record) => violations.push(RecordViolation {
                    record: index,
                    violation: Violation {
                        field: field.name.clone(),
                        kind: ViolationKind::DuplicateValue {
                            first_record,
                            value: canonical,
                        },
                    },
                }),
                None => {
                    seen.insert(canonical, index);
                }
            }
        }
    }

    violations.sort_by_key(|v| v.record);
    violations
}

/// Fill absent, non-required fields that declare a default. Returns how many were set.
pub fn apply_defaults(descriptor: &EntityDescriptor, record: &mut Value) -> usize {
    let Some(obj) = record.as_object_mut() else {
        return 0;
    };

    let mut applied = 0;
    for field in descriptor.fields.iter().filter(|f| !f.required) {
        if let Some(default) = &field.default {
            if present(obj, &field.name).is_none() {
                obj.insert(field.name.clone(), default.clone());
                applied += 1;
            }
        }
    }
    applied
}

/// Check a value against a semantic type. `Err` carries what was found instead.
pub fn check_type(field_type: &FieldType, value: &Value) -> Result<(), String> {
    match field_type {
        FieldType::String => check_scalar(ScalarType::String, value),
        FieldType::Number => check_scalar(ScalarType::Number, value),
        FieldType::Boolean => check_scalar(ScalarType::Boolean, value),
        FieldType::DateIso8601 => check_scalar(ScalarType::DateIso8601, value),
        FieldType::Any => Ok(()),
        FieldType::ArrayOf(item) => {
            let items = value.as_array().ok_or_else(|| json_kind(value).to_string())?;
            for (i, element) in items.iter().enumerate() {
                check_scalar(*item, element).map_err(|found| format!("{} at index {}", found, i))?;
            }
            Ok(())
        }
    }
}

fn check_scalar(scalar: ScalarType, value: &Value) -> Result<(), String> {
    let ok = match scalar {
        ScalarType::String => value.is_string(),
        ScalarType::Number => value.as_f64().is_some_and(f64::is_finite),
        ScalarType::Boolean => value.is_boolean(),
        ScalarType::DateIso8601 => match value.as_str() {
            Some(s) if is_iso8601(s) => true,
            Some(s) => return Err(format!("string {:?}", s)),
            None => false,
        },
        ScalarType::Any => true,
    };

    if ok {
        Ok(())
    } else {
        Err(json_kind(value).to_string())
    }
}

/// `YYYY-MM-DD` or a full timestamp (RFC 3339, or without offset)
pub fn is_iso8601(s: &str) -> bool {
    static DATE_PREFIX: OnceLock<Regex> = OnceLock::new();
    let prefix = DATE_PREFIX.get_or_init(|| {
        Regex::new(r"^\d{4}-\d{2}-\d{2}(?:$|[Tt ])").expect("date prefix pattern is valid")
    });
    if !prefix.is_match(s) {
        return false;
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
        || DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
}

fn check_relation(relation: &RelationDef, value: &Value) -> Result<(), String> {
    match relation.cardinality {
        Cardinality::One => check_reference(value),
        Cardinality::Many => {
            let items = value.as_array().ok_or_else(|| json_kind(value).to_string())?;
            for (i, element) in items.iter().enumerate() {
                check_reference(element).map_err(|found| format!("{} at index {}", found, i))?;
            }
            Ok(())
        }
    }
}

/// A reference is either the target's id or an embedded target record
fn check_reference(value: &Value) -> Result<(), String> {
    if value.is_string() || value.is_object() {
        Ok(())
    } else {
        Err(json_kind(value).to_string())
    }
}

fn relation_expectation(relation: &RelationDef) -> String {
    match relation.cardinality {
        Cardinality::One => format!("{} id or record", relation.target),
        Cardinality::Many => format!("array of {} ids or records", relation.target),
    }
}

/// `null` counts as absent
fn present<'a>(obj: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    obj.get(name).filter(|v| !v.is_null())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
