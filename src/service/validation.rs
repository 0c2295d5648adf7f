//! Save-time validation: rules derived from model metadata, applied to the
//! inbound row with every failure accumulated before reporting.

use crate::model::{FieldType, FieldValidator, MetaModel, ModelError, Row, SaveStamp};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::{json, Map, Value};
use std::collections::HashSet;

/// Derived validation rules for one model: per-field validator lists in
/// field order, plus the set of fields whose emptiness is an error.
#[derive(Clone, Debug)]
pub struct RuleSet {
    model: String,
    rules: Vec<(String, Vec<FieldValidator>)>,
    required: HashSet<String>,
}

impl RuleSet {
    pub fn required(&self) -> &HashSet<String> {
        &self.required
    }

    pub fn validators_for(&self, field: &str) -> Option<&[FieldValidator]> {
        self.rules
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, v)| v.as_slice())
    }
}

/// Derive the rule set from model metadata.
///
/// A declared-required field is only enforced as required when nothing else
/// supplies its value: fields with defaults, save stamps, audit pairs, join
/// sources and key fields are all excluded. Required fields without declared
/// validators get an implicit type validator matching their field type.
pub fn derive_rules(meta: &MetaModel) -> RuleSet {
    let stamped: HashSet<&str> = meta
        .fields
        .iter()
        .filter(|f| f.stamp.is_some())
        .map(|f| f.name.as_str())
        .collect();
    // The plain column of an audit pair, e.g. gr2o_changed next to
    // gr2o_changed_by, is filled together with its stamped partner.
    let audit_partner = |name: &str| -> bool {
        stamped.contains(format!("{name}_by").as_str())
    };

    let mut rules = Vec::new();
    let mut required = HashSet::new();

    for field in &meta.fields {
        if field.field_type == FieldType::ChildModel {
            continue;
        }

        let enforced_required = field.required
            && field.default.is_none()
            && field.stamp.is_none()
            && !audit_partner(&field.name)
            && !field.join_field
            && !field.key;

        let mut validators = Vec::new();
        if enforced_required && field.auto_not_empty {
            validators.push(FieldValidator::NotEmpty);
        }
        if field.validators.is_empty() {
            if let Some(implicit) = implicit_type_validator(field.field_type) {
                validators.push(implicit);
            }
        } else {
            validators.extend(field.validators.iter().cloned());
        }
        if let Some(maxlength) = field.maxlength {
            if !field.validators.iter().any(|v| matches!(v, FieldValidator::MaxLength(_))) {
                validators.push(FieldValidator::MaxLength(maxlength));
            }
        }

        if enforced_required {
            required.insert(field.name.clone());
        }
        if !validators.is_empty() {
            rules.push((field.name.clone(), validators));
        }
    }

    RuleSet { model: meta.name.clone(), rules, required }
}

fn implicit_type_validator(field_type: FieldType) -> Option<FieldValidator> {
    match field_type {
        FieldType::Numeric => Some(FieldValidator::Numeric),
        FieldType::Date => Some(FieldValidator::Date),
        FieldType::DateTime => Some(FieldValidator::DateTime),
        _ => None,
    }
}

/// Validate a row against the rule set, accumulating every failure. When
/// `partial` is set (update requests), absent fields are not required.
pub fn validate_row(rules: &RuleSet, row: &Row, partial: bool) -> Result<(), ModelError> {
    let mut errors = Map::new();

    for (field, validators) in &rules.rules {
        let required = rules.required.contains(field);

        let Some(value) = row.get(field) else {
            if required && !partial {
                errors.insert(field.clone(), json!(["value is required and can't be empty"]));
            }
            continue;
        };

        if is_empty(value) {
            if required {
                errors.insert(field.clone(), json!(["value is required and can't be empty"]));
            }
            continue;
        }

        match value {
            Value::Array(items) => {
                let mut by_index = Map::new();
                for (index, item) in items.iter().enumerate() {
                    let messages = apply_all(validators, item);
                    if !messages.is_empty() {
                        by_index.insert(index.to_string(), json!(messages));
                    }
                }
                if !by_index.is_empty() {
                    errors.insert(field.clone(), Value::Object(by_index));
                }
            }
            _ => {
                let messages = apply_all(validators, value);
                if !messages.is_empty() {
                    errors.insert(field.clone(), json!(messages));
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ModelError::Validation {
            message: format!("Errors were found when validating {}", rules.model),
            errors: Value::Object(errors),
        })
    }
}

fn apply_all(validators: &[FieldValidator], value: &Value) -> Vec<String> {
    validators
        .iter()
        .filter_map(|v| apply(v, value))
        .collect()
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Check one validator against one scalar value; `None` means pass.
fn apply(validator: &FieldValidator, value: &Value) -> Option<String> {
    match validator {
        FieldValidator::NotEmpty => {
            is_empty(value).then(|| "value is required and can't be empty".to_string())
        }
        FieldValidator::Numeric => match value {
            Value::Number(_) => None,
            Value::String(s) if s.parse::<f64>().is_ok() => None,
            _ => Some("not a valid number".to_string()),
        },
        FieldValidator::Date => {
            let ok = value.as_str().is_some_and(|s| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
            });
            (!ok).then(|| "not a valid date (expected YYYY-MM-DD)".to_string())
        }
        FieldValidator::DateTime => {
            let ok = value.as_str().is_some_and(|s| {
                DateTime::parse_from_rfc3339(s).is_ok()
                    || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
                    || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
            });
            (!ok).then(|| "not a valid date-time".to_string())
        }
        FieldValidator::MaxLength(max) => {
            let too_long = value
                .as_str()
                .is_some_and(|s| s.chars().count() > *max as usize);
            too_long.then(|| format!("must be at most {max} characters"))
        }
        FieldValidator::MinLength(min) => {
            let too_short = value
                .as_str()
                .is_some_and(|s| s.chars().count() < *min as usize);
            too_short.then(|| format!("must be at least {min} characters"))
        }
        FieldValidator::Pattern(pattern) => match Regex::new(pattern) {
            Ok(re) => {
                let ok = value.as_str().is_some_and(|s| re.is_match(s));
                (!ok).then(|| "does not match the required pattern".to_string())
            }
            Err(_) => Some(format!("invalid pattern {pattern:?}")),
        },
        FieldValidator::OneOf(allowed) => {
            let ok = allowed.iter().any(|a| value_eq(value, a));
            (!ok).then(|| {
                format!(
                    "must be one of: {:?}",
                    allowed.iter().take(5).collect::<Vec<_>>()
                )
            })
        }
        FieldValidator::Minimum(min) => {
            let below = value.as_f64().is_some_and(|n| n < *min);
            below.then(|| format!("must be at least {min}"))
        }
        FieldValidator::Maximum(max) => {
            let above = value.as_f64().is_some_and(|n| n > *max);
            above.then(|| format!("must be at most {max}"))
        }
        FieldValidator::Email => {
            let ok = value.as_str().is_some_and(|s| s.contains('@') && s.len() >= 3);
            (!ok).then(|| "must be a valid email".to_string())
        }
        FieldValidator::Uuid => {
            let ok = value
                .as_str()
                .is_some_and(|s| uuid::Uuid::parse_str(s).is_ok());
            (!ok).then(|| "must be a valid UUID".to_string())
        }
    }
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DefaultValue, FieldMeta};

    fn meta() -> MetaModel {
        let mut meta = MetaModel::new("respondents");
        meta.fields.push(FieldMeta {
            key: true,
            required: true,
            ..FieldMeta::new("grs_id_user", FieldType::Numeric)
        });
        meta.fields.push(FieldMeta {
            required: true,
            maxlength: Some(30),
            ..FieldMeta::new("grs_last_name", FieldType::String)
        });
        meta.fields.push(FieldMeta {
            required: true,
            default: Some(DefaultValue::Value(json!(1))),
            ..FieldMeta::new("grs_iso_lang", FieldType::Numeric)
        });
        meta.fields.push(FieldMeta {
            required: true,
            ..FieldMeta::new("grs_changed", FieldType::DateTime)
        });
        meta.fields.push(FieldMeta {
            required: true,
            stamp: Some(SaveStamp::CurrentUser),
            ..FieldMeta::new("grs_changed_by", FieldType::Numeric)
        });
        meta.fields.push(FieldMeta {
            required: true,
            join_field: true,
            ..FieldMeta::new("gor_name", FieldType::String)
        });
        meta
    }

    #[test]
    fn required_excludes_defaults_stamps_pairs_joins_and_keys() {
        let rules = derive_rules(&meta());
        assert_eq!(
            rules.required(),
            &HashSet::from(["grs_last_name".to_string()])
        );
    }

    #[test]
    fn bare_required_fields_get_an_implicit_type_validator() {
        let mut meta = MetaModel::new("m");
        meta.fields.push(FieldMeta {
            required: true,
            ..FieldMeta::new("amount", FieldType::Numeric)
        });
        let rules = derive_rules(&meta);
        let validators = rules.validators_for("amount").unwrap();
        assert!(validators.contains(&FieldValidator::NotEmpty));
        assert!(validators.contains(&FieldValidator::Numeric));
    }

    #[test]
    fn all_failures_accumulate() {
        let rules = derive_rules(&meta());
        let row = json!({
            "grs_last_name": "",
            "grs_changed": "never"
        });
        let err = validate_row(&rules, row.as_object().unwrap(), false).unwrap_err();
        let ModelError::Validation { message, errors } = err else {
            panic!("expected validation failure");
        };
        assert_eq!(message, "Errors were found when validating respondents");
        assert!(errors["grs_last_name"][0]
            .as_str()
            .unwrap()
            .contains("required"));
        assert!(errors["grs_changed"][0]
            .as_str()
            .unwrap()
            .contains("date-time"));
    }

    #[test]
    fn empty_optional_values_skip_validation() {
        let mut meta = MetaModel::new("m");
        meta.fields.push(FieldMeta::new("score", FieldType::Numeric));
        let rules = derive_rules(&meta);
        let row = json!({"score": ""});
        assert!(validate_row(&rules, row.as_object().unwrap(), false).is_ok());
    }

    #[test]
    fn partial_updates_skip_absent_required_fields() {
        let rules = derive_rules(&meta());
        let row = json!({"grs_changed": "2024-03-01T10:00:00"});
        assert!(validate_row(&rules, row.as_object().unwrap(), true).is_ok());
        let row = json!({"grs_last_name": ""});
        assert!(validate_row(&rules, row.as_object().unwrap(), true).is_err());
    }

    #[test]
    fn list_values_report_per_index() {
        let mut meta = MetaModel::new("m");
        meta.fields.push(FieldMeta {
            validators: vec![FieldValidator::Numeric],
            ..FieldMeta::new("scores", FieldType::String)
        });
        let rules = derive_rules(&meta);
        let row = json!({"scores": ["1", "oops", "3"]});
        let err = validate_row(&rules, row.as_object().unwrap(), false).unwrap_err();
        let ModelError::Validation { errors, .. } = err else {
            panic!("expected validation failure");
        };
        assert!(errors["scores"]["1"][0].as_str().unwrap().contains("number"));
        assert!(errors["scores"].get("0").is_none());
    }

    #[test]
    fn maxlength_is_enforced() {
        let rules = derive_rules(&meta());
        let row = json!({"grs_last_name": "x".repeat(31)});
        assert!(validate_row(&rules, row.as_object().unwrap(), false).is_err());
    }
}
