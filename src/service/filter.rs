//! Compiles HTTP query parameters into structured filter criteria: simple
//! equality/membership, bracket-operator expressions, null checks, and the
//! multi-organization OR-group.

use crate::config::MultiOrganizationField;
use crate::service::translate::TranslationMap;
use serde_json::{Number, Value};
use std::collections::HashSet;

/// Query keys consumed by pagination and ordering, never treated as filters.
pub const RESERVED_KEYS: [&str; 3] = ["page", "per_page", "order"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Gt,
    Le,
    Ge,
    Ne,
    Like,
    NotLike,
}

impl CompareOp {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "<" => Some(CompareOp::Lt),
            ">" => Some(CompareOp::Gt),
            "<=" => Some(CompareOp::Le),
            ">=" => Some(CompareOp::Ge),
            "!=" => Some(CompareOp::Ne),
            "LIKE" => Some(CompareOp::Like),
            "NOT LIKE" => Some(CompareOp::NotLike),
            _ => None,
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::Le => "<=",
            CompareOp::Ge => ">=",
            CompareOp::Ne => "!=",
            CompareOp::Like => "LIKE",
            CompareOp::NotLike => "NOT LIKE",
        }
    }
}

/// One compiled condition. `Eq` and `In` carry map semantics (latest wins
/// per field); the raw variants always accumulate.
#[derive(Clone, Debug, PartialEq)]
pub enum Criterion {
    Eq { field: String, value: Value },
    In { field: String, values: Vec<Value> },
    Compare { field: String, op: CompareOp, operand: Value },
    Null { field: String, negated: bool },
    /// OR-group of LIKE patterns over one field (organization multiplexing).
    AnyLike { field: String, patterns: Vec<String> },
}

#[derive(Clone, Debug, Default)]
pub struct FilterCriteria {
    entries: Vec<Criterion>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        FilterCriteria::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Criterion> {
        self.entries.iter()
    }

    /// Equality with overwrite-by-field semantics.
    pub fn set_eq(&mut self, field: impl Into<String>, value: Value) {
        let field = field.into();
        self.remove_keyed(&field);
        self.entries.push(Criterion::Eq { field, value });
    }

    /// Membership list with overwrite-by-field semantics.
    pub fn set_in(&mut self, field: impl Into<String>, values: Vec<Value>) {
        let field = field.into();
        self.remove_keyed(&field);
        self.entries.push(Criterion::In { field, values });
    }

    /// Raw criteria accumulate; they never overwrite each other.
    pub fn push_raw(&mut self, criterion: Criterion) {
        self.entries.push(criterion);
    }

    fn remove_keyed(&mut self, field: &str) {
        self.entries.retain(|c| match c {
            Criterion::Eq { field: f, .. } | Criterion::In { field: f, .. } => f != field,
            _ => true,
        });
    }
}

/// A query parameter value: single, or repeated in the query string.
#[derive(Clone, Debug)]
pub enum ParamValue {
    One(String),
    Many(Vec<String>),
}

/// Group raw key/value pairs; repeated keys become `Many`.
pub fn group_params(pairs: Vec<(String, String)>) -> Vec<(String, ParamValue)> {
    let mut out: Vec<(String, ParamValue)> = Vec::new();
    for (key, value) in pairs {
        if let Some((_, existing)) = out.iter_mut().find(|(k, _)| *k == key) {
            match existing {
                ParamValue::One(first) => {
                    *existing = ParamValue::Many(vec![std::mem::take(first), value]);
                }
                ParamValue::Many(values) => values.push(value),
            }
        } else {
            out.push((key, ParamValue::One(value)));
        }
    }
    out
}

pub struct FilterContext<'a> {
    /// External->internal name map.
    pub reverse_map: &'a TranslationMap,
    /// Internal names that may be filtered on; anything else is skipped.
    pub allowed_fields: &'a HashSet<String>,
    pub multi_organization: Option<&'a MultiOrganizationField>,
}

/// Compile query parameters into criteria. See the module docs for the
/// accepted bracket mini-syntax.
pub fn compile(params: &[(String, ParamValue)], ctx: &FilterContext<'_>) -> FilterCriteria {
    let mut criteria = FilterCriteria::new();

    for (key, value) in params {
        if RESERVED_KEYS.contains(&key.as_str()) {
            continue;
        }

        if let Some(org) = ctx.multi_organization {
            if *key == org.field {
                compile_organizations(&mut criteria, org, value);
                continue;
            }
        }

        let field = ctx.reverse_map.name(key).to_string();
        if !ctx.allowed_fields.contains(&field) {
            continue;
        }

        match value {
            ParamValue::One(raw) => compile_scalar(&mut criteria, field, raw),
            ParamValue::Many(values) => {
                criteria.set_in(field, values.iter().map(|v| Value::String(v.clone())).collect());
            }
        }
    }

    criteria
}

fn compile_scalar(criteria: &mut FilterCriteria, field: String, raw: &str) {
    if raw.starts_with('[') && raw.ends_with(']') {
        let inner = &raw[1..raw.len() - 1];
        let tokens: Vec<&str> = inner.split(',').collect();
        if let Some(op) = tokens.first().and_then(|t| CompareOp::parse(t)) {
            let last = tokens.last().copied().unwrap_or_default();
            let operand = match op {
                // LIKE operands stay textual; the storage layer binds them.
                CompareOp::Like | CompareOp::NotLike => Value::String(last.to_string()),
                _ => coerce_numeric(last),
            };
            criteria.push_raw(Criterion::Compare { field, op, operand });
        } else {
            criteria.set_in(
                field,
                tokens.iter().map(|t| Value::String((*t).to_string())).collect(),
            );
        }
        return;
    }

    match raw.to_uppercase().as_str() {
        "IS NULL" => criteria.push_raw(Criterion::Null { field, negated: false }),
        "IS NOT NULL" => criteria.push_raw(Criterion::Null { field, negated: true }),
        _ => criteria.set_eq(field, Value::String(raw.to_string())),
    }
}

fn compile_organizations(
    criteria: &mut FilterCriteria,
    org: &MultiOrganizationField,
    value: &ParamValue,
) {
    let ids: Vec<String> = match value {
        ParamValue::One(s) => s.split(',').map(|id| id.trim().to_string()).collect(),
        ParamValue::Many(values) => values.clone(),
    };
    let patterns: Vec<String> = ids
        .iter()
        .filter(|id| !id.is_empty())
        .map(|id| format!("%{sep}{id}{sep}%", sep = org.separator, id = id))
        .collect();
    if !patterns.is_empty() {
        criteria.push_raw(Criterion::AnyLike { field: org.field.clone(), patterns });
    }
}

/// Numeric-looking operands become integers when they parse exactly as one,
/// floats otherwise; everything else stays a string.
fn coerce_numeric(token: &str) -> Value {
    if let Ok(i) = token.parse::<i64>() {
        return Value::Number(Number::from(i));
    }
    if let Ok(f) = token.parse::<f64>() {
        if let Some(n) = Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx<'a>(
        allowed: &'a HashSet<String>,
        org: Option<&'a MultiOrganizationField>,
        rev: &'a TranslationMap,
    ) -> FilterContext<'a> {
        FilterContext { reverse_map: rev, allowed_fields: allowed, multi_organization: org }
    }

    fn allowed(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn one(key: &str, value: &str) -> (String, ParamValue) {
        (key.to_string(), ParamValue::One(value.to_string()))
    }

    #[test]
    fn reserved_keys_are_dropped() {
        let rev = TranslationMap::default();
        let fields = allowed(&["status"]);
        let params = vec![one("page", "2"), one("per_page", "10"), one("order", "status")];
        let criteria = compile(&params, &ctx(&fields, None, &rev));
        assert!(criteria.is_empty());
    }

    #[test]
    fn bracket_operator_coerces_numeric_operands() {
        let rev = TranslationMap::default();
        let fields = allowed(&["grc_success", "gto_score"]);
        let params = vec![one("gto_score", "[>=,12]"), one("grc_success", "[!=,1.5]")];
        let criteria = compile(&params, &ctx(&fields, None, &rev));
        let items: Vec<_> = criteria.iter().collect();
        assert_eq!(
            items[0],
            &Criterion::Compare {
                field: "gto_score".into(),
                op: CompareOp::Ge,
                operand: json!(12)
            }
        );
        assert_eq!(
            items[1],
            &Criterion::Compare {
                field: "grc_success".into(),
                op: CompareOp::Ne,
                operand: json!(1.5)
            }
        );
    }

    #[test]
    fn integer_operands_keep_full_precision() {
        // Above 2^53, a float round-trip would silently change the value.
        let rev = TranslationMap::default();
        let fields = allowed(&["gto_score"]);
        let params = vec![one("gto_score", "[>,9007199254740993]")];
        let criteria = compile(&params, &ctx(&fields, None, &rev));
        assert_eq!(
            criteria.iter().next().unwrap(),
            &Criterion::Compare {
                field: "gto_score".into(),
                op: CompareOp::Gt,
                operand: json!(9007199254740993i64)
            }
        );
    }

    #[test]
    fn like_operands_stay_textual() {
        let rev = TranslationMap::default();
        let fields = allowed(&["gto_subject"]);
        let params = vec![one("gto_subject", "[LIKE,10]")];
        let criteria = compile(&params, &ctx(&fields, None, &rev));
        assert_eq!(
            criteria.iter().next().unwrap(),
            &Criterion::Compare {
                field: "gto_subject".into(),
                op: CompareOp::Like,
                operand: json!("10")
            }
        );
    }

    #[test]
    fn bracket_without_operator_is_membership() {
        let rev = TranslationMap::default();
        let fields = allowed(&["status"]);
        let params = vec![one("status", "[open,closed]")];
        let criteria = compile(&params, &ctx(&fields, None, &rev));
        assert_eq!(
            criteria.iter().next().unwrap(),
            &Criterion::In {
                field: "status".into(),
                values: vec![json!("open"), json!("closed")]
            }
        );
    }

    #[test]
    fn null_checks_and_equality() {
        let rev = TranslationMap::default();
        let fields = allowed(&["a", "b", "c"]);
        let params = vec![one("a", "is null"), one("b", "IS NOT NULL"), one("c", "x")];
        let criteria = compile(&params, &ctx(&fields, None, &rev));
        let items: Vec<_> = criteria.iter().collect();
        assert_eq!(items[0], &Criterion::Null { field: "a".into(), negated: false });
        assert_eq!(items[1], &Criterion::Null { field: "b".into(), negated: true });
        assert_eq!(items[2], &Criterion::Eq { field: "c".into(), value: json!("x") });
    }

    #[test]
    fn repeated_simple_keys_overwrite_raw_accumulates() {
        let mut criteria = FilterCriteria::new();
        criteria.set_eq("status", json!("open"));
        criteria.set_eq("status", json!("closed"));
        criteria.push_raw(Criterion::Null { field: "status".into(), negated: false });
        criteria.push_raw(Criterion::Null { field: "status".into(), negated: true });
        let items: Vec<_> = criteria.iter().collect();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], &Criterion::Eq { field: "status".into(), value: json!("closed") });
    }

    #[test]
    fn disallowed_fields_are_skipped() {
        let rev = TranslationMap::default();
        let fields = allowed(&["known"]);
        let params = vec![one("secret", "1"), one("known", "2")];
        let criteria = compile(&params, &ctx(&fields, None, &rev));
        assert_eq!(criteria.iter().count(), 1);
    }

    #[test]
    fn organization_filter_builds_or_group() {
        let rev = TranslationMap::default();
        let fields = allowed(&[]);
        let org = MultiOrganizationField {
            field: "gr2o_organizations".into(),
            separator: "|".into(),
        };
        let params = vec![one("gr2o_organizations", "7,9")];
        let criteria = compile(&params, &ctx(&fields, Some(&org), &rev));
        assert_eq!(
            criteria.iter().next().unwrap(),
            &Criterion::AnyLike {
                field: "gr2o_organizations".into(),
                patterns: vec!["%|7|%".into(), "%|9|%".into()]
            }
        );
    }

    #[test]
    fn repeated_query_keys_become_membership() {
        let grouped = group_params(vec![
            ("status".into(), "open".into()),
            ("status".into(), "closed".into()),
        ]);
        let rev = TranslationMap::default();
        let fields = allowed(&["status"]);
        let criteria = compile(&grouped, &ctx(&fields, None, &rev));
        assert_eq!(
            criteria.iter().next().unwrap(),
            &Criterion::In {
                field: "status".into(),
                values: vec![json!("open"), json!("closed")]
            }
        );
    }
}
