//! Builds parameterized SELECT, INSERT, UPDATE, DELETE from model metadata
//! and compiled filter criteria.

use crate::model::{DefaultValue, FieldType, MetaModel, Row, SortDirection};
use crate::service::filter::{Criterion, FilterCriteria};
use crate::service::order::OrderSpec;
use crate::service::page::PageWindow;
use serde_json::Value;

/// Quote identifier for PostgreSQL (safe: only from model metadata).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf { sql: String::new(), params: Vec::new() }
    }

    fn push_param(&mut self, v: Value) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

/// Columns a storage row actually has; child and valueless fields live
/// outside the table.
fn stored_fields(meta: &MetaModel) -> impl Iterator<Item = &crate::model::FieldMeta> {
    meta.fields
        .iter()
        .filter(|f| !matches!(f.field_type, FieldType::ChildModel | FieldType::NoValue))
        .filter(|f| !f.join_field)
}

fn select_column_list(meta: &MetaModel) -> String {
    stored_fields(meta)
        .map(|f| quoted(&f.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// SQL cast for a bound value, so string-typed bindings land in temporal
/// and json columns.
fn cast(meta: &MetaModel, field: &str) -> Option<&'static str> {
    match meta.field(field)?.field_type {
        FieldType::Date => Some("date"),
        FieldType::DateTime => Some("timestamp"),
        FieldType::Time => Some("time"),
        FieldType::Json => Some("jsonb"),
        _ => None,
    }
}

fn placeholder(meta: &MetaModel, field: &str, n: usize) -> String {
    match cast(meta, field) {
        Some(t) => format!("${n}::{t}"),
        None => format!("${n}"),
    }
}

/// Render the WHERE clause for compiled criteria. Criteria naming fields
/// the model does not store are skipped.
fn where_clause(q: &mut QueryBuf, meta: &MetaModel, criteria: &FilterCriteria) -> String {
    let mut parts = Vec::new();
    for criterion in criteria.iter() {
        let field = match criterion {
            Criterion::Eq { field, .. }
            | Criterion::In { field, .. }
            | Criterion::Compare { field, .. }
            | Criterion::Null { field, .. }
            | Criterion::AnyLike { field, .. } => field,
        };
        if !meta.has(field) {
            continue;
        }
        match criterion {
            Criterion::Eq { field, value } => {
                if value.is_null() {
                    parts.push(format!("{} IS NULL", quoted(field)));
                } else {
                    let n = q.push_param(value.clone());
                    parts.push(format!("{} = {}", quoted(field), placeholder(meta, field, n)));
                }
            }
            Criterion::In { field, values } => {
                if values.is_empty() {
                    parts.push("1 = 0".to_string());
                } else {
                    let placeholders: Vec<String> = values
                        .iter()
                        .map(|v| {
                            let n = q.push_param(v.clone());
                            placeholder(meta, field, n)
                        })
                        .collect();
                    parts.push(format!(
                        "{} IN ({})",
                        quoted(field),
                        placeholders.join(", ")
                    ));
                }
            }
            Criterion::Compare { field, op, operand } => {
                let n = q.push_param(operand.clone());
                parts.push(format!(
                    "{} {} {}",
                    quoted(field),
                    op.sql(),
                    placeholder(meta, field, n)
                ));
            }
            Criterion::Null { field, negated } => {
                let check = if *negated { "IS NOT NULL" } else { "IS NULL" };
                parts.push(format!("{} {check}", quoted(field)));
            }
            Criterion::AnyLike { field, patterns } => {
                let likes: Vec<String> = patterns
                    .iter()
                    .map(|p| {
                        let n = q.push_param(Value::String(p.clone()));
                        format!("{} LIKE ${n}", quoted(field))
                    })
                    .collect();
                parts.push(format!("({})", likes.join(" OR ")));
            }
        }
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

fn order_clause(meta: &MetaModel, order: &OrderSpec) -> String {
    let terms: Vec<String> = order
        .terms()
        .iter()
        .filter(|t| meta.has(&t.field))
        .map(|t| match t.direction {
            Some(SortDirection::Asc) => format!("{} ASC", quoted(&t.field)),
            Some(SortDirection::Desc) => format!("{} DESC", quoted(&t.field)),
            None => quoted(&t.field),
        })
        .collect();
    if terms.is_empty() {
        String::new()
    } else {
        format!(" ORDER BY {}", terms.join(", "))
    }
}

pub fn select(
    schema: &str,
    table: &str,
    meta: &MetaModel,
    criteria: &FilterCriteria,
    order: &OrderSpec,
    window: Option<PageWindow>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, meta, criteria);
    let order_sql = order_clause(meta, order);
    let window_sql = window
        .map(|w| format!(" LIMIT {} OFFSET {}", w.limit, w.offset))
        .unwrap_or_default();
    q.sql = format!(
        "SELECT {} FROM {}{}{}{}",
        select_column_list(meta),
        qualified_table(schema, table),
        where_sql,
        order_sql,
        window_sql
    );
    q
}

pub fn count(schema: &str, table: &str, meta: &MetaModel, criteria: &FilterCriteria) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, meta, criteria);
    q.sql = format!(
        "SELECT COUNT(*) FROM {}{}",
        qualified_table(schema, table),
        where_sql
    );
    q
}

/// INSERT from a row. Absent columns with a declared default get the
/// default; expression defaults are inlined (they come from trusted model
/// metadata, never from the request).
pub fn insert(schema: &str, table: &str, meta: &MetaModel, row: &Row) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut values = Vec::new();
    for field in stored_fields(meta) {
        match row.get(&field.name) {
            Some(value) => {
                let n = q.push_param(value.clone());
                cols.push(quoted(&field.name));
                values.push(placeholder(meta, &field.name, n));
            }
            None => match &field.default {
                Some(DefaultValue::Value(v)) => {
                    let n = q.push_param(v.clone());
                    cols.push(quoted(&field.name));
                    values.push(placeholder(meta, &field.name, n));
                }
                Some(DefaultValue::Expression(expr)) => {
                    cols.push(quoted(&field.name));
                    values.push(expr.clone());
                }
                Some(DefaultValue::CurrentTimestamp) => {
                    cols.push(quoted(&field.name));
                    values.push("NOW()".to_string());
                }
                None => {}
            },
        }
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        qualified_table(schema, table),
        cols.join(", "),
        values.join(", "),
        select_column_list(meta)
    );
    q
}

/// UPDATE by key: SET the non-key columns present in the row.
pub fn update(schema: &str, table: &str, meta: &MetaModel, row: &Row) -> QueryBuf {
    let mut q = QueryBuf::new();
    let keys = meta.keys();
    let mut sets = Vec::new();
    for field in stored_fields(meta) {
        if field.key {
            continue;
        }
        if let Some(value) = row.get(&field.name) {
            let n = q.push_param(value.clone());
            sets.push(format!(
                "{} = {}",
                quoted(&field.name),
                placeholder(meta, &field.name, n)
            ));
        }
    }
    let mut wheres = Vec::new();
    for key in &keys {
        let value = row.get(*key).cloned().unwrap_or(Value::Null);
        let n = q.push_param(value);
        wheres.push(format!("{} = {}", quoted(key), placeholder(meta, key, n)));
    }
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} RETURNING {}",
        qualified_table(schema, table),
        sets.join(", "),
        wheres.join(" AND "),
        select_column_list(meta)
    );
    q
}

pub fn delete(schema: &str, table: &str, meta: &MetaModel, criteria: &FilterCriteria) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, meta, criteria);
    q.sql = format!("DELETE FROM {}{}", qualified_table(schema, table), where_sql);
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldMeta, SortTerm};
    use crate::service::filter::CompareOp;
    use serde_json::json;

    fn meta() -> MetaModel {
        let mut meta = MetaModel::new("tokens");
        meta.fields.push(FieldMeta {
            key: true,
            ..FieldMeta::new("gto_id_token", FieldType::String)
        });
        meta.fields.push(FieldMeta::new("gto_completed", FieldType::Numeric));
        meta.fields.push(FieldMeta::new("gto_valid_from", FieldType::DateTime));
        meta.fields.push(FieldMeta::new("episodes", FieldType::ChildModel));
        meta
    }

    #[test]
    fn select_skips_child_fields_and_casts_dates() {
        let mut criteria = FilterCriteria::new();
        criteria.push_raw(Criterion::Compare {
            field: "gto_valid_from".into(),
            op: CompareOp::Le,
            operand: json!("2024-01-01T00:00:00"),
        });
        let q = select(
            "gems",
            "gems__tokens",
            &meta(),
            &criteria,
            &OrderSpec::Terms(vec![SortTerm::desc("gto_valid_from")]),
            Some(PageWindow { limit: 10, offset: 20 }),
        );
        assert_eq!(
            q.sql,
            "SELECT \"gto_id_token\", \"gto_completed\", \"gto_valid_from\" \
             FROM \"gems\".\"gems__tokens\" \
             WHERE \"gto_valid_from\" <= $1::timestamp \
             ORDER BY \"gto_valid_from\" DESC LIMIT 10 OFFSET 20"
        );
        assert_eq!(q.params, vec![json!("2024-01-01T00:00:00")]);
    }

    #[test]
    fn unknown_filter_fields_are_skipped() {
        let mut criteria = FilterCriteria::new();
        criteria.set_eq("nonexistent", json!("x"));
        criteria.set_eq("gto_completed", json!(1));
        let q = count("gems", "gems__tokens", &meta(), &criteria);
        assert_eq!(
            q.sql,
            "SELECT COUNT(*) FROM \"gems\".\"gems__tokens\" WHERE \"gto_completed\" = $1"
        );
        assert_eq!(q.params, vec![json!(1)]);
    }

    #[test]
    fn empty_membership_matches_nothing() {
        let mut criteria = FilterCriteria::new();
        criteria.set_in("gto_completed", vec![]);
        let q = count("gems", "gems__tokens", &meta(), &criteria);
        assert!(q.sql.ends_with("WHERE 1 = 0"));
        assert!(q.params.is_empty());
    }

    #[test]
    fn any_like_renders_an_or_group() {
        let mut criteria = FilterCriteria::new();
        criteria.push_raw(Criterion::AnyLike {
            field: "gto_id_token".into(),
            patterns: vec!["%|7|%".into(), "%|9|%".into()],
        });
        let q = count("gems", "gems__tokens", &meta(), &criteria);
        assert!(q
            .sql
            .contains("(\"gto_id_token\" LIKE $1 OR \"gto_id_token\" LIKE $2)"));
        assert_eq!(q.params, vec![json!("%|7|%"), json!("%|9|%")]);
    }

    #[test]
    fn insert_applies_declared_defaults() {
        let mut meta = meta();
        meta.fields.push(FieldMeta {
            default: Some(DefaultValue::CurrentTimestamp),
            ..FieldMeta::new("gto_created", FieldType::DateTime)
        });
        let row = json!({"gto_id_token": "abcd-efgh", "gto_completed": 0});
        let q = insert("gems", "gems__tokens", &meta, row.as_object().unwrap());
        assert!(q.sql.contains("\"gto_created\""));
        assert!(q.sql.contains("NOW()"));
        assert!(q.sql.contains("RETURNING"));
        assert_eq!(q.params, vec![json!("abcd-efgh"), json!(0)]);
    }

    #[test]
    fn update_sets_non_keys_and_filters_on_keys() {
        let row = json!({"gto_id_token": "abcd", "gto_completed": 1});
        let q = update("gems", "gems__tokens", &meta(), row.as_object().unwrap());
        assert_eq!(
            q.sql,
            "UPDATE \"gems\".\"gems__tokens\" SET \"gto_completed\" = $1 \
             WHERE \"gto_id_token\" = $2 \
             RETURNING \"gto_id_token\", \"gto_completed\", \"gto_valid_from\""
        );
        assert_eq!(q.params, vec![json!(1), json!("abcd")]);
    }

    #[test]
    fn natural_order_emits_no_order_by() {
        let q = select(
            "gems",
            "gems__tokens",
            &meta(),
            &FilterCriteria::new(),
            &OrderSpec::Natural,
            None,
        );
        assert!(!q.sql.contains("ORDER BY"));
    }
}
