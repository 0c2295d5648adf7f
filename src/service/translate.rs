//! Field-name translation between internal and external ("api") names,
//! recursive over child models, plus ISO timestamp formatting on the way out.

use crate::model::{MetaModel, Row};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Clone, Debug, Default)]
struct Entry {
    /// Target name; `None` passes the key through unchanged.
    rename: Option<String>,
    /// Nested map for child-model fields.
    child: Option<TranslationMap>,
}

/// A possibly-nested field-name mapping. Built internal->external from model
/// metadata; [`TranslationMap::reverse`] flips every level for the inbound
/// direction.
#[derive(Clone, Debug, Default)]
pub struct TranslationMap {
    entries: HashMap<String, Entry>,
}

impl TranslationMap {
    /// Build the internal->external map for a model, nesting child models
    /// under their field's internal name.
    pub fn build(meta: &MetaModel) -> Self {
        let mut entries = HashMap::new();
        for field in &meta.fields {
            if let Some(child) = &field.child {
                entries.insert(
                    field.name.clone(),
                    Entry {
                        rename: field.api_name.clone(),
                        child: Some(TranslationMap::build(child)),
                    },
                );
            } else if let Some(api) = &field.api_name {
                entries.insert(
                    field.name.clone(),
                    Entry { rename: Some(api.clone()), child: None },
                );
            }
        }
        TranslationMap { entries }
    }

    /// Flip the mapping at every level. Child maps are re-keyed under the
    /// field's external name so inbound payloads resolve correctly.
    pub fn reverse(&self) -> Self {
        let mut entries = HashMap::new();
        for (key, entry) in &self.entries {
            let new_key = entry.rename.clone().unwrap_or_else(|| key.clone());
            let rename = entry.rename.as_ref().map(|_| key.clone());
            entries.insert(
                new_key,
                Entry { rename, child: entry.child.as_ref().map(|c| c.reverse()) },
            );
        }
        TranslationMap { entries }
    }

    /// Translate a single name; identity when unmapped.
    pub fn name<'a>(&'a self, key: &'a str) -> &'a str {
        self.entries
            .get(key)
            .and_then(|e| e.rename.as_deref())
            .unwrap_or(key)
    }

    /// Rename the keys of a row. Child-model fields whose value is an array
    /// of sub-rows are translated recursively, preserving element order;
    /// bare date-time values are formatted as RFC 3339 with a UTC offset.
    pub fn translate_row(&self, row: Row) -> Row {
        let mut out = Row::new();
        for (key, value) in row {
            let entry = self.entries.get(&key);
            let target = entry
                .and_then(|e| e.rename.clone())
                .unwrap_or_else(|| key.clone());

            if let (Some(child), Value::Array(items)) =
                (entry.and_then(|e| e.child.as_ref()), &value)
            {
                let translated: Vec<Value> = items
                    .iter()
                    .map(|item| match item {
                        Value::Object(sub) => Value::Object(child.translate_row(sub.clone())),
                        other => other.clone(),
                    })
                    .collect();
                out.insert(target, Value::Array(translated));
                continue;
            }

            out.insert(target, atomize(value));
        }
        out
    }
}

/// Format naive date-time strings as RFC 3339 with a UTC offset; everything
/// else passes through unchanged.
fn atomize(value: Value) -> Value {
    if let Value::String(s) = &value {
        if let Some(formatted) = iso_datetime(s) {
            return Value::String(formatted);
        }
    }
    value
}

fn iso_datetime(s: &str) -> Option<String> {
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()?;
    Some(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc).to_rfc3339())
}
