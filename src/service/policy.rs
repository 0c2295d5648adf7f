//! Field access policy: allow/disallow/readonly sets merged from route
//! options and model-level flags, projected over possibly-nested rows.

use crate::config::RouteConfig;
use crate::model::{MetaModel, Row};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// A set of field names, possibly nested per child-model key.
#[derive(Clone, Debug, Default)]
pub struct FieldSet {
    names: HashSet<String>,
    children: HashMap<String, FieldSet>,
}

impl FieldSet {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldSet {
            names: names.into_iter().map(Into::into).collect(),
            children: HashMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    pub fn insert_child(&mut self, key: impl Into<String>, child: FieldSet) {
        self.children.insert(key.into(), child);
    }

    /// Membership: a plain name, or a child-model key.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name) || self.children.contains_key(name)
    }

    pub fn child(&self, name: &str) -> Option<&FieldSet> {
        self.children.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.children.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &FieldSet)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn merge(&mut self, other: &FieldSet) {
        self.names.extend(other.names.iter().cloned());
        for (key, child) in &other.children {
            self.children.entry(key.clone()).or_default().merge(child);
        }
    }
}

/// The four optional field sets governing visibility and writability.
/// Disallow and readonly always win over the allow sets.
#[derive(Clone, Debug, Default)]
pub struct AccessPolicy {
    pub allowed: Option<FieldSet>,
    pub allowed_save: Option<FieldSet>,
    pub disallowed: Option<FieldSet>,
    pub readonly: Option<FieldSet>,
}

impl AccessPolicy {
    /// Merge route-level sets with model-level allow flags. Model flags only
    /// ever widen the allow sets; they cannot lift a disallow or readonly.
    pub fn for_route(config: &RouteConfig, meta: &MetaModel) -> Self {
        let mut policy = AccessPolicy {
            allowed: config.allowed_fields.clone(),
            allowed_save: config.allowed_save_fields.clone(),
            disallowed: config.disallowed_fields.clone(),
            readonly: config.readonly_fields.clone(),
        };

        let (load_flags, save_flags) = model_flags(meta);
        if let Some(flags) = load_flags {
            policy.allowed.get_or_insert_with(FieldSet::default).merge(&flags);
        }
        if let Some(flags) = save_flags {
            policy.allowed_save.get_or_insert_with(FieldSet::default).merge(&flags);
        }
        policy
    }

    /// Project a row: apply the allow set (save-allow first when saving),
    /// then remove disallowed members, then readonly members when saving.
    /// Child rows recurse with the per-child sub-policy.
    pub fn project(&self, row: Row, for_save: bool) -> Row {
        let allow = if for_save && self.allowed_save.is_some() {
            self.allowed_save.as_ref()
        } else {
            self.allowed.as_ref()
        };

        let mut out = Row::new();
        for (key, value) in row {
            if let Some(allow) = allow {
                if !allow.contains(&key) {
                    continue;
                }
            }
            if self.disallowed.as_ref().is_some_and(|set| set.contains(&key)) {
                continue;
            }
            if for_save && self.readonly.as_ref().is_some_and(|set| set.contains(&key)) {
                continue;
            }

            let sub = self.sub_policy(&key, for_save);
            if let (Some(sub), Value::Array(items)) = (sub, &value) {
                let projected: Vec<Value> = items
                    .iter()
                    .map(|item| match item {
                        Value::Object(sub_row) => {
                            Value::Object(sub.project(sub_row.clone(), for_save))
                        }
                        other => other.clone(),
                    })
                    .collect();
                out.insert(key, Value::Array(projected));
                continue;
            }

            out.insert(key, value);
        }
        out
    }

    /// Filter a plain list of names (the by-value mode used when reporting
    /// structure, where there is no row to recurse into).
    pub fn project_names(&self, names: Vec<String>, for_save: bool) -> Vec<String> {
        names
            .into_iter()
            .filter(|name| self.allows(name, for_save))
            .collect()
    }

    /// Would a field of this name survive projection?
    pub fn allows(&self, name: &str, for_save: bool) -> bool {
        let allow = if for_save && self.allowed_save.is_some() {
            self.allowed_save.as_ref()
        } else {
            self.allowed.as_ref()
        };
        if let Some(allow) = allow {
            if !allow.contains(name) {
                return false;
            }
        }
        if self.disallowed.as_ref().is_some_and(|set| set.contains(name)) {
            return false;
        }
        if for_save && self.readonly.as_ref().is_some_and(|set| set.contains(name)) {
            return false;
        }
        true
    }

    /// Policy scoped to one child-model key. `None` when no set nests there.
    pub fn sub_policy(&self, key: &str, for_save: bool) -> Option<AccessPolicy> {
        let allowed = self.allowed.as_ref().and_then(|s| s.child(key)).cloned();
        let allowed_save = self.allowed_save.as_ref().and_then(|s| s.child(key)).cloned();
        let disallowed = self.disallowed.as_ref().and_then(|s| s.child(key)).cloned();
        let readonly = self.readonly.as_ref().and_then(|s| s.child(key)).cloned();
        if allowed.is_none()
            && allowed_save.is_none()
            && disallowed.is_none()
            && (!for_save || readonly.is_none())
        {
            return None;
        }
        Some(AccessPolicy { allowed, allowed_save, disallowed, readonly })
    }
}

/// Collect model-level allow flags, recursing into child models.
fn model_flags(meta: &MetaModel) -> (Option<FieldSet>, Option<FieldSet>) {
    let mut load: Option<FieldSet> = None;
    let mut save: Option<FieldSet> = None;
    for field in &meta.fields {
        if field.allow_api_load {
            load.get_or_insert_with(FieldSet::default).insert(&field.name);
        }
        if field.allow_api_save {
            save.get_or_insert_with(FieldSet::default).insert(&field.name);
        }
        if let Some(child) = &field.child {
            let (child_load, child_save) = model_flags(child);
            if let Some(child_load) = child_load {
                let set = load.get_or_insert_with(FieldSet::default);
                set.insert_child(&field.name, child_load);
            }
            if let Some(child_save) = child_save {
                let set = save.get_or_insert_with(FieldSet::default);
                set.insert_child(&field.name, child_save);
            }
        }
    }
    (load, save)
}
