//! Resolved route configuration: raw options parsed and flattened for
//! runtime use by the handlers and the policy layer.

use crate::config::types::{
    FieldRef, IdFieldConfig, MultiOrganizationConfig, RouteOptionsConfig, RoutesConfig,
};
use crate::error::ConfigError;
use crate::service::policy::FieldSet;
use axum::http::Method;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdField {
    Single(String),
    Composite(Vec<String>),
}

impl IdField {
    pub fn names(&self) -> Vec<&str> {
        match self {
            IdField::Single(name) => vec![name.as_str()],
            IdField::Composite(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultiOrganizationField {
    pub field: String,
    pub separator: String,
}

#[derive(Clone, Debug)]
pub struct RouteConfig {
    pub name: String,
    pub path_segment: String,
    pub model: String,
    pub methods: Vec<Method>,
    /// Key fields addressed by the item path; falls back to the model's
    /// declared keys when absent.
    pub id_field: Option<IdField>,
    pub items_per_page: Option<u64>,
    pub allowed_fields: Option<FieldSet>,
    pub allowed_save_fields: Option<FieldSet>,
    pub disallowed_fields: Option<FieldSet>,
    pub readonly_fields: Option<FieldSet>,
    pub allowed_filter_fields: Option<HashSet<String>>,
    pub multi_organization: Option<MultiOrganizationField>,
    /// Respondent id column reported to the access log on destructive
    /// requests.
    pub respondent_id_field: Option<String>,
}

impl RouteConfig {
    pub fn resolve(raw: &RouteOptionsConfig) -> Result<Self, ConfigError> {
        let mut methods = Vec::with_capacity(raw.methods.len());
        for m in &raw.methods {
            let method = supported_method(m).ok_or_else(|| {
                ConfigError::Validation(format!("route {}: unsupported method {m:?}", raw.name))
            })?;
            methods.push(method);
        }

        Ok(RouteConfig {
            name: raw.name.clone(),
            path_segment: raw.path_segment.clone(),
            model: raw.model.clone(),
            methods,
            id_field: raw.id_field.as_ref().map(|id| match id {
                IdFieldConfig::Single(name) => IdField::Single(name.clone()),
                IdFieldConfig::Composite(names) => IdField::Composite(names.clone()),
            }),
            items_per_page: raw.items_per_page,
            allowed_fields: raw.allowed_fields.as_deref().map(field_set),
            allowed_save_fields: raw.allowed_save_fields.as_deref().map(field_set),
            disallowed_fields: raw.disallowed_fields.as_deref().map(field_set),
            readonly_fields: raw.readonly_fields.as_deref().map(field_set),
            allowed_filter_fields: raw
                .allowed_filter_fields
                .as_ref()
                .map(|names| names.iter().cloned().collect()),
            multi_organization: raw.multi_organization_field.as_ref().map(
                |MultiOrganizationConfig { field, separator }| MultiOrganizationField {
                    field: field.clone(),
                    separator: separator.clone(),
                },
            ),
            respondent_id_field: raw.respondent_id_field.clone(),
        })
    }

    pub fn allows_method(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }

    #[cfg(test)]
    pub fn for_tests(segment: &str, model: &str) -> Self {
        RouteConfig {
            name: segment.to_string(),
            path_segment: segment.to_string(),
            model: model.to_string(),
            methods: vec![Method::GET, Method::POST, Method::PATCH, Method::DELETE],
            id_field: None,
            items_per_page: None,
            allowed_fields: None,
            allowed_save_fields: None,
            disallowed_fields: None,
            readonly_fields: None,
            allowed_filter_fields: None,
            multi_organization: None,
            respondent_id_field: None,
        }
    }
}

/// The verbs the handlers dispatch on; anything else is a config mistake,
/// not a method the router could ever serve.
fn supported_method(m: &str) -> Option<Method> {
    match m.to_uppercase().as_str() {
        "GET" => Some(Method::GET),
        "POST" => Some(Method::POST),
        "PATCH" => Some(Method::PATCH),
        "DELETE" => Some(Method::DELETE),
        "OPTIONS" => Some(Method::OPTIONS),
        _ => None,
    }
}

fn field_set(refs: &[FieldRef]) -> FieldSet {
    let mut set = FieldSet::default();
    for r in refs {
        match r {
            FieldRef::Name(name) => set.insert(name.clone()),
            FieldRef::Nested(children) => {
                for (key, child_refs) in children {
                    set.insert_child(key.clone(), field_set(child_refs));
                }
            }
        }
    }
    set
}

/// All resolved routes, indexed by path segment and by route name.
#[derive(Clone, Debug, Default)]
pub struct RouteMap {
    by_segment: HashMap<String, Arc<RouteConfig>>,
    by_name: HashMap<String, Arc<RouteConfig>>,
}

impl RouteMap {
    pub fn resolve(raw: &RoutesConfig) -> Result<Self, ConfigError> {
        let mut map = RouteMap::default();
        for route in &raw.routes {
            map.insert(RouteConfig::resolve(route)?)?;
        }
        Ok(map)
    }

    pub fn insert(&mut self, route: RouteConfig) -> Result<(), ConfigError> {
        if self.by_segment.contains_key(&route.path_segment) {
            return Err(ConfigError::DuplicatePathSegment(route.path_segment));
        }
        let route = Arc::new(route);
        self.by_segment.insert(route.path_segment.clone(), Arc::clone(&route));
        self.by_name.insert(route.name.clone(), route);
        Ok(())
    }

    pub fn by_segment(&self, segment: &str) -> Option<&Arc<RouteConfig>> {
        self.by_segment.get(segment)
    }

    pub fn by_name(&self, name: &str) -> Option<&Arc<RouteConfig>> {
        self.by_name.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<RouteConfig>> {
        self.by_segment.values()
    }
}
