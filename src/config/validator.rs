//! Route-config validation against model metadata. Misaddressed id fields
//! are hard failures; stray names in the access sets only warn, matching
//! the forgiving behavior of hand-maintained route files.

use crate::config::{IdField, RouteConfig};
use crate::error::ConfigError;
use crate::model::MetaModel;
use crate::service::policy::FieldSet;
use tracing::warn;

pub fn validate_route(route: &RouteConfig, meta: &MetaModel) -> Result<(), ConfigError> {
    if let Some(id_field) = &route.id_field {
        let names: Vec<&str> = match id_field {
            IdField::Single(name) => vec![name.as_str()],
            IdField::Composite(names) => names.iter().map(String::as_str).collect(),
        };
        for name in names {
            if !meta.has(name) {
                return Err(ConfigError::UnknownField {
                    route: route.name.clone(),
                    field: name.to_string(),
                });
            }
        }
    } else if meta.keys().is_empty() {
        return Err(ConfigError::Validation(format!(
            "route {}: model {} declares no key fields and the route sets no id_field",
            route.name, route.model
        )));
    }

    for (label, set) in [
        ("allowed_fields", &route.allowed_fields),
        ("allowed_save_fields", &route.allowed_save_fields),
        ("disallowed_fields", &route.disallowed_fields),
        ("readonly_fields", &route.readonly_fields),
    ] {
        if let Some(set) = set {
            warn_unknown(route, meta, label, set);
        }
    }

    if let Some(filter_fields) = &route.allowed_filter_fields {
        for name in filter_fields {
            if !meta.has(name) {
                warn!(
                    route = %route.name,
                    field = %name,
                    "allowed_filter_fields names a field the model does not have"
                );
            }
        }
    }

    if let Some(field) = &route.respondent_id_field {
        if !meta.has(field) {
            warn!(
                route = %route.name,
                field = %field,
                "respondent_id_field is not a model field"
            );
        }
    }

    if let Some(org) = &route.multi_organization {
        if !meta.has(&org.field) {
            warn!(
                route = %route.name,
                field = %org.field,
                "multi_organization_field is not a model field"
            );
        }
    }

    Ok(())
}

fn warn_unknown(route: &RouteConfig, meta: &MetaModel, label: &str, set: &FieldSet) {
    for name in set.names() {
        if !meta.has(name) {
            warn!(route = %route.name, field = %name, set = %label, "unknown field in access set");
        }
    }
    for (key, child_set) in set.children() {
        match meta.field(key).and_then(|f| f.child.as_deref()) {
            Some(child_meta) => warn_unknown(route, child_meta, label, child_set),
            None => {
                warn!(route = %route.name, field = %key, set = %label, "nested set on a field without a child model");
            }
        }
    }
}
