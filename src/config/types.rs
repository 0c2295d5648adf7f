//! Raw route-option types matching the JSON route configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reference to a field inside one of the access sets. A plain string names
/// a field of the route's model; an object nests a set for a child model,
/// keyed by the child field's internal name.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldRef {
    Name(String),
    Nested(HashMap<String, Vec<FieldRef>>),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdFieldConfig {
    Single(String),
    Composite(Vec<String>),
}

/// Multi-organization column: organization ids packed into one delimited
/// string column, filtered with per-id LIKE patterns.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MultiOrganizationConfig {
    pub field: String,
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_separator() -> String {
    "|".into()
}

/// One REST route as declared in configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RouteOptionsConfig {
    /// Route name; verb-specific names derive from this (`<name>.get` etc).
    pub name: String,
    pub path_segment: String,
    /// Model this route exposes, looked up in the model registry.
    pub model: String,
    /// Accepted HTTP methods, e.g. ["GET", "POST", "PATCH"].
    pub methods: Vec<String>,
    #[serde(default)]
    pub id_field: Option<IdFieldConfig>,
    #[serde(default)]
    pub items_per_page: Option<u64>,
    #[serde(default)]
    pub allowed_fields: Option<Vec<FieldRef>>,
    #[serde(default)]
    pub allowed_save_fields: Option<Vec<FieldRef>>,
    #[serde(default)]
    pub disallowed_fields: Option<Vec<FieldRef>>,
    #[serde(default)]
    pub readonly_fields: Option<Vec<FieldRef>>,
    /// Internal names filterable via the query string; defaults to every
    /// field of the model.
    #[serde(default)]
    pub allowed_filter_fields: Option<Vec<String>>,
    #[serde(default)]
    pub multi_organization_field: Option<MultiOrganizationConfig>,
    /// Field naming the respondent a row belongs to; its value is looked up
    /// on the addressed row and reported to the access log before
    /// destructive requests.
    #[serde(default)]
    pub respondent_id_field: Option<String>,
}

/// Top-level route file: a list of route declarations.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RoutesConfig {
    pub routes: Vec<RouteOptionsConfig>,
}
