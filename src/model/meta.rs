//! Model metadata: per-field attributes driving translation, policy,
//! validation and storage. The runtime equivalent of the config-resolved
//! entity description.

use serde_json::Value;

/// Coarse field type tag, as reported by the structure endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldType {
    String,
    Numeric,
    Date,
    DateTime,
    Time,
    ChildModel,
    Json,
    NoValue,
}

impl FieldType {
    pub fn tag(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Numeric => "numeric",
            FieldType::Date => "date",
            FieldType::DateTime => "datetime",
            FieldType::Time => "time",
            FieldType::ChildModel => "child_model",
            FieldType::Json => "json",
            FieldType::NoValue => "no_value",
        }
    }
}

/// Value stamped into a column by the save path, independent of client input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveStamp {
    /// Column tracks who wrote the row (`*_by` columns).
    CurrentUser,
    /// Column tracks when the row was written.
    Now,
}

/// Declared default for a field. Expressions and current-timestamp defaults
/// are evaluated by the storage engine, not by this layer.
#[derive(Clone, Debug, PartialEq)]
pub enum DefaultValue {
    Value(Value),
    Expression(String),
    CurrentTimestamp,
}

impl DefaultValue {
    /// Primitive representation for the structure endpoint.
    pub fn as_primitive(&self) -> Value {
        match self {
            DefaultValue::Value(v) => v.clone(),
            DefaultValue::Expression(e) => Value::String(e.clone()),
            DefaultValue::CurrentTimestamp => Value::String("NOW()".into()),
        }
    }
}

/// Declared validator for a field. Implicit validators (not-empty, type
/// checks) are derived at save time, not declared here.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValidator {
    NotEmpty,
    Numeric,
    Date,
    DateTime,
    MaxLength(u32),
    MinLength(u32),
    Pattern(String),
    OneOf(Vec<Value>),
    Minimum(f64),
    Maximum(f64),
    Email,
    Uuid,
}

/// Sort direction for an order term. Unmarked terms carry `None` and use
/// the storage engine's natural direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SortTerm {
    pub field: String,
    pub direction: Option<SortDirection>,
}

impl SortTerm {
    pub fn asc(field: impl Into<String>) -> Self {
        SortTerm { field: field.into(), direction: Some(SortDirection::Asc) }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        SortTerm { field: field.into(), direction: Some(SortDirection::Desc) }
    }
}

#[derive(Clone, Debug)]
pub struct FieldMeta {
    /// Internal (storage) name.
    pub name: String,
    /// External name exposed over the API, when it differs from `name`.
    pub api_name: Option<String>,
    pub label: Option<String>,
    pub description: Option<String>,
    pub field_type: FieldType,
    pub required: bool,
    /// Part of the primary key.
    pub key: bool,
    pub default: Option<DefaultValue>,
    pub size: Option<u32>,
    pub maxlength: Option<u32>,
    /// Choice fields: option value -> display label.
    pub multi_options: Option<Value>,
    /// Model-level widening of the route's load-allow set.
    pub allow_api_load: bool,
    /// Model-level widening of the route's save-allow set.
    pub allow_api_save: bool,
    /// Sourced from a join relation; never required input.
    pub join_field: bool,
    pub stamp: Option<SaveStamp>,
    /// When false, required fields do not get the implicit not-empty validator.
    pub auto_not_empty: bool,
    pub validators: Vec<FieldValidator>,
    /// Nested sub-resource embedded under this field's key.
    pub child: Option<Box<MetaModel>>,
}

impl FieldMeta {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        FieldMeta {
            name: name.into(),
            api_name: None,
            label: None,
            description: None,
            field_type,
            required: false,
            key: false,
            default: None,
            size: None,
            maxlength: None,
            multi_options: None,
            allow_api_load: false,
            allow_api_save: false,
            join_field: false,
            stamp: None,
            auto_not_empty: true,
            validators: Vec::new(),
            child: None,
        }
    }

    /// External name: api name when set, internal name otherwise.
    pub fn external_name(&self) -> &str {
        self.api_name.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Clone, Debug)]
pub struct MetaModel {
    pub name: String,
    /// Ordered field list; order is preserved in structure reports.
    pub fields: Vec<FieldMeta>,
    pub default_sort: Vec<SortTerm>,
}

impl MetaModel {
    pub fn new(name: impl Into<String>) -> Self {
        MetaModel { name: name.into(), fields: Vec::new(), default_sort: Vec::new() }
    }

    pub fn field(&self, name: &str) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// All internal field names, child fields included.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Primary key field names, in field order.
    pub fn keys(&self) -> Vec<&str> {
        self.fields.iter().filter(|f| f.key).map(|f| f.name.as_str()).collect()
    }

    /// The single id field when the key is not composite.
    pub fn id_field(&self) -> Option<&str> {
        let keys = self.keys();
        match keys.as_slice() {
            [single] => Some(single),
            _ => None,
        }
    }
}
