//! The structure report: field metadata as exposed by `GET /<segment>/structure`.

use crate::model::{FieldType, MetaModel};
use crate::service::policy::AccessPolicy;
use serde_json::{json, Map, Value};

/// Describe the model's fields, keyed by external name and filtered through
/// the route policy. Child models nest their own report under the field key.
pub fn structure(meta: &MetaModel, policy: &AccessPolicy) -> Value {
    let mut out = Map::new();
    for field in &meta.fields {
        if !policy.allows(&field.name, false) {
            continue;
        }

        if let Some(child) = &field.child {
            let sub = policy
                .sub_policy(&field.name, false)
                .unwrap_or_default();
            out.insert(
                field.external_name().to_string(),
                json!({
                    "name": field.name,
                    "type": FieldType::ChildModel.tag(),
                    "model": structure(child, &sub),
                }),
            );
            continue;
        }

        let mut entry = Map::new();
        entry.insert("name".into(), json!(field.name));
        entry.insert("type".into(), json!(field.field_type.tag()));
        entry.insert("required".into(), json!(field.required));
        if let Some(label) = &field.label {
            entry.insert("label".into(), json!(label));
        }
        if let Some(description) = &field.description {
            entry.insert("description".into(), json!(description));
        }
        if let Some(size) = field.size {
            entry.insert("size".into(), json!(size));
        }
        if let Some(maxlength) = field.maxlength {
            entry.insert("maxlength".into(), json!(maxlength));
        }
        if let Some(default) = &field.default {
            entry.insert("default".into(), default.as_primitive());
        }
        if let Some(options) = &field.multi_options {
            entry.insert("multiOptions".into(), options.clone());
        }
        out.insert(field.external_name().to_string(), Value::Object(entry));
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DefaultValue, FieldMeta};
    use crate::service::policy::FieldSet;

    #[test]
    fn reports_external_names_policy_and_children() {
        let mut child = MetaModel::new("episodes");
        child.fields.push(FieldMeta::new("gec_subject", FieldType::String));
        child.fields.push(FieldMeta::new("gec_private", FieldType::String));

        let mut meta = MetaModel::new("respondents");
        meta.fields.push(FieldMeta {
            api_name: Some("id".into()),
            required: true,
            ..FieldMeta::new("grs_id_user", FieldType::Numeric)
        });
        meta.fields.push(FieldMeta {
            label: Some("Language".into()),
            default: Some(DefaultValue::Value(json!("nl"))),
            maxlength: Some(2),
            ..FieldMeta::new("grs_iso_lang", FieldType::String)
        });
        meta.fields.push(FieldMeta::new("grs_secret", FieldType::String));
        meta.fields.push(FieldMeta {
            child: Some(Box::new(child)),
            ..FieldMeta::new("episodes", FieldType::ChildModel)
        });

        let mut allowed = FieldSet::from_names(["grs_id_user", "grs_iso_lang"]);
        allowed.insert_child("episodes", FieldSet::from_names(["gec_subject"]));
        let policy = AccessPolicy { allowed: Some(allowed), ..AccessPolicy::default() };

        let report = structure(&meta, &policy);
        assert_eq!(report["id"]["name"], json!("grs_id_user"));
        assert_eq!(report["id"]["required"], json!(true));
        assert_eq!(report["grs_iso_lang"]["label"], json!("Language"));
        assert_eq!(report["grs_iso_lang"]["default"], json!("nl"));
        assert_eq!(report["grs_iso_lang"]["maxlength"], json!(2));
        assert!(report.get("grs_secret").is_none());
        assert_eq!(report["episodes"]["type"], json!("child_model"));
        assert!(report["episodes"]["model"].get("gec_subject").is_some());
        assert!(report["episodes"]["model"].get("gec_private").is_none());
    }
}
