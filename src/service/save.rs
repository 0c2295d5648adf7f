//! The save orchestrator: projection, hooks, validation, transforms and
//! storage in one explicit sequence, with lifecycle events on both paths.

use crate::config::{IdField, RouteConfig};
use crate::events::{EventSink, SaveFailedModel, SaveHooks, SavedModel};
use crate::identity::ApiUser;
use crate::model::{MetaModel, ModelError, ModelHandle, Row};
use crate::service::policy::AccessPolicy;
use crate::service::transform::TransformPipeline;
use crate::service::validation::{derive_rules, validate_row};
use serde_json::Value;
use std::time::Instant;

/// Produces URLs for named routes. `None` when the route does not exist.
pub trait UrlGenerator: Send + Sync {
    fn generate(&self, route_name: &str, params: &[(String, String)]) -> Option<String>;
}

/// Generator for contexts without routing, e.g. direct library use.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoUrls;

impl UrlGenerator for NoUrls {
    fn generate(&self, _route_name: &str, _params: &[(String, String)]) -> Option<String> {
        None
    }
}

#[derive(Debug)]
pub struct SaveOutcome {
    pub row: Row,
    /// URL of the stored resource, when a matching read route exists.
    pub location: Option<String>,
}

pub struct SaveOrchestrator<'a> {
    pub handle: &'a dyn ModelHandle,
    pub config: &'a RouteConfig,
    pub policy: &'a AccessPolicy,
    pub user: &'a ApiUser,
    pub events: &'a dyn EventSink,
    pub hooks: &'a dyn SaveHooks,
    pub urls: &'a dyn UrlGenerator,
    /// Name of the route the request matched, verb suffix included.
    pub matched_route: &'a str,
}

impl<'a> SaveOrchestrator<'a> {
    /// Run the full save pipeline. `previous` carries the stored row on
    /// updates; its fields back-fill whatever the client left out.
    pub async fn save(&self, row: Row, previous: Option<Row>) -> Result<SaveOutcome, ModelError> {
        let started = Instant::now();
        let meta = self.handle.meta();
        let is_update = previous.is_some();

        if row.is_empty() {
            return Err(ModelError::Domain("no data sent".into()));
        }

        let mut merged = self.policy.project(row, true);
        if let Some(previous) = &previous {
            for (key, value) in previous {
                merged.entry(key.clone()).or_insert(value.clone());
            }
        }

        let result = self.run_pipeline(meta, merged.clone(), is_update).await;
        match result {
            Ok(stored) => {
                self.events.saved(SavedModel {
                    model: &meta.name,
                    route: &self.config.name,
                    user: self.user,
                    row: &stored,
                    previous: previous.as_ref(),
                    elapsed: started.elapsed(),
                });
                let stored = self.hooks.after_save_row(stored);
                let location = self.location(meta, &stored);
                Ok(SaveOutcome { row: stored, location })
            }
            Err(error) => {
                self.events.save_failed(SaveFailedModel {
                    model: &meta.name,
                    route: &self.config.name,
                    user: self.user,
                    row: &merged,
                    error: &error,
                });
                Err(error)
            }
        }
    }

    async fn run_pipeline(
        &self,
        meta: &MetaModel,
        row: Row,
        is_update: bool,
    ) -> Result<Row, ModelError> {
        let row = self.hooks.before_save_row(row)?;
        let rules = derive_rules(meta);
        validate_row(&rules, &row, is_update)?;
        let row = TransformPipeline::standard(meta, self.user).apply(row)?;
        self.handle.save(row).await
    }

    /// Derive the Location URL for a stored row: strip the verb suffix from
    /// the matched route name, prefer the read route, fall back to the bare
    /// base name.
    fn location(&self, meta: &MetaModel, row: &Row) -> Option<String> {
        let base = strip_verb_suffix(self.matched_route);
        let params = self.key_params(meta, row)?;
        self.urls
            .generate(&format!("{base}.get"), &params)
            .or_else(|| self.urls.generate(base, &params))
    }

    fn key_params(&self, meta: &MetaModel, row: &Row) -> Option<Vec<(String, String)>> {
        let names: Vec<String> = match &self.config.id_field {
            Some(IdField::Single(name)) => vec![name.clone()],
            Some(IdField::Composite(names)) => names.clone(),
            None => meta.keys().iter().map(|k| k.to_string()).collect(),
        };
        if names.is_empty() {
            return None;
        }
        names
            .into_iter()
            .map(|name| {
                row.get(&name).and_then(value_as_param).map(|v| (name, v))
            })
            .collect()
    }
}

fn value_as_param(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

const VERB_SUFFIXES: [&str; 5] = [".structure", ".get", ".fixed", ".post", ".patch"];

fn strip_verb_suffix(route_name: &str) -> &str {
    for suffix in VERB_SUFFIXES {
        if let Some(base) = route_name.strip_suffix(suffix) {
            return base;
        }
    }
    route_name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoHooks;
    use crate::model::{FieldMeta, FieldType};
    use crate::service::filter::FilterCriteria;
    use crate::service::order::OrderSpec;
    use crate::service::page::PageWindow;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct MemoryHandle {
        meta: MetaModel,
        saved: Mutex<Vec<Row>>,
        fail_with: Option<fn() -> ModelError>,
    }

    #[async_trait]
    impl ModelHandle for MemoryHandle {
        fn meta(&self) -> &MetaModel {
            &self.meta
        }

        async fn load(
            &self,
            _criteria: &FilterCriteria,
            _order: &OrderSpec,
            _window: Option<PageWindow>,
        ) -> Result<Vec<Row>, ModelError> {
            Ok(self.saved.lock().unwrap().clone())
        }

        async fn load_first(
            &self,
            _criteria: &FilterCriteria,
        ) -> Result<Option<Row>, ModelError> {
            Ok(self.saved.lock().unwrap().first().cloned())
        }

        async fn count(&self, _criteria: &FilterCriteria) -> Result<u64, ModelError> {
            Ok(self.saved.lock().unwrap().len() as u64)
        }

        async fn save(&self, mut row: Row) -> Result<Row, ModelError> {
            if let Some(fail) = self.fail_with {
                return Err(fail());
            }
            row.entry("id".to_string()).or_insert(json!(1));
            self.saved.lock().unwrap().push(row.clone());
            Ok(row)
        }

        async fn delete(&self, _criteria: &FilterCriteria) -> Result<u64, ModelError> {
            Ok(0)
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        saved: Mutex<u32>,
        failed: Mutex<u32>,
    }

    impl EventSink for RecordingSink {
        fn saved(&self, _event: SavedModel<'_>) {
            *self.saved.lock().unwrap() += 1;
        }

        fn save_failed(&self, _event: SaveFailedModel<'_>) {
            *self.failed.lock().unwrap() += 1;
        }
    }

    struct PathUrls;

    impl UrlGenerator for PathUrls {
        fn generate(&self, route_name: &str, params: &[(String, String)]) -> Option<String> {
            if route_name != "things.get" {
                return None;
            }
            let id = params.iter().find(|(k, _)| k == "id")?;
            Some(format!("/things/{}", id.1))
        }
    }

    fn handle(fail_with: Option<fn() -> ModelError>) -> MemoryHandle {
        let mut meta = MetaModel::new("things");
        meta.fields.push(FieldMeta {
            key: true,
            ..FieldMeta::new("id", FieldType::Numeric)
        });
        meta.fields.push(FieldMeta {
            required: true,
            ..FieldMeta::new("name", FieldType::String)
        });
        MemoryHandle { meta, saved: Mutex::new(Vec::new()), fail_with }
    }

    fn row(value: Value) -> Row {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn successful_save_emits_event_and_location() {
        let handle = handle(None);
        let config = RouteConfig::for_tests("things", "things");
        let policy = AccessPolicy::default();
        let user = ApiUser::with_id(5);
        let sink = RecordingSink::default();
        let orchestrator = SaveOrchestrator {
            handle: &handle,
            config: &config,
            policy: &policy,
            user: &user,
            events: &sink,
            hooks: &NoHooks,
            urls: &PathUrls,
            matched_route: "things.post",
        };

        let outcome = orchestrator
            .save(row(json!({"name": "widget"})), None)
            .await
            .unwrap();
        assert_eq!(outcome.location.as_deref(), Some("/things/1"));
        assert_eq!(*sink.saved.lock().unwrap(), 1);
        assert_eq!(handle.saved.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn validation_failure_persists_nothing() {
        let handle = handle(None);
        let config = RouteConfig::for_tests("things", "things");
        let policy = AccessPolicy::default();
        let user = ApiUser::anonymous();
        let sink = RecordingSink::default();
        let orchestrator = SaveOrchestrator {
            handle: &handle,
            config: &config,
            policy: &policy,
            user: &user,
            events: &sink,
            hooks: &NoHooks,
            urls: &NoUrls,
            matched_route: "things.post",
        };

        let err = orchestrator
            .save(row(json!({"name": ""})), None)
            .await
            .unwrap_err();
        let ModelError::Validation { errors, .. } = err else {
            panic!("expected validation failure");
        };
        assert!(errors.get("name").is_some());
        assert!(handle.saved.lock().unwrap().is_empty());
        assert_eq!(*sink.failed.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn storage_failures_still_emit_failure_events() {
        let handle = handle(Some(|| ModelError::Domain("duplicate thing".into())));
        let config = RouteConfig::for_tests("things", "things");
        let policy = AccessPolicy::default();
        let user = ApiUser::anonymous();
        let sink = RecordingSink::default();
        let orchestrator = SaveOrchestrator {
            handle: &handle,
            config: &config,
            policy: &policy,
            user: &user,
            events: &sink,
            hooks: &NoHooks,
            urls: &NoUrls,
            matched_route: "things.post",
        };

        let err = orchestrator
            .save(row(json!({"name": "widget"})), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Domain(_)));
        assert_eq!(*sink.failed.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn updates_merge_the_previous_row() {
        let handle = handle(None);
        let config = RouteConfig::for_tests("things", "things");
        let policy = AccessPolicy::default();
        let user = ApiUser::anonymous();
        let sink = RecordingSink::default();
        let orchestrator = SaveOrchestrator {
            handle: &handle,
            config: &config,
            policy: &policy,
            user: &user,
            events: &sink,
            hooks: &NoHooks,
            urls: &NoUrls,
            matched_route: "things.patch",
        };

        let previous = row(json!({"id": 9, "name": "old"}));
        let outcome = orchestrator
            .save(row(json!({"name": "new"})), Some(previous))
            .await
            .unwrap();
        assert_eq!(outcome.row["id"], json!(9));
        assert_eq!(outcome.row["name"], json!("new"));
    }

    #[test]
    fn verb_suffixes_strip_once() {
        assert_eq!(strip_verb_suffix("respondents.post"), "respondents");
        assert_eq!(strip_verb_suffix("respondents.get"), "respondents");
        assert_eq!(strip_verb_suffix("respondents"), "respondents");
    }
}
