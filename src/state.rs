//! Shared application state for all routes.

use crate::config::{IdField, RouteMap};
use crate::events::{AccessLog, EventSink, NoHooks, NoopAccessLog, SaveHooks, TracingEvents};
use crate::model::ModelRegistry;
use crate::service::save::UrlGenerator;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteMap>,
    pub models: Arc<dyn ModelRegistry>,
    pub urls: Arc<dyn UrlGenerator>,
    pub events: Arc<dyn EventSink>,
    pub hooks: Arc<dyn SaveHooks>,
    pub access_log: Arc<dyn AccessLog>,
}

impl AppState {
    /// State with the default ambient pieces: path-based URLs, tracing
    /// events, no hooks, no access log.
    pub fn new(routes: RouteMap, models: Arc<dyn ModelRegistry>) -> Self {
        let routes = Arc::new(routes);
        AppState {
            urls: Arc::new(PathUrls { routes: Arc::clone(&routes) }),
            routes,
            models,
            events: Arc::new(TracingEvents),
            hooks: Arc::new(NoHooks),
            access_log: Arc::new(NoopAccessLog),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn SaveHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_access_log(mut self, access_log: Arc<dyn AccessLog>) -> Self {
        self.access_log = access_log;
        self
    }

    pub fn with_urls(mut self, urls: Arc<dyn UrlGenerator>) -> Self {
        self.urls = urls;
        self
    }
}

/// URL generation straight from the route table: `/<segment>` for the
/// collection, `/<segment>/<id>` for an item, composite key parts joined
/// with commas in id-field order.
pub struct PathUrls {
    routes: Arc<RouteMap>,
}

impl PathUrls {
    pub fn new(routes: Arc<RouteMap>) -> Self {
        PathUrls { routes }
    }
}

impl UrlGenerator for PathUrls {
    fn generate(&self, route_name: &str, params: &[(String, String)]) -> Option<String> {
        let route = self.routes.by_name(route_name)?;
        if params.is_empty() {
            return Some(format!("/{}", route.path_segment));
        }
        let id = match &route.id_field {
            Some(IdField::Single(name)) => {
                params.iter().find(|(k, _)| k == name)?.1.clone()
            }
            Some(IdField::Composite(names)) => names
                .iter()
                .map(|name| params.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone()))
                .collect::<Option<Vec<_>>>()?
                .join(","),
            None => params
                .iter()
                .map(|(_, v)| v.clone())
                .collect::<Vec<_>>()
                .join(","),
        };
        Some(format!("/{}/{}", route.path_segment, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteConfig;

    #[test]
    fn generates_item_urls_in_id_field_order() {
        let mut map = RouteMap::default();
        map.insert(RouteConfig {
            id_field: Some(IdField::Composite(vec![
                "gr2o_patient_nr".into(),
                "gr2o_id_organization".into(),
            ])),
            ..RouteConfig::for_tests("respondents", "respondents")
        })
        .unwrap();
        let urls = PathUrls::new(Arc::new(map));

        let params = vec![
            ("gr2o_id_organization".to_string(), "7".to_string()),
            ("gr2o_patient_nr".to_string(), "A123".to_string()),
        ];
        assert_eq!(
            urls.generate("respondents", &params).as_deref(),
            Some("/respondents/A123,7")
        );
        assert_eq!(urls.generate("nope", &params), None);
    }
}
