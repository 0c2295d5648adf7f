//! Generic REST handlers: one collection handler and one item handler,
//! dispatching on the request method against the route's method list.

use crate::config::{IdField, RouteConfig};
use crate::error::{ApiError, ConfigError};
use crate::extractors::CurrentUser;
use crate::identity::ApiUser;
use crate::model::{FieldType, ModelHandle, Row};
use crate::response;
use crate::service::filter::{self, FilterCriteria, FilterContext};
use crate::service::order::resolve_order;
use crate::service::page::{page_params, pagination_headers, PageHeaders};
use crate::service::policy::AccessPolicy;
use crate::service::save::SaveOrchestrator;
use crate::service::structure::structure;
use crate::service::translate::TranslationMap;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{OriginalUri, Path, Query, State},
    http::{header, HeaderMap, Method},
    response::Response,
};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Everything a request needs about the resource it addresses.
struct Resource {
    config: Arc<RouteConfig>,
    handle: Arc<dyn ModelHandle>,
    outbound: TranslationMap,
    inbound: TranslationMap,
    policy: AccessPolicy,
}

fn resource(state: &AppState, segment: &str) -> Result<Resource, ApiError> {
    let config = state
        .routes
        .by_segment(segment)
        .cloned()
        .ok_or(ApiError::NotFound)?;
    let handle = state.models.handle(&config.model).ok_or_else(|| {
        ApiError::Config(ConfigError::MissingModel {
            route: config.name.clone(),
            model: config.model.clone(),
        })
    })?;
    let outbound = TranslationMap::build(handle.meta());
    let inbound = outbound.reverse();
    let policy = AccessPolicy::for_route(&config, handle.meta());
    Ok(Resource { config, handle, outbound, inbound, policy })
}

pub async fn collection(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<Vec<(String, String)>>,
    CurrentUser(user): CurrentUser,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let res = resource(&state, &segment)?;
    state.access_log.request(method.as_str(), uri.path(), &user);

    if method == Method::OPTIONS {
        return Ok(response::options(&res.config.methods));
    }
    if !res.config.allows_method(&method) {
        return Err(ApiError::MethodNotAllowed);
    }
    if method == Method::GET {
        list(&res, uri.path(), &query).await
    } else if method == Method::POST {
        save_new(&state, &res, &user, &headers, &body).await
    } else {
        Err(ApiError::NotImplemented)
    }
}

pub async fn item(
    State(state): State<AppState>,
    Path((segment, id)): Path<(String, String)>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    CurrentUser(user): CurrentUser,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let res = resource(&state, &segment)?;
    state.access_log.request(method.as_str(), uri.path(), &user);

    if method == Method::OPTIONS {
        return Ok(response::options(&res.config.methods));
    }
    if !res.config.allows_method(&method) {
        return Err(ApiError::MethodNotAllowed);
    }
    let criteria = id_criteria(&res, &id)?;
    if method == Method::GET {
        get_one(&res, criteria).await
    } else if method == Method::PATCH {
        save_existing(&state, &res, &user, &headers, &body, uri.path(), criteria).await
    } else if method == Method::DELETE {
        delete_one(&state, &res, &user, uri.path(), criteria).await
    } else {
        Err(ApiError::NotImplemented)
    }
}

pub async fn model_structure(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    OriginalUri(uri): OriginalUri,
    CurrentUser(user): CurrentUser,
) -> Result<Response, ApiError> {
    let res = resource(&state, &segment)?;
    state.access_log.request("GET", uri.path(), &user);
    Ok(response::one(structure(res.handle.meta(), &res.policy)))
}

async fn list(res: &Resource, path: &str, query: &[(String, String)]) -> Result<Response, ApiError> {
    let meta = res.handle.meta();

    let filterable: HashSet<String> = match &res.config.allowed_filter_fields {
        Some(fields) => fields.clone(),
        None => meta.fields.iter().map(|f| f.name.clone()).collect(),
    };
    let grouped = filter::group_params(query.to_vec());
    let ctx = FilterContext {
        reverse_map: &res.inbound,
        allowed_fields: &filterable,
        multi_organization: res.config.multi_organization.as_ref(),
    };
    let criteria = filter::compile(&grouped, &ctx);

    let order_param = query.iter().find(|(k, _)| k == "order").map(|(_, v)| v.as_str());
    let order = resolve_order(order_param, &res.inbound, meta);

    let find = |key: &str| query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str());
    let params = page_params(find("page"), find("per_page"), res.config.items_per_page);

    let total = res.handle.count(&criteria).await?;
    let (total, link) = match pagination_headers(total, &params, path, query) {
        PageHeaders::NoContent => return Ok(response::no_content()),
        PageHeaders::Emit { total, link } => (total, link),
    };

    let rows = res.handle.load(&criteria, &order, params.window()).await?;
    let rows = rows
        .into_iter()
        .map(|row| Value::Object(res.outbound.translate_row(res.policy.project(row, false))))
        .collect();
    Ok(response::list(rows, total, link))
}

async fn get_one(res: &Resource, criteria: FilterCriteria) -> Result<Response, ApiError> {
    let row = res
        .handle
        .load_first(&criteria)
        .await?
        .ok_or(ApiError::NotFound)?;
    let row = res.outbound.translate_row(res.policy.project(row, false));
    Ok(response::one(Value::Object(row)))
}

async fn save_new(
    state: &AppState,
    res: &Resource,
    user: &ApiUser,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<Response, ApiError> {
    let row = parse_body(headers, body, &res.inbound)?;
    let matched_route = format!("{}.post", res.config.name);
    let outcome = orchestrator(state, res, user, &matched_route)
        .save(row, None)
        .await?;
    Ok(response::created(outcome.location))
}

async fn save_existing(
    state: &AppState,
    res: &Resource,
    user: &ApiUser,
    headers: &HeaderMap,
    body: &Bytes,
    path: &str,
    criteria: FilterCriteria,
) -> Result<Response, ApiError> {
    let row = parse_body(headers, body, &res.inbound)?;
    let previous = res
        .handle
        .load_first(&criteria)
        .await?
        .ok_or(ApiError::NotFound)?;
    log_respondent(state, res, user, "PATCH", path, &previous);
    let matched_route = format!("{}.patch", res.config.name);
    let outcome = orchestrator(state, res, user, &matched_route)
        .save(row, Some(previous))
        .await?;
    let stored = res
        .outbound
        .translate_row(res.policy.project(outcome.row, false));
    Ok(response::one(Value::Object(stored)))
}

async fn delete_one(
    state: &AppState,
    res: &Resource,
    user: &ApiUser,
    path: &str,
    criteria: FilterCriteria,
) -> Result<Response, ApiError> {
    if res.config.respondent_id_field.is_some() {
        if let Some(row) = res.handle.load_first(&criteria).await? {
            log_respondent(state, res, user, "DELETE", path, &row);
        }
    }
    let removed = res.handle.delete(&criteria).await?;
    if removed == 0 {
        // Nothing was changed, so the id did not address a row.
        return Err(ApiError::BadRequest);
    }
    Ok(response::no_content())
}

/// Report the respondent a destructive request addresses, when the route
/// declares a respondent id field and the row carries a value for it.
fn log_respondent(
    state: &AppState,
    res: &Resource,
    user: &ApiUser,
    method: &str,
    path: &str,
    row: &Row,
) {
    let Some(field) = &res.config.respondent_id_field else {
        return;
    };
    if let Some(id) = row.get(field) {
        state.access_log.respondent(method, path, user, id);
    }
}

fn orchestrator<'a>(
    state: &'a AppState,
    res: &'a Resource,
    user: &'a ApiUser,
    matched_route: &'a str,
) -> SaveOrchestrator<'a> {
    SaveOrchestrator {
        handle: res.handle.as_ref(),
        config: &res.config,
        policy: &res.policy,
        user,
        events: state.events.as_ref(),
        hooks: state.hooks.as_ref(),
        urls: state.urls.as_ref(),
        matched_route,
    }
}

/// Enforce the JSON content type, parse the body, and translate external
/// field names back to internal ones.
fn parse_body(headers: &HeaderMap, body: &Bytes, inbound: &TranslationMap) -> Result<Row, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !content_type.contains("application/json") {
        return Err(ApiError::UnsupportedMediaType);
    }
    let value: Value = serde_json::from_slice(body).map_err(|_| ApiError::BadRequest)?;
    let Value::Object(row) = value else {
        return Err(ApiError::BadRequest);
    };
    if row.is_empty() {
        return Err(ApiError::BadRequest);
    }
    Ok(inbound.translate_row(row))
}

/// Build equality criteria for the item id. Composite keys arrive as one
/// path segment with comma-separated parts, in id-field order.
fn id_criteria(res: &Resource, id: &str) -> Result<FilterCriteria, ApiError> {
    let meta = res.handle.meta();
    let names: Vec<String> = match &res.config.id_field {
        Some(IdField::Single(name)) => vec![name.clone()],
        Some(IdField::Composite(names)) => names.clone(),
        None => meta.keys().iter().map(|k| k.to_string()).collect(),
    };
    if names.is_empty() {
        return Err(ApiError::NotFound);
    }
    let parts: Vec<&str> = if names.len() > 1 {
        id.split(',').collect()
    } else {
        vec![id]
    };
    if parts.len() != names.len() {
        return Err(ApiError::NotFound);
    }

    let mut criteria = FilterCriteria::new();
    for (name, part) in names.iter().zip(parts) {
        let value = match meta.field(name).map(|f| f.field_type) {
            Some(FieldType::Numeric) => part
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(part.to_string())),
            _ => Value::String(part.to_string()),
        };
        criteria.set_eq(name.clone(), value);
    }
    Ok(criteria)
}
