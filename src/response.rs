//! Response helpers: JSON bodies with the count, link, allow and location
//! headers this API carries.

use axum::{
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

pub const TOTAL_COUNT: HeaderName = HeaderName::from_static("x-total-count");

fn header_value(s: &str) -> HeaderValue {
    HeaderValue::from_str(s).unwrap_or(HeaderValue::from_static(""))
}

/// 200 with the row list, `X-total-count` and an optional `Link` header.
pub fn list(rows: Vec<Value>, total: u64, link: Option<String>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(TOTAL_COUNT, header_value(&total.to_string()));
    if let Some(link) = link {
        headers.insert(header::LINK, header_value(&link));
    }
    (StatusCode::OK, headers, Json(Value::Array(rows))).into_response()
}

pub fn one(row: Value) -> Response {
    (StatusCode::OK, Json(row)).into_response()
}

pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// 201 with a `Location` header when the stored resource has a URL.
pub fn created(location: Option<String>) -> Response {
    let mut headers = HeaderMap::new();
    if let Some(location) = location {
        headers.insert(header::LOCATION, header_value(&location));
    }
    (StatusCode::CREATED, headers).into_response()
}

/// 200 with `Allow` and `Access-Control-Allow-Methods` for an OPTIONS
/// request; OPTIONS itself is always included.
pub fn options(methods: &[Method]) -> Response {
    let mut names: Vec<&str> = methods.iter().map(Method::as_str).collect();
    if !names.contains(&Method::OPTIONS.as_str()) {
        names.push(Method::OPTIONS.as_str());
    }
    let list = names.join(", ");
    let mut headers = HeaderMap::new();
    headers.insert(header::ALLOW, header_value(&list));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        header_value(&list),
    );
    (StatusCode::OK, headers).into_response()
}
