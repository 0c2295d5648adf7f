//! Demo server: a separate Rust project that uses model-rest-sdk as a
//! dependency, exposing one respondent resource.
//!
//! Run from repo root: `cargo run -p demo-server`

use model_rest_sdk::config::{IdField, RouteMap};
use model_rest_sdk::model::{
    DefaultValue, FieldMeta, FieldType, SaveStamp, SortTerm,
};
use model_rest_sdk::{
    rest_routes, AppState, MetaModel, PgModelHandle, PgModelRegistry, RouteConfig,
};
use axum::http::Method;
use std::sync::Arc;
use tokio::net::TcpListener;

fn respondent_model() -> MetaModel {
    let mut meta = MetaModel::new("respondents");
    meta.fields.push(FieldMeta {
        key: true,
        api_name: Some("id".into()),
        ..FieldMeta::new("grs_id_user", FieldType::Numeric)
    });
    meta.fields.push(FieldMeta {
        required: true,
        maxlength: Some(50),
        label: Some("Last name".into()),
        ..FieldMeta::new("grs_last_name", FieldType::String)
    });
    meta.fields.push(FieldMeta {
        maxlength: Some(2),
        default: Some(DefaultValue::Value("nl".into())),
        ..FieldMeta::new("grs_iso_lang", FieldType::String)
    });
    meta.fields.push(FieldMeta::new("grs_birthday", FieldType::Date));
    meta.fields.push(FieldMeta {
        required: true,
        default: Some(DefaultValue::CurrentTimestamp),
        ..FieldMeta::new("grs_changed", FieldType::DateTime)
    });
    meta.fields.push(FieldMeta {
        required: true,
        stamp: Some(SaveStamp::CurrentUser),
        ..FieldMeta::new("grs_changed_by", FieldType::Numeric)
    });
    meta.default_sort = vec![SortTerm::asc("grs_last_name")];
    meta
}

fn respondent_route() -> RouteConfig {
    RouteConfig {
        name: "respondents".into(),
        path_segment: "respondents".into(),
        model: "respondents".into(),
        methods: vec![Method::GET, Method::POST, Method::PATCH, Method::DELETE],
        id_field: Some(IdField::Single("grs_id_user".into())),
        items_per_page: Some(25),
        allowed_fields: None,
        allowed_save_fields: None,
        disallowed_fields: None,
        readonly_fields: None,
        allowed_filter_fields: None,
        multi_organization: None,
        respondent_id_field: Some("grs_id_user".into()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("model_rest_sdk=debug")),
        )
        .init();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/gems_demo".into());
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    let meta = Arc::new(respondent_model());
    let route = respondent_route();
    model_rest_sdk::config::validate_route(&route, &meta)?;

    let mut routes = RouteMap::default();
    routes.insert(route)?;

    let registry = PgModelRegistry::new().with(Arc::new(PgModelHandle::new(
        pool.clone(),
        meta,
        "public",
        "gems__respondents",
    )));
    let state = AppState::new(routes, Arc::new(registry));

    let app = rest_routes(state);
    let listener = TcpListener::bind("127.0.0.1:3000").await?;
    tracing::info!("demo server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
