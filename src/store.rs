//! PostgreSQL-backed model handles.

use crate::model::{MetaModel, ModelError, ModelHandle, ModelRegistry, Row};
use crate::service::filter::FilterCriteria;
use crate::service::order::OrderSpec;
use crate::service::page::PageWindow;
use crate::sql::{self, PgBindValue, QueryBuf};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;

/// One table exposed as a model. `schema`/`table` name the storage location;
/// `meta` drives column selection, casts and key handling.
pub struct PgModelHandle {
    pool: PgPool,
    meta: Arc<MetaModel>,
    schema: String,
    table: String,
}

impl PgModelHandle {
    pub fn new(
        pool: PgPool,
        meta: Arc<MetaModel>,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        PgModelHandle { pool, meta, schema: schema.into(), table: table.into() }
    }

    async fn fetch_rows(&self, q: &QueryBuf) -> Result<Vec<Row>, ModelError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    fn has_all_keys(&self, row: &Row) -> bool {
        let keys = self.meta.keys();
        !keys.is_empty()
            && keys
                .iter()
                .all(|k| row.get(*k).is_some_and(|v| !v.is_null()))
    }
}

#[async_trait]
impl ModelHandle for PgModelHandle {
    fn meta(&self) -> &MetaModel {
        &self.meta
    }

    async fn load(
        &self,
        criteria: &FilterCriteria,
        order: &OrderSpec,
        window: Option<PageWindow>,
    ) -> Result<Vec<Row>, ModelError> {
        let q = sql::select(&self.schema, &self.table, &self.meta, criteria, order, window);
        self.fetch_rows(&q).await
    }

    async fn load_first(&self, criteria: &FilterCriteria) -> Result<Option<Row>, ModelError> {
        let q = sql::select(
            &self.schema,
            &self.table,
            &self.meta,
            criteria,
            &OrderSpec::Natural,
            Some(PageWindow { limit: 1, offset: 0 }),
        );
        Ok(self.fetch_rows(&q).await?.into_iter().next())
    }

    async fn count(&self, criteria: &FilterCriteria) -> Result<u64, ModelError> {
        let q = sql::count(&self.schema, &self.table, &self.meta, criteria);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query_scalar::<_, i64>(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let n = query.fetch_one(&self.pool).await?;
        Ok(n.max(0) as u64)
    }

    async fn save(&self, row: Row) -> Result<Row, ModelError> {
        let q = if self.has_all_keys(&row) {
            sql::update(&self.schema, &self.table, &self.meta, &row)
        } else {
            sql::insert(&self.schema, &self.table, &self.meta, &row)
        };
        match self.fetch_rows(&q).await {
            Ok(rows) => rows
                .into_iter()
                .next()
                .ok_or_else(|| ModelError::Domain("row to update no longer exists".into())),
            Err(ModelError::Db(e)) => Err(classify_db_error(e)),
            Err(other) => Err(other),
        }
    }

    async fn delete(&self, criteria: &FilterCriteria) -> Result<u64, ModelError> {
        let q = sql::delete(&self.schema, &self.table, &self.meta, criteria);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

/// Constraint violations are model errors the client can act on; anything
/// else stays a database error.
fn classify_db_error(e: sqlx::Error) -> ModelError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some("23505") {
            return ModelError::Domain(format!("duplicate value: {}", db.message()));
        }
        if db.code().as_deref() == Some("23503") {
            return ModelError::Domain(format!("unknown reference: {}", db.message()));
        }
    }
    ModelError::Db(e)
}

/// Model handles by name, shared across the router.
#[derive(Default)]
pub struct PgModelRegistry {
    handles: HashMap<String, Arc<dyn ModelHandle>>,
}

impl PgModelRegistry {
    pub fn new() -> Self {
        PgModelRegistry::default()
    }

    pub fn register(&mut self, handle: Arc<dyn ModelHandle>) {
        self.handles.insert(handle.meta().name.clone(), handle);
    }

    pub fn with(mut self, handle: Arc<dyn ModelHandle>) -> Self {
        self.register(handle);
        self
    }
}

impl ModelRegistry for PgModelRegistry {
    fn handle(&self, model: &str) -> Option<Arc<dyn ModelHandle>> {
        self.handles.get(model).cloned()
    }
}

fn row_to_json(row: &sqlx::postgres::PgRow) -> Row {
    use sqlx::{Column, Row as _};
    let mut map = serde_json::Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    map
}

fn cell_to_value(row: &sqlx::postgres::PgRow, name: &str) -> Value {
    use sqlx::Row as _;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<serde_json::Value>, _>(name) {
        return j;
    }
    Value::Null
}
