//! The data model handle: metadata introspection plus read/write/count over
//! rows. Storage engines implement this; the core only sees the trait.

use crate::model::meta::MetaModel;
use crate::service::filter::FilterCriteria;
use crate::service::order::OrderSpec;
use crate::service::page::PageWindow;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// A row as it moves through the pipeline: internal field names, JSON values.
pub type Row = serde_json::Map<String, Value>;

/// Failures raised by a model handle or the validation pipeline. The save
/// orchestrator classifies these into the outward error taxonomy.
#[derive(Error, Debug)]
pub enum ModelError {
    /// One or more fields failed validation; `errors` maps field names to
    /// message lists (or index-keyed maps for list-valued fields).
    #[error("{message}")]
    Validation { message: String, errors: Value },
    /// Business-rule rejection; the message is safe to surface.
    #[error("{0}")]
    Domain(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait ModelHandle: Send + Sync {
    fn meta(&self) -> &MetaModel;

    async fn load(
        &self,
        criteria: &FilterCriteria,
        order: &OrderSpec,
        window: Option<PageWindow>,
    ) -> Result<Vec<Row>, ModelError>;

    async fn load_first(&self, criteria: &FilterCriteria) -> Result<Option<Row>, ModelError>;

    /// Count matching rows, ignoring any limit.
    async fn count(&self, criteria: &FilterCriteria) -> Result<u64, ModelError>;

    /// Persist one row (insert, or update when the key fields are present).
    /// Returns the stored row with key fields populated.
    async fn save(&self, row: Row) -> Result<Row, ModelError>;

    /// Delete matching rows; returns the number of rows removed.
    async fn delete(&self, criteria: &FilterCriteria) -> Result<u64, ModelError>;
}

/// Looks up model handles by model name, as referenced from route config.
pub trait ModelRegistry: Send + Sync {
    fn handle(&self, model: &str) -> Option<Arc<dyn ModelHandle>>;
}
