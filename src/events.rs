//! Save lifecycle hooks and notification sinks.

use crate::identity::ApiUser;
use crate::model::{ModelError, Row};
use serde_json::Value;
use std::time::Duration;

/// A completed save, reported after the storage engine accepted the row.
#[derive(Debug)]
pub struct SavedModel<'a> {
    pub model: &'a str,
    pub route: &'a str,
    pub user: &'a ApiUser,
    pub row: &'a Row,
    /// The stored row before the save, on updates.
    pub previous: Option<&'a Row>,
    pub elapsed: Duration,
}

/// A rejected save, reported before the failure is classified outward.
#[derive(Debug)]
pub struct SaveFailedModel<'a> {
    pub model: &'a str,
    pub route: &'a str,
    pub user: &'a ApiUser,
    pub row: &'a Row,
    pub error: &'a ModelError,
}

/// Receives save notifications. Implementations must not fail the request;
/// anything that can go wrong stays inside the sink.
pub trait EventSink: Send + Sync {
    fn saved(&self, event: SavedModel<'_>);
    fn save_failed(&self, event: SaveFailedModel<'_>);
}

/// Default sink: structured log lines.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingEvents;

impl EventSink for TracingEvents {
    fn saved(&self, event: SavedModel<'_>) {
        tracing::info!(
            model = %event.model,
            route = %event.route,
            user = event.user.id,
            elapsed_ms = event.elapsed.as_millis() as u64,
            "model saved"
        );
    }

    fn save_failed(&self, event: SaveFailedModel<'_>) {
        tracing::error!(
            model = %event.model,
            route = %event.route,
            user = event.user.id,
            error = %event.error,
            "model save failed"
        );
    }
}

/// Per-request access logging, called once per handled request.
pub trait AccessLog: Send + Sync {
    fn request(&self, method: &str, path: &str, user: &ApiUser);

    /// The subject of a destructive request: the value of the route's
    /// respondent id field on the addressed row, resolved before the write.
    fn respondent(&self, _method: &str, _path: &str, _user: &ApiUser, _respondent_id: &Value) {}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopAccessLog;

impl AccessLog for NoopAccessLog {
    fn request(&self, _method: &str, _path: &str, _user: &ApiUser) {}
}

/// Application hooks around the save pipeline. `before_save_row` runs after
/// projection and before validation; `after_save_row` sees the stored row.
pub trait SaveHooks: Send + Sync {
    fn before_save_row(&self, row: Row) -> Result<Row, ModelError> {
        Ok(row)
    }

    fn after_save_row(&self, row: Row) -> Row {
        row
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoHooks;

impl SaveHooks for NoHooks {}
