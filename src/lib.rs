//! Model REST SDK: metadata-driven REST resources over tabular models.
//!
//! Routes are declared in configuration, models carry per-field metadata,
//! and a single pipeline handles translation, filtering, ordering, paging,
//! field policy, validation, transforms and persistence for every resource.

pub mod config;
pub mod error;
pub mod events;
pub mod extractors;
pub mod handlers;
pub mod identity;
pub mod model;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

pub use config::{RouteConfig, RouteMap, RouteOptionsConfig, RoutesConfig};
pub use error::{ApiError, ConfigError};
pub use events::{AccessLog, EventSink, SaveHooks, TracingEvents};
pub use identity::ApiUser;
pub use model::{FieldMeta, FieldType, MetaModel, ModelError, ModelHandle, ModelRegistry, Row};
pub use routes::rest_routes;
pub use state::AppState;
pub use store::{PgModelHandle, PgModelRegistry};
