//! Pre-save transforms: an explicit pipeline of pure row functions, applied
//! in order after projection and before storage.

use crate::identity::ApiUser;
use crate::model::{FieldType, MetaModel, ModelError, Row, SaveStamp};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{json, Value};

pub type Transform<'a> = Box<dyn Fn(Row) -> Result<Row, ModelError> + Send + Sync + 'a>;

#[derive(Default)]
pub struct TransformPipeline<'a> {
    steps: Vec<Transform<'a>>,
}

impl<'a> TransformPipeline<'a> {
    pub fn new() -> Self {
        TransformPipeline { steps: Vec::new() }
    }

    pub fn push(mut self, step: Transform<'a>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn apply(&self, mut row: Row) -> Result<Row, ModelError> {
        for step in &self.steps {
            row = step(row)?;
        }
        Ok(row)
    }

    /// The standard save pipeline: audit stamping, then date normalization.
    pub fn standard(meta: &'a MetaModel, user: &'a ApiUser) -> Self {
        TransformPipeline::new()
            .push(Box::new(move |row| Ok(audit_stamp(meta, user, row))))
            .push(Box::new(move |row| normalize_dates(meta, row)))
    }
}

/// Overwrite stamp columns: current-user stamps get the caller's id,
/// timestamp stamps get the save time. Client input for these columns
/// never survives.
pub fn audit_stamp(meta: &MetaModel, user: &ApiUser, mut row: Row) -> Row {
    let now = chrono::Utc::now()
        .naive_utc()
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string();
    for field in &meta.fields {
        match field.stamp {
            Some(SaveStamp::CurrentUser) => {
                let id = json!(user.id);
                if row.get(&field.name) != Some(&id) {
                    row.insert(field.name.clone(), id);
                }
            }
            Some(SaveStamp::Now) => {
                row.insert(field.name.clone(), Value::String(now.clone()));
            }
            None => {}
        }
    }
    row
}

/// Normalize date and date-time strings to canonical wall-clock form:
/// `YYYY-MM-DD` for date columns, `YYYY-MM-DDTHH:MM:SS` for date-time
/// columns. Offsets are dropped after conversion to local wall time and
/// fractional seconds are truncated. Null passes through; an unparseable
/// value is a domain error.
pub fn normalize_dates(meta: &MetaModel, mut row: Row) -> Result<Row, ModelError> {
    for field in &meta.fields {
        let is_date = field.field_type == FieldType::Date;
        let is_datetime = field.field_type == FieldType::DateTime;
        if !is_date && !is_datetime {
            continue;
        }
        let Some(value) = row.get(&field.name) else { continue };
        let Value::String(raw) = value else { continue };
        if raw.is_empty() {
            continue;
        }

        let naive = parse_instant(raw).ok_or_else(|| {
            ModelError::Domain(format!(
                "field {} has unparseable date value {raw:?}",
                field.name
            ))
        })?;
        let formatted = if is_date {
            naive.format("%Y-%m-%d").to_string()
        } else {
            naive.format("%Y-%m-%dT%H:%M:%S").to_string()
        };
        row.insert(field.name.clone(), Value::String(formatted));
    }
    Ok(row)
}

fn parse_instant(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
