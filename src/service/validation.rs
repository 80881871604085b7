//! Request validation: create and update shapes, column types, and per-column rules.

use crate::config::{ColumnInfo, ColumnKind, ResolvedEntity, ValidationRule};
use crate::error::AppError;
use crate::store::Row;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde_json::Value;

pub struct RequestValidator;

impl RequestValidator {
    /// Create shape: unknown and server-assigned fields are dropped, required fields enforced.
    pub fn create_payload(entity: &ResolvedEntity, body: &Value) -> Result<Row, AppError> {
        let obj = as_object(body)?;
        let mut row = Row::new();
        for (name, v) in obj {
            let Some(col) = entity.column(name) else {
                tracing::warn!(entity = %entity.path_segment, field = %name, "dropping unknown field");
                continue;
            };
            if col.server_assigned() {
                tracing::warn!(entity = %entity.path_segment, field = %name, "dropping server-assigned field");
                continue;
            }
            row.insert(name.clone(), normalise(col, v)?);
        }

        for c in entity.columns.iter().filter(|c| !c.server_assigned()) {
            let rule_required = entity
                .validation
                .get(&c.name)
                .and_then(|r| r.required)
                .unwrap_or(false);
            let missing = row.get(&c.name).map_or(true, Value::is_null);
            if missing && (rule_required || (!c.optional_on_create() && !row.contains_key(&c.name))) {
                return Err(AppError::Validation(format!("{} is required", c.name)));
            }
        }

        apply_rules(&row, entity)?;

        for (low, high) in &entity.ascending_pairs {
            let (Some(a), Some(b)) = (
                row.get(low).and_then(Value::as_i64),
                row.get(high).and_then(Value::as_i64),
            ) else {
                continue;
            };
            if a >= b {
                return Err(AppError::Validation(format!("{} must be less than {}", low, high)));
            }
        }
        Ok(row)
    }

    /// Update shape: every field optional, anything outside the update columns rejected.
    pub fn update_payload(entity: &ResolvedEntity, body: &Value) -> Result<Row, AppError> {
        let obj = as_object(body)?;
        let mut row = Row::new();
        for (name, v) in obj {
            let col = entity
                .column(name)
                .filter(|_| entity.is_updatable(name))
                .ok_or_else(|| {
                    AppError::Validation(format!(
                        "{} is not an updatable field of {}",
                        name, entity.path_segment
                    ))
                })?;
            row.insert(name.clone(), normalise(col, v)?);
        }
        apply_rules(&row, entity)?;
        Ok(row)
    }
}

fn as_object(body: &Value) -> Result<&serde_json::Map<String, Value>, AppError> {
    body.as_object()
        .ok_or_else(|| AppError::Validation("request body must be a JSON object".into()))
}

fn apply_rules(row: &Row, entity: &ResolvedEntity) -> Result<(), AppError> {
    for (col, rule) in &entity.validation {
        if let Some(v) = row.get(col) {
            validate_field(col, v, rule)?;
        }
    }
    Ok(())
}

/// Type-check `v` against the column and return its canonical form.
pub fn normalise(col: &ColumnInfo, v: &Value) -> Result<Value, AppError> {
    let invalid = |what: &str| AppError::Validation(format!("{} must be {}", col.name, what));
    if v.is_null() {
        if col.nullable {
            return Ok(Value::Null);
        }
        return Err(AppError::Validation(format!("{} must not be null", col.name)));
    }
    match &col.kind {
        ColumnKind::BigInt => v.as_i64().map(Value::from).ok_or_else(|| invalid("an integer")),
        ColumnKind::Int => v
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .map(Value::from)
            .ok_or_else(|| invalid("a 32-bit integer")),
        ColumnKind::Bool => v.as_bool().map(Value::Bool).ok_or_else(|| invalid("a boolean")),
        ColumnKind::Text { max_length } => {
            let s = v.as_str().ok_or_else(|| invalid("a string"))?;
            if s.contains('\0') {
                return Err(invalid("free of NUL characters"));
            }
            if let Some(max) = max_length {
                if s.chars().count() > *max as usize {
                    return Err(AppError::Validation(format!(
                        "{} must be at most {} characters",
                        col.name, max
                    )));
                }
            }
            Ok(Value::String(s.to_string()))
        }
        ColumnKind::Timestamptz => v
            .as_str()
            .and_then(parse_timestamp)
            .map(|ts| Value::String(format_timestamp(&ts)))
            .ok_or_else(|| invalid("an RFC 3339 timestamp")),
        ColumnKind::Date => v
            .as_str()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
            .ok_or_else(|| invalid("a date (YYYY-MM-DD)")),
        ColumnKind::Json => match v {
            Value::Object(_) | Value::Array(_) => Ok(v.clone()),
            _ => Err(invalid("a JSON object or array")),
        },
        ColumnKind::Enum { values, .. } => match v.as_str() {
            Some(s) if values.iter().any(|e| e == s) => Ok(Value::String(s.to_string())),
            _ => Err(AppError::Validation(format!(
                "{} must be one of: {}",
                col.name,
                values.join(", ")
            ))),
        },
    }
}

/// UTC text as PostgreSQL renders `timestamptz` in JSON under a UTC session:
/// microsecond precision, trailing fractional zeros trimmed, `+00:00` offset.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    let mut out = ts.format("%Y-%m-%dT%H:%M:%S").to_string();
    let micros = ts.timestamp_subsec_micros();
    if micros > 0 {
        let frac = format!("{:06}", micros);
        out.push('.');
        out.push_str(frac.trim_end_matches('0'));
    }
    out.push_str("+00:00");
    out
}

/// RFC 3339, or a naive date-time taken as UTC.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn validate_field(col: &str, v: &Value, rule: &ValidationRule) -> Result<(), AppError> {
    if v.is_null() {
        return Ok(());
    }
    if let Some(format) = &rule.format {
        validate_format(col, v, format)?;
    }
    if let Some(max) = rule.max_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() > max as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at most {} characters",
                    col, max
                )));
            }
        }
    }
    if let Some(min) = rule.min_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() < min as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at least {} characters",
                    col, min
                )));
            }
        }
    }
    if let Some(ref pattern) = rule.pattern {
        let re = Regex::new(pattern).map_err(|_| AppError::Validation(format!("invalid pattern for {}", col)))?;
        if let Some(s) = v.as_str() {
            if !re.is_match(s) {
                return Err(AppError::Validation(format!("{} does not match required pattern", col)));
            }
        }
    }
    if let Some(ref allowed) = rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            return Err(AppError::Validation(format!(
                "{} must be one of: {:?}",
                col,
                allowed.iter().take(5).collect::<Vec<_>>()
            )));
        }
    }
    if let Some(min) = rule.minimum {
        if let Some(n) = v.as_f64() {
            if n < min {
                return Err(AppError::Validation(format!("{} must be at least {}", col, min)));
            }
        }
    }
    if let Some(max) = rule.maximum {
        if let Some(n) = v.as_f64() {
            if n > max {
                return Err(AppError::Validation(format!("{} must be at most {}", col, max)));
            }
        }
    }
    Ok(())
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn validate_format(col: &str, v: &Value, format: &str) -> Result<(), AppError> {
    let Some(s) = v.as_str() else { return Ok(()) };
    let ok = match format.to_lowercase().as_str() {
        "email" => {
            let (local, domain) = s.split_once('@').unwrap_or(("", ""));
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        "uuid" => Regex::new("^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
            .map(|re| re.is_match(s))
            .unwrap_or(false),
        _ => true,
    };
    if !ok {
        return Err(AppError::Validation(format!("{} must be a valid {}", col, format)));
    }
    Ok(())
}
