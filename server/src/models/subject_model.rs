use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Pool, Postgres};
use std::collections::HashMap;
use tracing::trace;
use utoipa::ToSchema;

use crate::models::schedule_model::BoxedError;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct Subject {
    pub id: Option<i32>,
    pub code: String,
    pub description: Option<String>,
    pub units: i32,
}

/// Idempotent code-to-id resolution for subjects.
///
/// Upserts on the subject code: an existing subject keeps its description
/// unless the caller supplies a new one, and its unit count follows the
/// latest upload. Returns the id together with the stored unit count,
/// which the engine needs for session-duration rules.
pub async fn resolve_subject(
    db_pool: &Pool<Postgres>,
    cache: &mut HashMap<String, (i32, i32)>,
    code: &str,
    description: Option<&str>,
    units: i32,
) -> Result<(i32, i32), BoxedError> {
    let key = code.trim().to_uppercase();
    if let Some(resolved) = cache.get(&key) {
        return Ok(*resolved);
    }

    let row: (i32, i32) = sqlx::query_as(
        r#"
        INSERT INTO subjects (code, description, units)
        VALUES ($1, $2, $3)
        ON CONFLICT (code)
        DO UPDATE SET
            description = COALESCE(EXCLUDED.description, subjects.description),
            units = EXCLUDED.units
        RETURNING id, units"#,
    )
    .bind(key.as_str())
    .bind(description)
    .bind(units.max(1))
    .fetch_one(db_pool)
    .await?;

    trace!("resolved subject {:?} -> {:?}", code, row);
    cache.insert(key, row);
    Ok(row)
}

/// The unit count stored for a subject, defaulting to 3 for unknown ids.
pub async fn subject_units(db_pool: &Pool<Postgres>, subject_id: i32) -> Result<i32, BoxedError> {
    let units: Option<(i32,)> = sqlx::query_as("SELECT units FROM subjects WHERE id = $1")
        .bind(subject_id)
        .fetch_optional(db_pool)
        .await?;

    Ok(units.map(|(u,)| u).unwrap_or(3))
}
