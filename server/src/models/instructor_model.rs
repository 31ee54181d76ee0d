use scheduler::EmploymentType;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Pool, Postgres};
use std::collections::HashMap;
use tracing::trace;
use utoipa::ToSchema;

use crate::models::schedule_model::BoxedError;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct Instructor {
    pub id: Option<i32>,
    pub name: String,
    pub employment_type: String,
}

/// Idempotent name-to-id resolution for instructors.
///
/// The name is matched case-insensitively against the stored form; a new
/// instructor is created on first sight. The free-text employment type
/// normalizes to `FULL-TIME`/`PART-TIME` and the stored value follows the
/// latest upload. The per-run cache avoids re-querying a name the current
/// generation run already resolved.
pub async fn resolve_instructor(
    db_pool: &Pool<Postgres>,
    cache: &mut HashMap<String, i32>,
    name: &str,
    employment_raw: &str,
) -> Result<i32, BoxedError> {
    let key = name.trim().to_lowercase();
    if let Some(id) = cache.get(&key) {
        return Ok(*id);
    }

    let employment = EmploymentType::from_raw(employment_raw);
    let (id,): (i32,) = sqlx::query_as(
        r#"
        INSERT INTO instructors (name, employment_type)
        VALUES ($1, $2)
        ON CONFLICT (name)
        DO UPDATE SET employment_type = EXCLUDED.employment_type
        RETURNING id"#,
    )
    .bind(name.trim())
    .bind(employment.as_str())
    .fetch_one(db_pool)
    .await?;

    trace!("resolved instructor {:?} -> {}", name, id);
    cache.insert(key, id);
    Ok(id)
}

/// The employment type stored for an instructor, defaulting to full-time
/// when the instructor is unknown.
pub async fn instructor_employment(
    db_pool: &Pool<Postgres>,
    instructor_id: i32,
) -> Result<EmploymentType, BoxedError> {
    let stored: Option<(String,)> =
        sqlx::query_as("SELECT employment_type FROM instructors WHERE id = $1")
            .bind(instructor_id)
            .fetch_optional(db_pool)
            .await?;

    Ok(stored
        .map(|(raw,)| EmploymentType::from_raw(&raw))
        .unwrap_or(EmploymentType::FullTime))
}
