use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Pool, Postgres};
use std::collections::HashMap;
use tracing::trace;
use utoipa::ToSchema;

use crate::models::schedule_model::BoxedError;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct Section {
    pub id: Option<i32>,
    pub department: String,
    pub year_level: i32,
    pub block: String,
}

/// Derives a numeric year level from the free-text forms uploads carry:
/// ordinals ("1st", "2nd Year"), spelled ordinals ("Third"), Roman
/// numerals ("III"), or plain numbers ("4").
pub fn parse_year_level(raw: &str) -> Option<i32> {
    let cleaned = raw.trim().to_lowercase();
    if cleaned.is_empty() {
        return None;
    }

    // Leading digits win: "1st Year", "2", "3rd".
    let digits: String = cleaned.chars().take_while(|c| c.is_ascii_digit()).collect();
    if !digits.is_empty() {
        return digits.parse::<i32>().ok().filter(|y| (1..=10).contains(y));
    }

    // Spelled-out ordinals.
    for (word, year) in [
        ("first", 1),
        ("second", 2),
        ("third", 3),
        ("fourth", 4),
        ("fifth", 5),
    ] {
        if cleaned.starts_with(word) {
            return Some(year);
        }
    }

    // Roman numerals up to V; "IV" must be tried before "I".
    let token = cleaned.split_whitespace().next().unwrap_or("");
    match token {
        "iv" => Some(4),
        "v" => Some(5),
        "iii" => Some(3),
        "ii" => Some(2),
        "i" => Some(1),
        _ => None,
    }
}

/// Find-or-create resolution for sections.
///
/// The section identity is (department, numeric year level, block); the
/// year level is derived from free text via [`parse_year_level`]. Returns
/// `None` when the year text cannot be understood, leaving the caller to
/// skip the row.
pub async fn resolve_section(
    db_pool: &Pool<Postgres>,
    cache: &mut HashMap<(String, i32, String), i32>,
    department: &str,
    year_text: &str,
    block: &str,
) -> Result<Option<i32>, BoxedError> {
    let Some(year_level) = parse_year_level(year_text) else {
        return Ok(None);
    };

    let key = (
        department.trim().to_uppercase(),
        year_level,
        block.trim().to_uppercase(),
    );
    if let Some(id) = cache.get(&key) {
        return Ok(Some(*id));
    }

    let (id,): (i32,) = sqlx::query_as(
        r#"
        INSERT INTO sections (department, year_level, block)
        VALUES ($1, $2, $3)
        ON CONFLICT (department, year_level, block)
        DO UPDATE SET block = EXCLUDED.block
        RETURNING id"#,
    )
    .bind(key.0.as_str())
    .bind(year_level)
    .bind(key.2.as_str())
    .fetch_one(db_pool)
    .await?;

    trace!(
        "resolved section {}/{}/{} -> {}",
        key.0,
        year_level,
        key.2,
        id
    );
    cache.insert(key, id);
    Ok(Some(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_year_level_ordinals() {
        assert_eq!(parse_year_level("1st"), Some(1));
        assert_eq!(parse_year_level("2nd Year"), Some(2));
        assert_eq!(parse_year_level("3rd yr"), Some(3));
        assert_eq!(parse_year_level("4th"), Some(4));
    }

    #[test]
    fn test_parse_year_level_plain_numbers() {
        assert_eq!(parse_year_level("1"), Some(1));
        assert_eq!(parse_year_level(" 4 "), Some(4));
        assert_eq!(parse_year_level("10"), Some(10));
        assert_eq!(parse_year_level("11"), None);
        assert_eq!(parse_year_level("0"), None);
    }

    #[test]
    fn test_parse_year_level_words_and_romans() {
        assert_eq!(parse_year_level("First Year"), Some(1));
        assert_eq!(parse_year_level("second"), Some(2));
        assert_eq!(parse_year_level("III"), Some(3));
        assert_eq!(parse_year_level("IV"), Some(4));
        assert_eq!(parse_year_level("V"), Some(5));
        assert_eq!(parse_year_level("II Year"), Some(2));
    }

    #[test]
    fn test_parse_year_level_garbage() {
        assert_eq!(parse_year_level(""), None);
        assert_eq!(parse_year_level("graduate"), None);
        assert_eq!(parse_year_level("x1"), None);
    }
}
