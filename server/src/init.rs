use sqlx::{Pool, Postgres};
use std::env;
use tracing::{info, warn};

/// Startup checks against the reference data the engine depends on.
///
/// Generation cannot place anything without an active room catalog, so an
/// empty one is worth a loud warning as soon as the service boots rather
/// than a wall of "no suitable room" skips later.
pub async fn initialize_defaults(pool: &Pool<Postgres>) -> Result<(), Box<dyn std::error::Error>> {
    let active_rooms: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM rooms WHERE is_active = TRUE")
            .fetch_one(pool)
            .await?;

    if active_rooms == 0 {
        warn!("no active rooms in the catalog; schedule generation will skip every meeting");
    } else {
        info!("room catalog ready: {} active rooms", active_rooms);
    }

    if let Ok(budget) = env::var("GENERATION_TIME_BUDGET_SECS") {
        match budget.parse::<u64>() {
            Ok(secs) => info!("generation time budget set to {}s", secs),
            Err(_) => warn!(
                "GENERATION_TIME_BUDGET_SECS is not a number ({}); using the default",
                budget
            ),
        }
    }

    Ok(())
}
