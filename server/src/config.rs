use crate::db_config::db_setup;
use sqlx::{Pool, Postgres};
use std::error::Error;
use std::sync::Arc;
use tokio::sync::RwLock;

/// The application state
///
/// Holds the timetable data wrapped in an Arc and RwLock so handlers can
/// share it.
///
/// # Fields
/// - `timetable_data`: Thread-safe storage for the application data
pub struct AppState {
    pub timetable_data: Arc<RwLock<TimetableData>>,
}

impl AppState {
    /// Creates a new `AppState` instance.
    ///
    /// # Returns
    /// `Ok(AppState)`, or an error if unable to initialize TimetableData
    ///
    /// # Errors
    /// This function will return an error if:
    /// - TimetableData cannot be initialized
    pub async fn new() -> Result<Self, Box<dyn Error>> {
        Ok(Self {
            timetable_data: Arc::new(RwLock::new(TimetableData::new().await?)),
        })
    }
}

/// The struct holds the database connection pool
///
/// # Fields
/// - `timetable_db`: The database connection pool
#[derive(Debug)]
pub struct TimetableData {
    pub timetable_db: Pool<Postgres>,
}

impl TimetableData {
    /// Creates a new `TimetableData` instance.
    ///
    /// This function initializes the database connection pool using the
    /// `db_setup` function.
    ///
    /// # Returns
    /// `Ok(TimetableData)` if the database connection pool is set up
    /// properly, or an error if not.
    ///
    /// # Errors
    /// This function will return an error if the database connection pool
    /// cannot be initialized.
    pub async fn new() -> Result<Self, Box<dyn Error>> {
        Ok(Self {
            timetable_db: db_setup().await?,
        })
    }
}
