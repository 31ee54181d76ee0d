use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use std::error::Error;
use tracing::trace;

/// Builds the Postgres pool from the environment and runs any pending
/// migrations.
///
/// # Returns
/// The connection pool, or an error when a variable is missing, the
/// password file is unreadable, or the database is unreachable.
pub async fn db_setup() -> Result<Pool<Postgres>, Box<dyn Error>> {
    use std::env::var;
    use std::fs;

    let pg_user = var("PG_USER")?;
    let password_file = var("PG_PASSWORDFILE")?;
    let password = fs::read_to_string(password_file)?;
    let pg_host = var("PG_HOST")?;
    let pg_dbname = var("PG_DBNAME")?;

    let connection = db_connect(&pg_user, &password, &pg_host, &pg_dbname).await?;
    tracing::info!("Connected to: {:?}", connection);
    tracing::info!("Running migrations if any are needed");
    sqlx::migrate!().run(&connection).await?;

    Ok(connection)
}

async fn db_connect(
    pg_user: &str,
    password: &str,
    pg_host: &str,
    pg_dbname: &str,
) -> Result<Pool<Postgres>, sqlx::Error> {
    let url = format!(
        "postgresql://{}:{}@{}:5432/{}",
        pg_user,
        password.trim(),
        pg_host,
        pg_dbname,
    );

    trace!("Attempting connection to: {}", &pg_host);

    PgPoolOptions::new().connect(&url).await
}
