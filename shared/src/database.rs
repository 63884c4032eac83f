use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use anyhow::Result;
use tracing::info;

pub async fn get_db_connection(database_url: &str) -> Result<DatabaseConnection> {
    info!("Connecting to database via Sea-ORM ({})", backend_name(database_url));

    let mut options = ConnectOptions::new(database_url);
    // Every pooled connection to `sqlite::memory:` would see its own empty database.
    if database_url.contains(":memory:") {
        options.max_connections(1).min_connections(1);
    }
    options.sqlx_logging(false);

    let db = Database::connect(options).await?;
    Ok(db)
}

fn backend_name(database_url: &str) -> &str {
    database_url.split(':').next().unwrap_or("unknown")
}
