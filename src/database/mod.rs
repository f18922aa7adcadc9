use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

pub type DatabasePool = Arc<PgPool>;

pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    // TLS is negotiated by the native-tls runtime when DATABASE_URL carries sslmode=require.
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    if database_url.contains("sslmode=require") || database_url.contains("sslmode=prefer") {
        tracing::info!("Database connection configured to use TLS");
    } else if !database_url.contains("localhost") && !database_url.contains("127.0.0.1") {
        tracing::warn!("Connecting to remote database without explicit sslmode. Consider adding sslmode=require");
    }

    Ok(pool)
}

pub async fn new_pool(database_url: &str) -> anyhow::Result<DatabasePool> {
    let pool = create_pool(database_url).await?;
    Ok(Arc::new(pool))
}

/// Apply the embedded migrations under `migrations/`.
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}
