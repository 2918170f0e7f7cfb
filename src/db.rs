use anyhow::Result;
use sqlx::{
    Connection, PgConnection, PgPool,
    postgres::{PgConnectOptions, PgPoolOptions},
};
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

use crate::error::Result as AppResult;

/// Checked-out connection carrying a clinic context.
pub type ScopedConnection = sqlx::pool::PoolConnection<sqlx::Postgres>;

/// Initialize the application connection pool. This connection is subject to
/// the clinic row-level policies.
pub async fn init_pool(database_url: &str) -> Result<PgPool> {
    info!("Initializing application database connection pool");

    let options = PgConnectOptions::from_str(database_url)?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    info!("Application database connection pool initialized");
    Ok(pool)
}

/// Create a single privileged connection, used only for migrations.
pub async fn create_admin_connection(database_admin_url: &str) -> Result<PgConnection> {
    info!("Creating admin database connection for migrations");

    let options = PgConnectOptions::from_str(database_admin_url)?;
    let conn = PgConnection::connect_with(&options).await?;

    info!("Admin database connection established");
    Ok(conn)
}

/// Check out one connection and set its clinic context. The context is a
/// session variable, so it only scopes statements run on the same connection;
/// callers must run their queries on the returned connection, never on the
/// pool, or the context may land on a different pooled connection than the
/// query.
pub async fn clinic_scoped_connection(pool: &PgPool, clinic_id: Uuid) -> AppResult<ScopedConnection> {
    let mut conn = pool.acquire().await?;
    sqlx::query("SELECT set_clinic_context($1)")
        .bind(clinic_id)
        .execute(&mut *conn)
        .await?;

    Ok(conn)
}

/// Check out one connection with the clinic context cleared, for cross-clinic
/// lookups such as membership resolution at login.
pub async fn unscoped_connection(pool: &PgPool) -> AppResult<ScopedConnection> {
    let mut conn = pool.acquire().await?;
    sqlx::query("SELECT clear_clinic_context()")
        .execute(&mut *conn)
        .await?;

    Ok(conn)
}
