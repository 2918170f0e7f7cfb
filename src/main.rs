use anyhow::Result;
use dotenv::dotenv;
use sqlx::Connection;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use clinicore::auth::{AuthService, JwtConfig};
use clinicore::clinic::ClinicService;
use clinicore::config::AppConfig;
use clinicore::db;
use clinicore::http::{AppState, build_router};
use clinicore::provisioning::ProvisioningService;
use clinicore::scheduling::SchedulingService;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment variables from .env file
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting clinicore");

    let config = AppConfig::from_env()?;

    // Run migrations over a dedicated admin connection, then close it
    info!("Running database migrations with admin privileges");
    let mut admin_conn = db::create_admin_connection(&config.database_admin_url).await?;
    sqlx::migrate!("./sql/migrations").run(&mut admin_conn).await?;
    let _ = admin_conn.close().await;
    info!("Migrations completed successfully");

    // Initialize the application database connection pool
    let pool = db::init_pool(&config.database_url).await?;

    // Initialize JWT configuration and services
    let jwt_config = JwtConfig::from_env()?;
    let auth = Arc::new(AuthService::new(pool.clone(), jwt_config));
    let provisioning = Arc::new(ProvisioningService::new(pool.clone(), auth.clone()));
    let scheduling = Arc::new(SchedulingService::new(pool.clone()));
    let clinic = Arc::new(ClinicService::new(pool));
    info!("Services initialized");

    let state = AppState {
        auth,
        provisioning,
        scheduling,
        clinic,
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on {}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
