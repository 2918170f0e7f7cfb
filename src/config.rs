use anyhow::{Context, Result};
use serde::Deserialize;

/// Service configuration, read from the environment (optionally seeded from
/// a `.env` file by `main`).
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Address the HTTP listener binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Application connection string (subject to row-level policies).
    pub database_url: String,
    /// Privileged connection string used only to run migrations.
    pub database_admin_url: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to read configuration from environment")?;

        settings
            .try_deserialize()
            .context("invalid configuration: DATABASE_URL and DATABASE_ADMIN_URL must be set")
    }
}
