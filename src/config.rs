use std::{env, fmt};

use anyhow::{Context, Result, bail};
use sqlx::postgres::{PgConnectOptions, PgSslMode};

const REQUIRED_POSTGRES_VARS: [&str; 5] = [
    "POSTGRES_HOST",
    "POSTGRES_PORT",
    "POSTGRES_USER",
    "POSTGRES_PASSWORD",
    "POSTGRES_DB",
];

#[derive(Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl PostgresConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
            .ssl_mode(PgSslMode::Disable)
    }
}

impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseBackend {
    Postgres(PostgresConfig),
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database: DatabaseBackend,
    pub db_max_connections: u32,
    /// Upper bound on request bodies; `None` leaves uploads unbounded.
    pub max_upload_bytes: Option<usize>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source. Empty values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let host = var("APP_HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = var("APP_PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse::<u16>()
            .context("APP_PORT must be a valid u16")?;

        let db_max_connections = var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse::<u32>()
            .context("DB_MAX_CONNECTIONS must be a valid u32")?;

        let max_upload_bytes = var("MAX_UPLOAD_BYTES")
            .map(|raw| raw.parse::<usize>())
            .transpose()
            .context("MAX_UPLOAD_BYTES must be a valid byte count")?;

        let backend = var("DATABASE_BACKEND").unwrap_or_else(|| "postgres".to_string());
        let database = match backend.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => DatabaseBackend::Postgres(postgres_from(&var)?),
            "memory" | "in-memory" => DatabaseBackend::Memory,
            _ => bail!("DATABASE_BACKEND must be one of: postgres, memory"),
        };

        Ok(Self {
            host,
            port,
            database,
            db_max_connections,
            max_upload_bytes,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn postgres_from<F>(var: &F) -> Result<PostgresConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let missing = REQUIRED_POSTGRES_VARS
        .iter()
        .copied()
        .filter(|key| var(key).is_none())
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        bail!("environment variables must be set: {}", missing.join(", "));
    }

    let required = |key: &str| var(key).unwrap_or_default();

    Ok(PostgresConfig {
        host: required("POSTGRES_HOST"),
        port: required("POSTGRES_PORT")
            .parse::<u16>()
            .context("POSTGRES_PORT must be a valid u16")?,
        user: required("POSTGRES_USER"),
        password: required("POSTGRES_PASSWORD"),
        database: required("POSTGRES_DB"),
    })
}
