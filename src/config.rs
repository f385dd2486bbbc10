use anyhow::Context;
use sqlx::postgres::PgConnectOptions;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database = DatabaseConfig {
            url: lookup("DATABASE_URL").filter(|v| !v.is_empty()),
            host: lookup("DB_HOST").unwrap_or_else(|| "localhost".into()),
            port: lookup("DB_PORT")
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(5432),
            user: lookup("DB_USER"),
            password: lookup("DB_PASSWORD"),
            database: lookup("DB_DATABASE"),
            max_connections: lookup("DB_MAX_CONNECTIONS")
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(10),
        };

        if database.url.is_none() {
            database.user.as_ref().context("DB_USER must be set when DATABASE_URL is absent")?;
            database
                .database
                .as_ref()
                .context("DB_DATABASE must be set when DATABASE_URL is absent")?;
        }

        let server = ServerConfig {
            host: lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: lookup("APP_PORT")
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(7800),
        };

        Ok(Self { database, server })
    }
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> anyhow::Result<PgConnectOptions> {
        if let Some(url) = &self.url {
            return url.parse::<PgConnectOptions>().context("parse DATABASE_URL");
        }

        let user = self.user.as_deref().context("DB_USER is not set")?;
        let database = self.database.as_deref().context("DB_DATABASE is not set")?;
        let mut opts = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(user)
            .database(database);
        if let Some(password) = &self.password {
            opts = opts.password(password);
        }
        Ok(opts)
    }
}
