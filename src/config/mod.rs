use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;
use sqlx::sqlite::SqliteConnectOptions;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub ping_failure: PingFailureMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Postgres,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    /// Target database name. For the sqlite backend this is the database
    /// file path, or `:memory:`.
    pub name: String,
    /// Extra connection parameters in URL query form, e.g. `sslmode=disable`.
    pub params: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub statement_timeout_secs: u64,
}

/// What a request does when the liveness ping against the pool fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PingFailureMode {
    /// Log and terminate the whole process with a non-zero status.
    #[default]
    Exit,
    /// Answer the failing request with 503 and keep serving.
    Unavailable,
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn statement_timeout(&self) -> Duration {
        Duration::from_secs(self.statement_timeout_secs)
    }

    pub fn is_in_memory(&self) -> bool {
        self.name == ":memory:"
    }

    /// Options for a server-level connection that does not select the target
    /// database. Postgres falls back to the database named after the user.
    ///
    /// Only `params` goes through URL parsing; a host starting with `/` is a
    /// Unix socket directory, anything else (IPv6 included) is used as is.
    pub fn server_options(&self) -> Result<PgConnectOptions, sqlx::Error> {
        let options = if self.params.is_empty() {
            PgConnectOptions::new()
        } else {
            PgConnectOptions::from_str(&format!("postgres:///?{}", self.params))?
        };

        let options = if self.host.starts_with('/') {
            options.socket(&self.host)
        } else {
            options.host(&self.host)
        };

        Ok(options
            .port(self.port)
            .username(&self.user)
            .password(&self.password))
    }

    /// Options for connections to the target database itself.
    pub fn database_options(&self) -> Result<PgConnectOptions, sqlx::Error> {
        Ok(self.server_options()?.database(&self.name))
    }

    pub fn sqlite_options(&self) -> Result<SqliteConnectOptions, sqlx::Error> {
        if self.is_in_memory() {
            return SqliteConnectOptions::from_str("sqlite::memory:");
        }

        Ok(SqliteConnectOptions::new()
            .filename(&self.name)
            .create_if_missing(true))
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source. Empty
    /// values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| -> String {
            lookup(key)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let port = var("PORT", "8080")
            .parse::<u16>()
            .context("PORT must be a valid port number")?;

        let backend = match var("DB_BACKEND", "postgres").to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            "sqlite" => DatabaseBackend::Sqlite,
            other => anyhow::bail!("unknown DB_BACKEND '{other}', expected postgres or sqlite"),
        };

        let db_port = var("DB_PORT", "5432")
            .parse::<u16>()
            .context("DB_PORT must be a valid port number")?;
        let max_connections = var("DB_MAX_CONNECTIONS", "10")
            .parse::<u32>()
            .context("DB_MAX_CONNECTIONS must be a positive integer")?;
        let acquire_timeout_secs = var("DB_ACQUIRE_TIMEOUT_SECS", "5")
            .parse::<u64>()
            .context("DB_ACQUIRE_TIMEOUT_SECS must be a number of seconds")?;
        let statement_timeout_secs = var("DB_STATEMENT_TIMEOUT_SECS", "5")
            .parse::<u64>()
            .context("DB_STATEMENT_TIMEOUT_SECS must be a number of seconds")?;

        if max_connections == 0 {
            anyhow::bail!("DB_MAX_CONNECTIONS must be at least 1");
        }

        let ping_failure = match var("PING_FAILURE_MODE", "exit").to_lowercase().as_str() {
            "exit" => PingFailureMode::Exit,
            "unavailable" => PingFailureMode::Unavailable,
            other => {
                tracing::warn!(
                    "Unknown PING_FAILURE_MODE '{other}', falling back to 'exit'. Supported values: exit, unavailable"
                );
                PingFailureMode::Exit
            }
        };

        Ok(Config {
            server: ServerConfig {
                host: var("HOST", "0.0.0.0"),
                port,
            },
            database: DatabaseConfig {
                backend,
                user: var("DB_USER", "postgres"),
                password: var("DB_PASS", "postgres"),
                host: var("DB_HOST", "localhost"),
                port: db_port,
                name: var("DB_NAME", "moon"),
                params: var("DB_PARAMS", "sslmode=disable"),
                max_connections,
                acquire_timeout_secs,
                statement_timeout_secs,
            },
            ping_failure,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.server.port, 8080);
        assert!(matches!(config.database.backend, DatabaseBackend::Postgres));
        assert_eq!(config.database.user, "postgres");
        assert_eq!(config.database.password, "postgres");
        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.name, "moon");
        assert_eq!(config.database.params, "sslmode=disable");
        assert_eq!(config.ping_failure, PingFailureMode::Exit);
    }

    #[test]
    fn test_empty_values_fall_back_to_defaults() {
        let config = config_from(&[("DB_NAME", ""), ("PORT", "")]).unwrap();

        assert_eq!(config.database.name, "moon");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("PORT", "9000"),
            ("DB_USER", "visits"),
            ("DB_HOST", "db.internal"),
            ("DB_PORT", "6543"),
            ("DB_NAME", "earth"),
            ("PING_FAILURE_MODE", "unavailable"),
        ])
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.database.user, "visits");
        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.port, 6543);
        assert_eq!(config.database.name, "earth");
        assert_eq!(config.ping_failure, PingFailureMode::Unavailable);
    }

    #[test]
    fn test_bad_port_is_an_error() {
        let err = config_from(&[("DB_PORT", "not-a-port")]).unwrap_err();
        assert!(err.to_string().contains("DB_PORT"));
    }

    #[test]
    fn test_unknown_backend_is_an_error() {
        assert!(config_from(&[("DB_BACKEND", "oracle")]).is_err());
    }

    #[test]
    fn test_database_options_select_target_database() {
        let config = config_from(&[("DB_NAME", "earth")]).unwrap();

        let server = config.database.server_options().unwrap();
        let database = config.database.database_options().unwrap();

        assert_eq!(server.get_host(), "localhost");
        assert_eq!(server.get_port(), 5432);
        assert_eq!(server.get_username(), "postgres");
        assert_eq!(database.get_database(), Some("earth"));
    }

    #[test]
    fn test_ipv6_host_is_accepted() {
        let config = config_from(&[("DB_HOST", "::1"), ("DB_PORT", "6543")]).unwrap();

        let options = config.database.server_options().unwrap();

        assert_eq!(options.get_host(), "::1");
        assert_eq!(options.get_port(), 6543);
    }

    #[test]
    fn test_socket_directory_host_is_accepted() {
        let config = config_from(&[("DB_HOST", "/var/run/postgresql")]).unwrap();

        assert!(config.database.server_options().is_ok());
    }

    #[test]
    fn test_params_are_applied() {
        let config = config_from(&[("DB_PARAMS", "sslmode=disable&application_name=moon")])
            .unwrap();

        let options = config.database.database_options().unwrap();

        assert_eq!(options.get_application_name(), Some("moon"));
        assert_eq!(options.get_host(), "localhost");
    }
}
