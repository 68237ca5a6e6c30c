/// Configuration management for the Runbook CLI
///
/// Settings come from environment variables, with a `.env` file in the
/// working directory loaded first when present.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: SQLite URL (default: `sqlite://runbook.db`)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 5)
/// - `DEFAULT_ADMIN_EMAIL`: Email for `create-admin` (default: admin@cyberpatriot.local)
/// - `DEFAULT_ADMIN_NAME`: Display name for `create-admin` (default: Admin User)
/// - `DEFAULT_ADMIN_PASSWORD`: Password for `create-admin` (no default)
/// - `RUST_LOG`: Log filter (default: `runbook_cli=info,runbook_core=info`)
///
/// # Example
///
/// ```no_run
/// use runbook_cli::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Using database {}", config.database.url);
/// # Ok(())
/// # }
/// ```

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://runbook.db";
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@cyberpatriot.local";
pub const DEFAULT_ADMIN_NAME: &str = "Admin User";

/// Complete CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseSettings,

    /// Defaults for the bootstrap admin account
    pub admin: AdminSettings,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// Bootstrap admin defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminSettings {
    pub email: String,
    pub name: String,

    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable doesn't parse.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(value) => value
                .trim()
                .parse::<u32>()
                .with_context(|| format!("DATABASE_MAX_CONNECTIONS is not a number: {}", value))?,
            None => 5,
        };
        if max_connections == 0 {
            anyhow::bail!("DATABASE_MAX_CONNECTIONS must be at least 1");
        }

        Ok(Self {
            database: DatabaseSettings {
                url,
                max_connections,
            },
            admin: AdminSettings {
                email: lookup("DEFAULT_ADMIN_EMAIL")
                    .unwrap_or_else(|| DEFAULT_ADMIN_EMAIL.to_string()),
                name: lookup("DEFAULT_ADMIN_NAME").unwrap_or_else(|| DEFAULT_ADMIN_NAME.to_string()),
                password: lookup("DEFAULT_ADMIN_PASSWORD").filter(|p| !p.is_empty()),
            },
        })
    }

    /// Pool settings for `runbook_core::db::pool::create_pool`
    pub fn pool_config(&self) -> runbook_core::db::pool::DatabaseConfig {
        runbook_core::db::pool::DatabaseConfig {
            url: self.database.url.clone(),
            max_connections: self.database.max_connections,
            ..Default::default()
        }
    }
}
