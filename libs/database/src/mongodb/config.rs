#[cfg(feature = "config")]
use core_config::{env_or_default, env_parse_or_default, ConfigError, FromEnv};

/// MongoDB database configuration
///
/// # Example
///
/// ```ignore
/// use database::mongodb::MongoConfig;
///
/// let config = MongoConfig::with_database("mongodb://localhost:27017", "users_db");
///
/// // From environment variables (requires `config` feature)
/// let config = MongoConfig::from_env()?;
/// ```
#[derive(Clone, Debug)]
pub struct MongoConfig {
    /// MongoDB connection URI
    /// Format: mongodb://[username:password@]host[:port][/database][?options]
    pub url: String,

    /// Database name to use
    pub database: String,

    /// Optional application name for server logs
    pub app_name: Option<String>,

    /// Maximum number of connections in the pool
    pub max_pool_size: u32,

    /// Minimum number of connections in the pool
    pub min_pool_size: u32,

    /// Upper bound for connecting and selecting a server, in seconds
    pub connect_timeout_secs: u64,
}

impl MongoConfig {
    pub fn with_database(url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            database: database.into(),
            ..Self::default()
        }
    }

    /// Set the application name for server logs
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn database(&self) -> &str {
        &self.database
    }
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            url: "mongodb://localhost:27017".to_string(),
            database: "users_db".to_string(),
            app_name: None,
            max_pool_size: 20,
            min_pool_size: 0,
            connect_timeout_secs: 10,
        }
    }
}

/// Load MongoConfig from environment variables
///
/// Environment variables:
/// - `MONGO_URI` (optional, default: mongodb://localhost:27017)
/// - `MONGO_DB_NAME` (optional, default: users_db)
/// - `MONGO_APP_NAME` (optional) - Application name for server logs
/// - `MONGO_TIMEOUT` (optional, default: 10) - Connect timeout in seconds
/// - `MONGO_MAX_POOL_SIZE` (optional, default: 20)
/// - `MONGO_MIN_POOL_SIZE` (optional, default: 0)
#[cfg(feature = "config")]
impl FromEnv for MongoConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env_or_default("MONGO_URI", "mongodb://localhost:27017"),
            database: env_or_default("MONGO_DB_NAME", "users_db"),
            app_name: std::env::var("MONGO_APP_NAME").ok(),
            max_pool_size: env_parse_or_default("MONGO_MAX_POOL_SIZE", "20")?,
            min_pool_size: env_parse_or_default("MONGO_MIN_POOL_SIZE", "0")?,
            connect_timeout_secs: env_parse_or_default("MONGO_TIMEOUT", "10")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mongo_config_with_database() {
        let config = MongoConfig::with_database("mongodb://db:27017", "accounts");
        assert_eq!(config.url(), "mongodb://db:27017");
        assert_eq!(config.database(), "accounts");
        assert_eq!(config.connect_timeout_secs, 10);
    }

    #[test]
    fn test_mongo_config_builders() {
        let config = MongoConfig::default()
            .with_app_name("users-api")
            .with_timeout(3);
        assert_eq!(config.app_name, Some("users-api".to_string()));
        assert_eq!(config.connect_timeout_secs, 3);
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_mongo_config_from_env_defaults() {
        temp_env::with_vars_unset(
            ["MONGO_URI", "MONGO_DB_NAME", "MONGO_TIMEOUT", "MONGO_MAX_POOL_SIZE"],
            || {
                let config = MongoConfig::from_env().unwrap();
                assert_eq!(config.url, "mongodb://localhost:27017");
                assert_eq!(config.database, "users_db");
                assert_eq!(config.connect_timeout_secs, 10);
                assert_eq!(config.max_pool_size, 20);
            },
        );
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_mongo_config_from_env_custom() {
        temp_env::with_vars(
            [
                ("MONGO_URI", Some("mongodb://mongo:27017")),
                ("MONGO_DB_NAME", Some("people")),
                ("MONGO_TIMEOUT", Some("5")),
            ],
            || {
                let config = MongoConfig::from_env().unwrap();
                assert_eq!(config.url, "mongodb://mongo:27017");
                assert_eq!(config.database, "people");
                assert_eq!(config.connect_timeout_secs, 5);
            },
        );
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_mongo_config_from_env_invalid_timeout() {
        temp_env::with_var("MONGO_TIMEOUT", Some("ten"), || {
            let err = MongoConfig::from_env().unwrap_err();
            assert!(err.to_string().contains("MONGO_TIMEOUT"));
        });
    }
}
