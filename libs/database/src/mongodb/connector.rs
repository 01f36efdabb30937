use mongodb::{bson::doc, options::ClientOptions, Client};
use std::time::Duration;
use tracing::info;

use super::MongoConfig;
use crate::common::{with_connect_timeout, DatabaseError};

/// Connect to MongoDB by URI and verify the deployment answers a ping,
/// bounded by `timeout_secs`.
///
/// # Example
/// ```ignore
/// use database::mongodb::connect;
///
/// let client = connect("mongodb://localhost:27017", 10).await?;
/// let db = client.database("users_db");
/// ```
pub async fn connect(url: &str, timeout_secs: u64) -> Result<Client, DatabaseError> {
    let config = MongoConfig::with_database(url, "admin").with_timeout(timeout_secs);
    connect_from_config(&config).await
}

/// Connect using a MongoConfig
///
/// The driver connects lazily, so a `ping` against `admin` is issued to make
/// an unreachable deployment fail here rather than on the first query. Parsing,
/// connecting and the ping together are bounded by `connect_timeout_secs`.
///
/// # Example
/// ```ignore
/// use database::mongodb::{MongoConfig, connect_from_config};
/// use core_config::FromEnv;
///
/// let config = MongoConfig::from_env()?;
/// let client = connect_from_config(&config).await?;
/// ```
pub async fn connect_from_config(config: &MongoConfig) -> Result<Client, DatabaseError> {
    let timeout = Duration::from_secs(config.connect_timeout_secs.max(1));

    let client = with_connect_timeout("mongodb", config.connect_timeout_secs, async {
        let mut options = ClientOptions::parse(&config.url).await?;

        options.max_pool_size = Some(config.max_pool_size);
        options.min_pool_size = Some(config.min_pool_size);
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);

        if let Some(ref app_name) = config.app_name {
            options.app_name = Some(app_name.clone());
        }

        let client = Client::with_options(options)?;

        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        Ok(client)
    })
    .await?;

    info!(database = %config.database, "Successfully connected to MongoDB");
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_invalid_uri() {
        let config = MongoConfig::with_database("not-a-mongo-uri", "test").with_timeout(1);
        let result = connect_from_config(&config).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_connect_unreachable_fails_within_timeout() {
        let config =
            MongoConfig::with_database("mongodb://127.0.0.1:1/?directConnection=true", "test")
                .with_timeout(1);

        let started = std::time::Instant::now();
        let result = connect_from_config(&config).await;
        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    #[ignore] // Requires actual MongoDB
    async fn test_connect() {
        let mongo_url = std::env::var("MONGO_URI")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

        let result = connect(&mongo_url, 5).await;
        assert!(result.is_ok());
    }
}
