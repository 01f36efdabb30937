//! PostgreSQL test infrastructure
//!
//! Provides a `TestDatabase` helper that creates a PostgreSQL container for testing.
//! No schema is applied here; repositories create their own tables on connect.

use database::postgres::PostgresConfig;
use sea_orm::{Database, DatabaseConnection};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;

/// Test database wrapper that ensures proper cleanup
///
/// The container is automatically stopped and removed when this struct is dropped.
pub struct TestDatabase {
    #[allow(dead_code)]
    container: ContainerAsync<Postgres>,
    pub connection: DatabaseConnection,
    pub config: PostgresConfig,
}

impl TestDatabase {
    /// Start a fresh PostgreSQL container and connect to it
    ///
    /// # Example
    ///
    /// ```no_run
    /// use test_utils::TestDatabase;
    ///
    /// # async fn example() {
    /// let db = TestDatabase::new().await;
    /// // Use db.connection() or db.config() to build your repository
    /// # }
    /// ```
    pub async fn new() -> Self {
        // Use Postgres 18 to match production
        let postgres = Postgres::default().with_tag("18-alpine");

        let container = postgres
            .start()
            .await
            .expect("Failed to start Postgres container");

        let host_port = container
            .get_host_port_ipv4(5432)
            .await
            .expect("Failed to get host port");

        let config = PostgresConfig::new("127.0.0.1", host_port, "postgres", "postgres", "postgres");

        let connection = Database::connect(config.url())
            .await
            .expect("Failed to connect to test database");

        tracing::info!(port = host_port, "Test database ready (Postgres 18)");

        Self {
            container,
            connection,
            config,
        }
    }

    /// Get a cloned connection (useful for passing to repositories)
    pub fn connection(&self) -> DatabaseConnection {
        self.connection.clone()
    }

    /// Connection settings pointing at the container
    pub fn config(&self) -> PostgresConfig {
        self.config.clone()
    }
}

// Container is automatically cleaned up when TestDatabase is dropped
impl Drop for TestDatabase {
    fn drop(&mut self) {
        tracing::debug!("Cleaning up test database container");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires Docker
    async fn test_database_creation() {
        let db = TestDatabase::new().await;
        assert!(db.config().url().starts_with("postgres://"));
    }
}
