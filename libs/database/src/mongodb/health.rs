use mongodb::{bson::doc, Client};
use tracing::debug;

use crate::common::DatabaseError;

/// Check MongoDB health with a `ping` against the admin database
pub async fn check_health(client: &Client) -> Result<(), DatabaseError> {
    debug!("Running MongoDB health check");

    client
        .database("admin")
        .run_command(doc! { "ping": 1 })
        .await
        .map_err(|e| {
            DatabaseError::HealthCheckFailed(format!("MongoDB health check failed: {}", e))
        })?;

    debug!("MongoDB health check passed");
    Ok(())
}
