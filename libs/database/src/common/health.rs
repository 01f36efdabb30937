use std::fmt::Display;
use std::future::Future;
use tokio::time::Instant;

/// Health check result for detailed status reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    pub healthy: bool,
    pub message: Option<String>,
    pub response_time_ms: u64,
}

impl HealthStatus {
    pub fn healthy(response_time_ms: u64) -> Self {
        Self {
            healthy: true,
            message: None,
            response_time_ms,
        }
    }

    pub fn unhealthy(message: String, response_time_ms: u64) -> Self {
        Self {
            healthy: false,
            message: Some(message),
            response_time_ms,
        }
    }

    /// Run a health check and record how long it took
    pub async fn measure<F, E>(check: F) -> Self
    where
        F: Future<Output = Result<(), E>>,
        E: Display,
    {
        let start = Instant::now();
        let result = check.await;
        let elapsed = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => Self::healthy(elapsed),
            Err(e) => Self::unhealthy(e.to_string(), elapsed),
        }
    }
}
