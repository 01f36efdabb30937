use std::future::Future;
use std::time::Duration;
use tracing::warn;

use super::DatabaseError;

/// Run a connection attempt, failing with [`DatabaseError::ConnectTimeout`]
/// if it does not finish within `secs` seconds.
///
/// A timeout of zero is treated as one second so a misconfiguration can not
/// turn into an attempt that never starts.
pub async fn with_connect_timeout<T, F>(
    target: &str,
    secs: u64,
    attempt: F,
) -> Result<T, DatabaseError>
where
    F: Future<Output = Result<T, DatabaseError>>,
{
    let secs = secs.max(1);

    match tokio::time::timeout(Duration::from_secs(secs), attempt).await {
        Ok(result) => result,
        Err(_) => {
            warn!(target_db = target, secs, "Connection attempt timed out");
            Err(DatabaseError::ConnectTimeout {
                target: target.to_string(),
                secs,
            })
        }
    }
}
