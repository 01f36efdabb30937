//! Common utilities shared across all database implementations

pub mod error;
pub mod health;
pub mod timeout;

pub use error::{DatabaseError, DatabaseResult};
pub use health::HealthStatus;
pub use timeout::with_connect_timeout;
