//! Shared test utilities for the users workspace
//!
//! - `TestDatabase`: throwaway PostgreSQL container (feature: "postgres")
//! - `TestMongo`: throwaway MongoDB container (feature: "mongo")
//! - `TestDataBuilder`: per-test unique, reproducible user data
//! - `assertions`: small helpers with readable failure messages
//!
//! # Features
//!
//! - `postgres` (default)
//! - `mongo`
//! - `all`
//!
//! # Usage
//!
//! ```rust,no_run
//! use test_utils::{TestDatabase, TestDataBuilder};
//!
//! #[tokio::test]
//! async fn my_postgres_test() {
//!     let db = TestDatabase::new().await;
//!     let data = TestDataBuilder::from_test_name("my_postgres_test");
//!
//!     let email = data.email("alice");     // alice.<seed>@example.com
//!     let username = data.username("alice"); // alice_<seed>
//! }
//! ```
//!
//! Containers share nothing, so tests may run in parallel. Each one costs a
//! few seconds of startup and needs a reachable Docker daemon.

#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "mongo")]
mod mongo;

#[cfg(feature = "postgres")]
pub use postgres::TestDatabase;

#[cfg(feature = "mongo")]
pub use mongo::TestMongo;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Generates email addresses, usernames and passwords that are unique per
/// seed, so tests sharing a database never collide on the unique keys.
#[derive(Debug, Clone, Copy)]
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Seed from the test's name; the same name always yields the same data
    pub fn from_test_name(name: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn email(&self, local: &str) -> String {
        format!("{}.{}@example.com", local, self.seed)
    }

    pub fn username(&self, base: &str) -> String {
        format!("{}_{}", base, self.seed)
    }

    /// A password that passes the default length policy (8..=72 bytes)
    pub fn password(&self) -> String {
        format!("pw-{:016x}", self.seed)
    }
}

/// Test assertion helpers
pub mod assertions {
    pub fn assert_some<T>(value: Option<T>, context: &str) -> T {
        value.unwrap_or_else(|| panic!("{}: expected Some, got None", context))
    }

    /// Unwrap the error side, failing with the unexpected `Ok` value
    pub fn assert_err<T: std::fmt::Debug, E>(result: Result<T, E>, context: &str) -> E {
        match result {
            Ok(value) => panic!("{}: expected Err, got Ok({:?})", context, value),
            Err(e) => e,
        }
    }
}
