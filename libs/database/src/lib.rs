//! Database library providing connectors and utilities for PostgreSQL and MongoDB
//!
//! Each connector establishes exactly one client/pool per call, bounded by the
//! configured connect timeout. Callers decide how long the handle lives; the
//! library never retries on its own.
//!
//! # Features
//!
//! - `postgres` (default) - PostgreSQL support with SeaORM
//! - `mongodb` - MongoDB support
//! - `config` - Configuration support with `core_config::FromEnv`
//! - `all` - All database features
//!
//! # Examples
//!
//! ## PostgreSQL
//!
//! ```ignore
//! use database::postgres::{self, PostgresConfig};
//!
//! let config = PostgresConfig::new("localhost", 5432, "postgres", "postgres", "users_db");
//! let db = postgres::connect_from_config(&config).await?;
//! postgres::check_health(&db).await?;
//! ```
//!
//! ## MongoDB
//!
//! ```ignore
//! use database::mongodb::{self, MongoConfig};
//!
//! let config = MongoConfig::with_database("mongodb://localhost:27017", "users_db");
//! let client = mongodb::connect_from_config(&config).await?;
//! let db = client.database(config.database());
//! ```

pub mod common;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "mongodb")]
pub mod mongodb;

pub use common::{DatabaseError, DatabaseResult, HealthStatus};
