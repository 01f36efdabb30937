//! Users Domain
//!
//! User management over a swappable persistence layer with in-process event
//! notification.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  ← HTTP endpoints
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐     ┌──────────────┐
//! │   Service   │ ──► │ PasswordHasher│  ← bcrypt / argon2 / sha256
//! └──────┬──────┘     └──────────────┘
//!        │
//! ┌──────▼──────┐     ┌──────────────┐
//! │ Repository  │ ──► │   EventBus   │  ← fire-and-forget listeners
//! └──────┬──────┘     └──────────────┘
//!        │
//! ┌──────▼──────┐
//! │   Backend   │  ← PostgreSQL or MongoDB, one lazy shared connection
//! └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use domain_users::{
//!     handlers, AuditLogListener, BcryptHasher, EventBus, InMemoryUserRepository,
//!     UserService, UserServiceConfig,
//! };
//!
//! let events = EventBus::new();
//! events.attach(Arc::new(AuditLogListener));
//!
//! let repository = InMemoryUserRepository::new(events);
//! let service = UserService::new(
//!     repository,
//!     Arc::new(BcryptHasher::default()),
//!     UserServiceConfig::default(),
//! );
//!
//! let router: axum::Router = handlers::router(service);
//! ```

pub mod backend;
pub mod error;
pub mod events;
pub mod handlers;
pub mod models;
pub mod mongodb;
pub mod password;
pub mod postgres;
pub mod repository;
pub mod service;

// Re-export commonly used types
pub use backend::{BackendConfig, BackendKind, UserBackend, UserStore};
pub use error::{UserError, UserResult};
pub use events::{
    AuditLogListener, ChannelListener, EventBus, EventKind, EventListener, ListenerError,
    ListenerId, UserEvent, WelcomeNotifier,
};
pub use models::{
    CreateUser, NewUser, PatchUser, UpdateUser, User, UserFilter, UserId, UserResponse,
};
pub use crate::mongodb::MongoUserRepository;
pub use password::{
    Argon2Hasher, BcryptHasher, HasherConfig, HasherKind, PasswordHasher, Sha256Hasher,
};
pub use postgres::PostgresUserRepository;
pub use repository::{InMemoryUserRepository, UserRepository};
pub use service::{UserService, UserServiceConfig};
