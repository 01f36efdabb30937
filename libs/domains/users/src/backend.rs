//! Storage backend selection and connection lifecycle
//!
//! [`UserBackend`] owns the one connection the process uses. It connects on
//! first use, serialises concurrent first uses so only one connection is ever
//! established, and leaves the cell empty when connecting fails so a later
//! call can try again. Closing waits for an in-flight connect to settle, so a
//! connection can never be opened behind a `close`.

use async_trait::async_trait;
use core_config::{env_or_default, ConfigError, FromEnv};
use database::mongodb::{self as mongo, MongoConfig};
use database::postgres::{self as pg, PostgresConfig};
use database::HealthStatus;
use mongodb::Client;
use sea_orm::DatabaseConnection;
use std::fmt;
use std::str::FromStr;
use tokio::sync::{OnceCell, RwLock};
use tracing::{info, instrument};

use crate::error::{UserError, UserResult};
use crate::events::EventBus;
use crate::models::{NewUser, User, UserFilter, UserId};
use crate::mongodb::MongoUserRepository;
use crate::postgres::PostgresUserRepository;
use crate::repository::UserRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Postgres,
    MongoDb,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Postgres => write!(f, "postgres"),
            BackendKind::MongoDb => write!(f, "mongodb"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(BackendKind::Postgres),
            "mongodb" | "mongo" => Ok(BackendKind::MongoDb),
            other => Err(format!(
                "unsupported database type '{}', expected postgres or mongodb",
                other
            )),
        }
    }
}

/// Which backend to use plus the connection settings for each
#[derive(Debug, Clone, Default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub postgres: PostgresConfig,
    pub mongo: MongoConfig,
}

impl BackendConfig {
    pub fn postgres(config: PostgresConfig) -> Self {
        Self {
            kind: BackendKind::Postgres,
            postgres: config,
            ..Self::default()
        }
    }

    pub fn mongo(config: MongoConfig) -> Self {
        Self {
            kind: BackendKind::MongoDb,
            mongo: config,
            ..Self::default()
        }
    }
}

/// Environment variables:
/// - `DB_TYPE` (optional, default: postgres) - `postgres` or `mongodb`
/// - `DB_*` - see [`PostgresConfig`]
/// - `MONGO_*` - see [`MongoConfig`]
impl FromEnv for BackendConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let kind = env_or_default("DB_TYPE", "postgres")
            .parse()
            .map_err(|details| ConfigError::InvalidValue {
                key: "DB_TYPE".to_string(),
                details,
            })?;

        Ok(Self {
            kind,
            postgres: PostgresConfig::from_env()?,
            mongo: MongoConfig::from_env()?,
        })
    }
}

enum Connection {
    Postgres(DatabaseConnection),
    Mongo(Client),
}

struct Connected {
    connection: Connection,
    store: UserStore,
}

/// Lazily connected, process-wide storage backend
///
/// Nothing is opened by [`UserBackend::new`]; the first call to
/// [`repository`](Self::repository) or [`check_health`](Self::check_health)
/// connects. The server binary calls `repository()` during startup so a bad
/// database configuration fails fast, which makes the lazy path visible mostly
/// to library users and tests.
pub struct UserBackend {
    config: BackendConfig,
    events: EventBus,
    connected: OnceCell<Connected>,
    /// Read-held while connecting, write-held while closing
    closed: RwLock<bool>,
}

impl fmt::Debug for UserBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserBackend")
            .field("kind", &self.config.kind)
            .field("connected", &self.is_connected())
            .field("closed", &self.closed.try_read().map(|closed| *closed).ok())
            .finish()
    }
}

impl UserBackend {
    /// Repositories handed out by this backend publish on `events`
    pub fn new(config: BackendConfig, events: EventBus) -> Self {
        Self {
            config,
            events,
            connected: OnceCell::new(),
            closed: RwLock::new(false),
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.config.kind
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn is_connected(&self) -> bool {
        self.connected.initialized()
    }

    /// Repository over the shared connection, connecting first if needed
    pub async fn repository(&self) -> UserResult<UserStore> {
        Ok(self.connection().await?.store.clone())
    }

    /// Ping whichever backend is configured
    #[instrument(skip(self), fields(backend = %self.config.kind))]
    pub async fn check_health(&self) -> UserResult<()> {
        match &self.connection().await?.connection {
            Connection::Postgres(db) => pg::check_health(db).await?,
            Connection::Mongo(client) => mongo::check_health(client).await?,
        }
        Ok(())
    }

    /// Readiness report: connects if needed, then pings, timing both
    pub async fn health_status(&self) -> HealthStatus {
        HealthStatus::measure(self.check_health()).await
    }

    /// Tear the shared connection down. Only the first call does anything.
    pub async fn close(&self) -> UserResult<()> {
        let mut closed = self.closed.write().await;
        if *closed {
            return Ok(());
        }
        *closed = true;

        let Some(connected) = self.connected.get() else {
            return Ok(());
        };

        match &connected.connection {
            Connection::Postgres(db) => db.close_by_ref().await?,
            Connection::Mongo(client) => client.clone().shutdown().immediate(true).await,
        }

        info!(backend = %self.config.kind, "Database connection closed");
        Ok(())
    }

    async fn connection(&self) -> UserResult<&Connected> {
        let closed = self.closed.read().await;
        if *closed {
            return Err(UserError::Storage("database connection is closed".to_string()));
        }

        self.connected.get_or_try_init(|| self.connect()).await
    }

    #[instrument(skip(self), fields(backend = %self.config.kind))]
    async fn connect(&self) -> UserResult<Connected> {
        match self.config.kind {
            BackendKind::Postgres => {
                let db = pg::connect_from_config(&self.config.postgres).await?;
                let repository = PostgresUserRepository::new(db.clone(), self.events.clone());
                repository.init_schema().await?;

                Ok(Connected {
                    connection: Connection::Postgres(db),
                    store: UserStore::Postgres(repository),
                })
            }
            BackendKind::MongoDb => {
                let client = mongo::connect_from_config(&self.config.mongo).await?;
                let db = client.database(self.config.mongo.database());
                let repository = MongoUserRepository::new(&db, self.events.clone());
                repository.init_indexes().await?;

                Ok(Connected {
                    connection: Connection::Mongo(client),
                    store: UserStore::Mongo(repository),
                })
            }
        }
    }
}

/// The repository of whichever backend was selected
#[derive(Clone)]
pub enum UserStore {
    Postgres(PostgresUserRepository),
    Mongo(MongoUserRepository),
}

#[async_trait]
impl UserRepository for UserStore {
    async fn create(&self, user: NewUser) -> UserResult<User> {
        match self {
            UserStore::Postgres(repo) => repo.create(user).await,
            UserStore::Mongo(repo) => repo.create(user).await,
        }
    }

    async fn get_by_id(&self, id: UserId) -> UserResult<User> {
        match self {
            UserStore::Postgres(repo) => repo.get_by_id(id).await,
            UserStore::Mongo(repo) => repo.get_by_id(id).await,
        }
    }

    async fn get_by_email(&self, email: &str) -> UserResult<User> {
        match self {
            UserStore::Postgres(repo) => repo.get_by_email(email).await,
            UserStore::Mongo(repo) => repo.get_by_email(email).await,
        }
    }

    async fn get_by_username(&self, username: &str) -> UserResult<User> {
        match self {
            UserStore::Postgres(repo) => repo.get_by_username(username).await,
            UserStore::Mongo(repo) => repo.get_by_username(username).await,
        }
    }

    async fn list(&self, filter: &UserFilter) -> UserResult<Vec<User>> {
        match self {
            UserStore::Postgres(repo) => repo.list(filter).await,
            UserStore::Mongo(repo) => repo.list(filter).await,
        }
    }

    async fn update(&self, user: User) -> UserResult<User> {
        match self {
            UserStore::Postgres(repo) => repo.update(user).await,
            UserStore::Mongo(repo) => repo.update(user).await,
        }
    }

    async fn delete(&self, id: UserId) -> UserResult<()> {
        match self {
            UserStore::Postgres(repo) => repo.delete(id).await,
            UserStore::Mongo(repo) => repo.delete(id).await,
        }
    }

    async fn count(&self, filter: &UserFilter) -> UserResult<u64> {
        match self {
            UserStore::Postgres(repo) => repo.count(filter).await,
            UserStore::Mongo(repo) => repo.count(filter).await,
        }
    }
}
