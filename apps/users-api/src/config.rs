use core_config::{server::ServerConfig, FromEnv};
use domain_users::{BackendConfig, HasherConfig, UserServiceConfig};

use crate::cors::CorsConfig;

// Re-export Environment for use in other modules
pub use core_config::Environment;

/// Application-specific configuration
/// Composes shared config components from the `config` library
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: Environment,
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub service: UserServiceConfig,
    pub hasher: HasherConfig,
    pub cors: CorsConfig,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let service = UserServiceConfig::from_env()?;
        let hasher = HasherConfig::from_env()?;
        hasher.check_max_password_length(service.max_password_length)?;

        Ok(Self {
            environment: Environment::from_env(),
            server: ServerConfig::from_env()?,
            backend: BackendConfig::from_env()?,
            service,
            hasher,
            cors: CorsConfig::from_env()?,
        })
    }
}
