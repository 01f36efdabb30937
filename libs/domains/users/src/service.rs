use core_config::{env_parse_or_default, ConfigError, FromEnv};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, instrument};

use crate::error::{UserError, UserResult};
use crate::models::{CreateUser, NewUser, UpdateUser, User, UserFilter, UserId};
use crate::password::PasswordHasher;
use crate::repository::UserRepository;

static EMAIL_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$").unwrap()
});

/// Validation policy, fixed for the lifetime of a [`UserService`]
///
/// Password lengths are measured in bytes, matching bcrypt's 72-byte input limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserServiceConfig {
    pub validate_email: bool,
    pub validate_password: bool,
    pub min_password_length: usize,
    pub max_password_length: usize,
}

impl Default for UserServiceConfig {
    fn default() -> Self {
        Self {
            validate_email: true,
            validate_password: true,
            min_password_length: 8,
            max_password_length: 72,
        }
    }
}

/// Environment variables:
/// - `USERS_VALIDATE_EMAIL` (optional, default: true)
/// - `USERS_VALIDATE_PASSWORD` (optional, default: true)
/// - `USERS_MIN_PASSWORD_LENGTH` (optional, default: 8)
/// - `USERS_MAX_PASSWORD_LENGTH` (optional, default: 72)
impl FromEnv for UserServiceConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            validate_email: env_parse_or_default("USERS_VALIDATE_EMAIL", "true")?,
            validate_password: env_parse_or_default("USERS_VALIDATE_PASSWORD", "true")?,
            min_password_length: env_parse_or_default("USERS_MIN_PASSWORD_LENGTH", "8")?,
            max_password_length: env_parse_or_default("USERS_MAX_PASSWORD_LENGTH", "72")?,
        };

        if config.min_password_length > config.max_password_length {
            return Err(ConfigError::InvalidValue {
                key: "USERS_MIN_PASSWORD_LENGTH".to_string(),
                details: format!(
                    "minimum {} exceeds maximum {}",
                    config.min_password_length, config.max_password_length
                ),
            });
        }

        Ok(config)
    }
}

/// Service layer for User business logic
pub struct UserService<R: UserRepository> {
    repository: Arc<R>,
    hasher: Arc<dyn PasswordHasher>,
    config: UserServiceConfig,
}

impl<R: UserRepository> Clone for UserService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            hasher: Arc::clone(&self.hasher),
            config: self.config.clone(),
        }
    }
}

impl<R: UserRepository> UserService<R> {
    pub fn new(repository: R, hasher: Arc<dyn PasswordHasher>, config: UserServiceConfig) -> Self {
        Self {
            repository: Arc::new(repository),
            hasher,
            config,
        }
    }

    pub fn config(&self) -> &UserServiceConfig {
        &self.config
    }

    /// Validate, check uniqueness, hash and persist a new user.
    ///
    /// The uniqueness checks are advisory. Two concurrent creates can both pass
    /// them, in which case the storage layer rejects the loser with
    /// [`UserError::Conflict`].
    #[instrument(skip(self, input), fields(username = %input.username))]
    pub async fn create_user(&self, input: CreateUser) -> UserResult<User> {
        self.validate_create(&input)?;

        ensure_absent(self.repository.get_by_email(&input.email).await, UserError::email_taken)?;
        ensure_absent(
            self.repository.get_by_username(&input.username).await,
            UserError::username_taken,
        )?;

        let CreateUser {
            email,
            username,
            password,
            full_name,
            phone,
            is_active,
        } = input;

        let password_hash = self.hash_password(password).await?;

        self.repository
            .create(NewUser {
                email,
                username,
                password_hash,
                full_name,
                phone,
                is_active,
            })
            .await
    }

    pub async fn get_user_by_id(&self, id: UserId) -> UserResult<User> {
        self.repository.get_by_id(id).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> UserResult<User> {
        self.repository.get_by_email(email).await
    }

    pub async fn get_user_by_username(&self, username: &str) -> UserResult<User> {
        self.repository.get_by_username(username).await
    }

    pub async fn list_users(&self, filter: &UserFilter) -> UserResult<Vec<User>> {
        self.repository.list(filter).await
    }

    /// Replace the mutable fields of an existing user.
    ///
    /// The password is rehashed only when it is non-empty and differs from the
    /// stored hash; otherwise the stored hash is kept.
    #[instrument(skip(self, input))]
    pub async fn update_user(&self, id: UserId, input: UpdateUser) -> UserResult<User> {
        let existing = self.repository.get_by_id(id).await?;

        let UpdateUser {
            email,
            username,
            password,
            full_name,
            phone,
            is_active,
        } = input;

        let password_hash = if !password.is_empty() && password != existing.password_hash {
            debug!(user_id = id, "Rehashing changed password");
            self.hash_password(password).await?
        } else {
            existing.password_hash.clone()
        };

        self.repository
            .update(User {
                email,
                username,
                password_hash,
                full_name,
                phone,
                is_active,
                ..existing
            })
            .await
    }

    pub async fn delete_user(&self, id: UserId) -> UserResult<()> {
        self.repository.delete(id).await
    }

    /// Number of users matching the filter; `limit` and `offset` are ignored
    pub async fn count_users(&self, filter: &UserFilter) -> UserResult<u64> {
        self.repository.count(filter).await
    }

    /// Check a plaintext password against the user's stored hash
    pub fn verify_password(&self, user: &User, password: &str) -> UserResult<bool> {
        self.hasher.verify(&user.password_hash, password)
    }

    fn validate_create(&self, input: &CreateUser) -> UserResult<()> {
        if input.email.is_empty() {
            return Err(UserError::validation("email is required"));
        }
        if input.username.is_empty() {
            return Err(UserError::validation("username is required"));
        }
        if input.password.is_empty() {
            return Err(UserError::validation("password is required"));
        }

        if self.config.validate_email && !EMAIL_FORMAT.is_match(&input.email) {
            return Err(UserError::validation("invalid email format"));
        }

        if self.config.validate_password {
            let len = input.password.len();
            if len < self.config.min_password_length {
                return Err(UserError::validation("password is too short"));
            }
            if len > self.config.max_password_length {
                return Err(UserError::validation("password is too long"));
            }
        }

        Ok(())
    }

    async fn hash_password(&self, password: String) -> UserResult<String> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| UserError::PasswordHash(e.to_string()))?
    }
}

/// A lookup that found someone is a conflict; NotFound is the good case
fn ensure_absent(lookup: UserResult<User>, conflict: fn() -> UserError) -> UserResult<()> {
    match lookup {
        Ok(_) => Err(conflict()),
        Err(err) if err.is_not_found() => Ok(()),
        Err(err) => Err(err),
    }
}
