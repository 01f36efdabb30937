//! Password hashing strategies
//!
//! The service only sees [`PasswordHasher`]; which algorithm sits behind it is
//! decided once at startup from [`HasherConfig`].

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Argon2,
};
use core_config::{env_or_default, env_parse_or_default, ConfigError, FromEnv};
use sha2::{Digest, Sha256};
use std::fmt::Debug;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{UserError, UserResult};

/// One-way password hashing and verification
pub trait PasswordHasher: Send + Sync + Debug {
    /// Hash a plaintext password
    fn hash(&self, password: &str) -> UserResult<String>;

    /// Check a plaintext password against a digest produced by [`hash`](Self::hash).
    ///
    /// A mismatch is `Ok(false)`; `Err` is reserved for unreadable digests.
    fn verify(&self, digest: &str, password: &str) -> UserResult<bool>;
}

/// bcrypt with a configurable cost factor.
///
/// bcrypt only reads the first 72 bytes of its input. Longer passwords are
/// rejected instead of being silently cut, so two plaintexts sharing a 72-byte
/// prefix never share a hash.
#[derive(Debug, Clone)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub const DEFAULT_COST: u32 = 10;
    pub const MIN_COST: u32 = 4;
    pub const MAX_COST: u32 = 31;
    pub const MAX_PASSWORD_BYTES: usize = 72;

    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(Self::DEFAULT_COST)
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, password: &str) -> UserResult<String> {
        if password.len() > Self::MAX_PASSWORD_BYTES {
            return Err(UserError::validation("password is too long"));
        }
        bcrypt::hash(password, self.cost).map_err(|e| UserError::PasswordHash(e.to_string()))
    }

    fn verify(&self, digest: &str, password: &str) -> UserResult<bool> {
        // Nothing longer than the limit was ever hashed
        if password.len() > Self::MAX_PASSWORD_BYTES {
            return Ok(false);
        }
        bcrypt::verify(password, digest).map_err(|e| UserError::PasswordHash(e.to_string()))
    }
}

/// argon2id with the crate's default parameters and a random salt per hash
#[derive(Debug, Clone, Default)]
pub struct Argon2Hasher;

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> UserResult<String> {
        let salt = SaltString::generate(&mut OsRng);

        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| UserError::PasswordHash(e.to_string()))
    }

    fn verify(&self, digest: &str, password: &str) -> UserResult<bool> {
        let parsed =
            PasswordHash::new(digest).map_err(|e| UserError::PasswordHash(e.to_string()))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}

/// Hex-encoded SHA-256 of `password + salt`.
///
/// Fast and deterministic, which makes it trivially brute-forceable. Not for
/// production use; kept for comparison and tests.
#[derive(Clone)]
pub struct Sha256Hasher {
    salt: String,
}

impl Sha256Hasher {
    pub fn new(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }

    fn digest(&self, password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(password.as_bytes());
        hasher.update(self.salt.as_bytes());
        const_hex::encode(hasher.finalize())
    }
}

impl Debug for Sha256Hasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sha256Hasher").finish_non_exhaustive()
    }
}

impl PasswordHasher for Sha256Hasher {
    fn hash(&self, password: &str) -> UserResult<String> {
        Ok(self.digest(password))
    }

    fn verify(&self, digest: &str, password: &str) -> UserResult<bool> {
        Ok(self.digest(password) == digest)
    }
}

/// Available hashing algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HasherKind {
    #[default]
    Bcrypt,
    Argon2,
    Sha256,
}

impl FromStr for HasherKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bcrypt" => Ok(HasherKind::Bcrypt),
            "argon2" => Ok(HasherKind::Argon2),
            "sha256" => Ok(HasherKind::Sha256),
            other => Err(format!(
                "unknown password hasher '{}', expected bcrypt, argon2 or sha256",
                other
            )),
        }
    }
}

/// Selects and parameterises the password hasher
#[derive(Clone, Default)]
pub struct HasherConfig {
    pub kind: HasherKind,
    /// Only used by bcrypt; `None` means [`BcryptHasher::DEFAULT_COST`]
    pub bcrypt_cost: Option<u32>,
    /// Required by sha256, ignored otherwise
    pub sha256_salt: Option<String>,
}

impl Debug for HasherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HasherConfig")
            .field("kind", &self.kind)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("sha256_salt", &self.sha256_salt.as_ref().map(|_| "***"))
            .finish()
    }
}

impl HasherConfig {
    /// Reject a password length policy the selected algorithm cannot honour
    pub fn check_max_password_length(&self, max_password_length: usize) -> Result<(), ConfigError> {
        if self.kind == HasherKind::Bcrypt && max_password_length > BcryptHasher::MAX_PASSWORD_BYTES {
            return Err(ConfigError::InvalidValue {
                key: "USERS_MAX_PASSWORD_LENGTH".to_string(),
                details: format!(
                    "bcrypt accepts at most {} bytes, got {}",
                    BcryptHasher::MAX_PASSWORD_BYTES,
                    max_password_length
                ),
            });
        }
        Ok(())
    }

    pub fn build(&self) -> Result<Arc<dyn PasswordHasher>, ConfigError> {
        match self.kind {
            HasherKind::Bcrypt => {
                let cost = self.bcrypt_cost.unwrap_or(BcryptHasher::DEFAULT_COST);
                if !(BcryptHasher::MIN_COST..=BcryptHasher::MAX_COST).contains(&cost) {
                    return Err(ConfigError::InvalidValue {
                        key: "USERS_BCRYPT_COST".to_string(),
                        details: format!(
                            "cost must be between {} and {}, got {}",
                            BcryptHasher::MIN_COST,
                            BcryptHasher::MAX_COST,
                            cost
                        ),
                    });
                }
                Ok(Arc::new(BcryptHasher::new(cost)))
            }
            HasherKind::Argon2 => Ok(Arc::new(Argon2Hasher)),
            HasherKind::Sha256 => match self.sha256_salt.as_deref() {
                Some(salt) if !salt.is_empty() => Ok(Arc::new(Sha256Hasher::new(salt))),
                _ => Err(ConfigError::MissingEnvVar("USERS_SHA256_SALT".to_string())),
            },
        }
    }
}

/// Environment variables:
/// - `USERS_PASSWORD_HASHER` (optional, default: bcrypt)
/// - `USERS_BCRYPT_COST` (optional, default: 10)
/// - `USERS_SHA256_SALT` (required when the hasher is sha256)
impl FromEnv for HasherConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let kind = env_or_default("USERS_PASSWORD_HASHER", "bcrypt")
            .parse()
            .map_err(|details| ConfigError::InvalidValue {
                key: "USERS_PASSWORD_HASHER".to_string(),
                details,
            })?;

        Ok(Self {
            kind,
            bcrypt_cost: Some(env_parse_or_default("USERS_BCRYPT_COST", "10")?),
            sha256_salt: std::env::var("USERS_SHA256_SALT").ok(),
        })
    }
}
