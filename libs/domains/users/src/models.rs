use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Public user identifier, identical across storage backends
pub type UserId = u64;

/// Current time at millisecond precision.
///
/// Both backends store at least millisecond precision, so timestamps read back
/// compare equal to the ones that were written.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// User entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Unique
    pub email: String,
    /// Unique
    pub username: String,
    /// Never exposed in API responses
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub phone: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user that has not been persisted yet. The storage layer assigns `id` and
/// both timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub full_name: String,
    pub phone: String,
    pub is_active: bool,
}

impl NewUser {
    pub fn into_user(self, id: UserId, at: DateTime<Utc>) -> User {
        User {
            id,
            email: self.email,
            username: self.username,
            password_hash: self.password_hash,
            full_name: self.full_name,
            phone: self.phone,
            is_active: self.is_active,
            created_at: at,
            updated_at: at,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Input for creating a user; carries the plaintext password until it is hashed
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl CreateUser {
    pub fn new(
        email: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            username: username.into(),
            password: password.into(),
            full_name: String::new(),
            phone: String::new(),
            is_active: true,
        }
    }
}

/// Full replacement of a user's mutable fields.
///
/// An empty `password` keeps the stored hash.
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub email: String,
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub phone: String,
    pub is_active: bool,
}

impl From<&User> for UpdateUser {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            username: user.username.clone(),
            password: String::new(),
            full_name: user.full_name.clone(),
            phone: user.phone.clone(),
            is_active: user.is_active,
        }
    }
}

/// Partial update as received over HTTP; omitted fields keep their stored value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatchUser {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
}

impl PatchUser {
    /// Merge onto the current record, producing a full update
    pub fn merge(self, current: &User) -> UpdateUser {
        let base = UpdateUser::from(current);
        UpdateUser {
            email: self.email.unwrap_or(base.email),
            username: self.username.unwrap_or(base.username),
            password: self.password.unwrap_or_default(),
            full_name: self.full_name.unwrap_or(base.full_name),
            phone: self.phone.unwrap_or(base.phone),
            is_active: self.is_active.unwrap_or(base.is_active),
        }
    }
}

/// Query filter shared by listing and counting
///
/// `limit` absent means no limit, `offset` absent means 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserFilter {
    pub email: Option<String>,
    pub username: Option<String>,
    pub is_active: Option<bool>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl UserFilter {
    pub fn active(is_active: bool) -> Self {
        Self {
            is_active: Some(is_active),
            ..Self::default()
        }
    }

    /// Equality predicates only; pagination is not considered
    pub fn matches(&self, user: &User) -> bool {
        self.email.as_ref().is_none_or(|e| *e == user.email)
            && self.username.as_ref().is_none_or(|u| *u == user.username)
            && self.is_active.is_none_or(|a| a == user.is_active)
    }
}

/// User response DTO (without password_hash)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub full_name: String,
    pub phone: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            full_name: user.full_name,
            phone: user.phone,
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}
