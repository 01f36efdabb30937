use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{UserError, UserResult};
use crate::events::{EventBus, UserEvent};
use crate::models::{now, NewUser, User, UserFilter, UserId};

/// Repository trait for User persistence
///
/// Every implementation behaves the same from the caller's side: lookups that
/// miss return [`UserError::NotFound`], unique-key violations on email or
/// username return [`UserError::Conflict`], and each committed mutation is
/// published on the [`EventBus`] the repository was built with.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user; assigns `id`, `created_at` and `updated_at`
    async fn create(&self, user: NewUser) -> UserResult<User>;

    async fn get_by_id(&self, id: UserId) -> UserResult<User>;

    async fn get_by_email(&self, email: &str) -> UserResult<User>;

    async fn get_by_username(&self, username: &str) -> UserResult<User>;

    /// List users matching the filter, ordered by id
    async fn list(&self, filter: &UserFilter) -> UserResult<Vec<User>>;

    /// Replace all mutable fields of an existing user and refresh `updated_at`
    async fn update(&self, user: User) -> UserResult<User>;

    async fn delete(&self, id: UserId) -> UserResult<()>;

    /// Count users matching the filter's predicates; pagination is ignored
    async fn count(&self, filter: &UserFilter) -> UserResult<u64>;
}

/// Apply offset/limit to an already filtered, ordered sequence
pub(crate) fn paginate<T>(items: impl Iterator<Item = T>, filter: &UserFilter) -> Vec<T> {
    let offset = filter.offset.unwrap_or(0) as usize;
    match filter.limit {
        Some(limit) => items.skip(offset).take(limit as usize).collect(),
        None => items.skip(offset).collect(),
    }
}

#[derive(Debug, Default)]
struct Store {
    users: BTreeMap<UserId, User>,
    next_id: UserId,
}

/// In-memory implementation of UserRepository (for development/testing)
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserRepository {
    store: Arc<RwLock<Store>>,
    events: EventBus,
}

impl InMemoryUserRepository {
    pub fn new(events: EventBus) -> Self {
        Self {
            store: Arc::new(RwLock::new(Store {
                users: BTreeMap::new(),
                next_id: 1,
            })),
            events,
        }
    }

    fn check_unique(store: &Store, user_id: Option<UserId>, email: &str, username: &str) -> UserResult<()> {
        for existing in store.users.values() {
            if Some(existing.id) == user_id {
                continue;
            }
            if existing.email == email {
                return Err(UserError::email_taken());
            }
            if existing.username == username {
                return Err(UserError::username_taken());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: NewUser) -> UserResult<User> {
        let created = {
            let mut store = self.store.write().await;
            Self::check_unique(&store, None, &user.email, &user.username)?;

            let id = store.next_id.max(1);
            store.next_id = id + 1;

            let created = user.into_user(id, now());
            store.users.insert(id, created.clone());
            created
        };

        tracing::info!(user_id = created.id, "Created user");
        self.events.publish(UserEvent::Created(created.clone()));
        Ok(created)
    }

    async fn get_by_id(&self, id: UserId) -> UserResult<User> {
        let store = self.store.read().await;
        store
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| UserError::not_found_id(id))
    }

    async fn get_by_email(&self, email: &str) -> UserResult<User> {
        let store = self.store.read().await;
        store
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| UserError::not_found_email(email))
    }

    async fn get_by_username(&self, username: &str) -> UserResult<User> {
        let store = self.store.read().await;
        store
            .users
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or_else(|| UserError::not_found_username(username))
    }

    async fn list(&self, filter: &UserFilter) -> UserResult<Vec<User>> {
        let store = self.store.read().await;
        let matching = store.users.values().filter(|u| filter.matches(u)).cloned();
        Ok(paginate(matching, filter))
    }

    async fn update(&self, user: User) -> UserResult<User> {
        let updated = {
            let mut store = self.store.write().await;

            let created_at = store
                .users
                .get(&user.id)
                .map(|existing| existing.created_at)
                .ok_or_else(|| UserError::not_found_id(user.id))?;

            Self::check_unique(&store, Some(user.id), &user.email, &user.username)?;

            let updated = User {
                created_at,
                updated_at: now().max(created_at),
                ..user
            };
            store.users.insert(updated.id, updated.clone());
            updated
        };

        tracing::info!(user_id = updated.id, "Updated user");
        self.events.publish(UserEvent::Updated(updated.clone()));
        Ok(updated)
    }

    async fn delete(&self, id: UserId) -> UserResult<()> {
        let removed = self.store.write().await.users.remove(&id);

        if removed.is_none() {
            return Err(UserError::not_found_id(id));
        }

        tracing::info!(user_id = id, "Deleted user");
        self.events.publish(UserEvent::Deleted { id });
        Ok(())
    }

    async fn count(&self, filter: &UserFilter) -> UserResult<u64> {
        let store = self.store.read().await;
        Ok(store.users.values().filter(|u| filter.matches(u)).count() as u64)
    }
}
