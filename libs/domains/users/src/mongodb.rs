//! MongoDB implementation of UserRepository
//!
//! Documents keep their native `_id` ObjectId. The public integer id lives in a
//! separate `user_id` field, allocated from the `counters` collection with an
//! atomic `$inc` and protected by a unique index. Every lookup, update and
//! delete goes through `user_id`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, oid::ObjectId, Document},
    error::{ErrorKind, WriteFailure},
    options::{FindOptions, IndexOptions, ReturnDocument},
    Collection, Database, IndexModel,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{UserError, UserResult};
use crate::events::{EventBus, UserEvent};
use crate::models::{now, NewUser, User, UserFilter, UserId};
use crate::repository::UserRepository;

const USERS_COLLECTION: &str = "users";
const COUNTERS_COLLECTION: &str = "counters";
const USER_ID_SEQUENCE: &str = "user_id";

const EMAIL_INDEX: &str = "idx_email_unique";
const USERNAME_INDEX: &str = "idx_username_unique";
const USER_ID_INDEX: &str = "idx_user_id_unique";

const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    object_id: Option<ObjectId>,
    user_id: i64,
    email: String,
    username: String,
    password_hash: String,
    full_name: String,
    phone: String,
    is_active: bool,
    created_at: bson::DateTime,
    updated_at: bson::DateTime,
}

fn to_bson_datetime(at: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(at.timestamp_millis())
}

fn from_bson_datetime(at: bson::DateTime) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(at.timestamp_millis()).unwrap_or(DateTime::UNIX_EPOCH)
}

impl From<UserDocument> for User {
    fn from(doc: UserDocument) -> Self {
        User {
            id: doc.user_id as UserId,
            email: doc.email,
            username: doc.username,
            password_hash: doc.password_hash,
            full_name: doc.full_name,
            phone: doc.phone,
            is_active: doc.is_active,
            created_at: from_bson_datetime(doc.created_at),
            updated_at: from_bson_datetime(doc.updated_at),
        }
    }
}

/// MongoDB implementation of the UserRepository
#[derive(Clone)]
pub struct MongoUserRepository {
    collection: Collection<UserDocument>,
    counters: Collection<Document>,
    events: EventBus,
}

impl MongoUserRepository {
    pub fn new(db: &Database, events: EventBus) -> Self {
        Self {
            collection: db.collection::<UserDocument>(USERS_COLLECTION),
            counters: db.collection::<Document>(COUNTERS_COLLECTION),
            events,
        }
    }

    /// Create the unique indexes on email, username and user_id. Idempotent.
    pub async fn init_indexes(&self) -> UserResult<()> {
        let unique = |keys: Document, name: &str| {
            IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .name(name.to_string())
                        .build(),
                )
                .build()
        };

        let indexes = vec![
            unique(doc! { "email": 1 }, EMAIL_INDEX),
            unique(doc! { "username": 1 }, USERNAME_INDEX),
            unique(doc! { "user_id": 1 }, USER_ID_INDEX),
        ];

        self.collection.create_indexes(indexes).await?;
        tracing::info!("User indexes created successfully");
        Ok(())
    }

    /// Atomically allocate the next public user id
    async fn next_user_id(&self) -> UserResult<i64> {
        let counter = self
            .counters
            .find_one_and_update(
                doc! { "_id": USER_ID_SEQUENCE },
                doc! { "$inc": { "seq": 1_i64 } },
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await?;

        counter
            .as_ref()
            .and_then(|d| d.get_i64("seq").ok())
            .ok_or_else(|| UserError::Storage("user id counter returned no value".to_string()))
    }

    fn build_filter(filter: &UserFilter) -> Document {
        let mut doc = doc! {};

        if let Some(ref email) = filter.email {
            doc.insert("email", email);
        }
        if let Some(ref username) = filter.username {
            doc.insert("username", username);
        }
        if let Some(is_active) = filter.is_active {
            doc.insert("is_active", is_active);
        }

        doc
    }

    async fn find_one(&self, filter: Document) -> UserResult<Option<User>> {
        Ok(self.collection.find_one(filter).await?.map(Into::into))
    }
}

/// Translate a write error, turning duplicate-key errors on email or username
/// into conflicts
fn write_error(err: mongodb::error::Error) -> UserError {
    let duplicate = match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY => {
            Some(e.message.clone())
        }
        ErrorKind::Command(e) if e.code == DUPLICATE_KEY => Some(e.message.clone()),
        _ => None,
    };

    match duplicate {
        Some(message) if message.contains(USERNAME_INDEX) => UserError::username_taken(),
        Some(message) if message.contains(EMAIL_INDEX) => UserError::email_taken(),
        _ => err.into(),
    }
}

#[async_trait]
impl UserRepository for MongoUserRepository {
    #[instrument(skip(self, user), fields(username = %user.username))]
    async fn create(&self, user: NewUser) -> UserResult<User> {
        let user_id = self.next_user_id().await?;
        let at = to_bson_datetime(now());

        let mut document = UserDocument {
            object_id: None,
            user_id,
            email: user.email,
            username: user.username,
            password_hash: user.password_hash,
            full_name: user.full_name,
            phone: user.phone,
            is_active: user.is_active,
            created_at: at,
            updated_at: at,
        };

        let result = self
            .collection
            .insert_one(&document)
            .await
            .map_err(write_error)?;
        document.object_id = result.inserted_id.as_object_id();

        let created: User = document.into();
        tracing::info!(user_id = created.id, "Created user");
        self.events.publish(UserEvent::Created(created.clone()));
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: UserId) -> UserResult<User> {
        let Ok(user_id) = i64::try_from(id) else {
            return Err(UserError::not_found_id(id));
        };

        self.find_one(doc! { "user_id": user_id })
            .await?
            .ok_or_else(|| UserError::not_found_id(id))
    }

    #[instrument(skip(self))]
    async fn get_by_email(&self, email: &str) -> UserResult<User> {
        self.find_one(doc! { "email": email })
            .await?
            .ok_or_else(|| UserError::not_found_email(email))
    }

    #[instrument(skip(self))]
    async fn get_by_username(&self, username: &str) -> UserResult<User> {
        self.find_one(doc! { "username": username })
            .await?
            .ok_or_else(|| UserError::not_found_username(username))
    }

    #[instrument(skip(self))]
    async fn list(&self, filter: &UserFilter) -> UserResult<Vec<User>> {
        // A zero limit means "no limit" to MongoDB
        if filter.limit == Some(0) {
            return Ok(Vec::new());
        }

        let mut options = FindOptions::default();
        options.sort = Some(doc! { "user_id": 1 });
        options.skip = filter.offset;
        options.limit = filter.limit.map(|l| l.min(i64::MAX as u64) as i64);

        let cursor = self
            .collection
            .find(Self::build_filter(filter))
            .with_options(options)
            .await?;
        let documents: Vec<UserDocument> = cursor.try_collect().await?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, user), fields(user_id = user.id))]
    async fn update(&self, user: User) -> UserResult<User> {
        let Ok(user_id) = i64::try_from(user.id) else {
            return Err(UserError::not_found_id(user.id));
        };

        let update = doc! {
            "$set": {
                "email": &user.email,
                "username": &user.username,
                "password_hash": &user.password_hash,
                "full_name": &user.full_name,
                "phone": &user.phone,
                "is_active": user.is_active,
            },
            // Never earlier than the stored value, which is never before created_at
            "$max": { "updated_at": to_bson_datetime(now()) },
        };

        let updated: User = self
            .collection
            .find_one_and_update(doc! { "user_id": user_id }, update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(write_error)?
            .ok_or_else(|| UserError::not_found_id(user.id))?
            .into();

        tracing::info!(user_id = updated.id, "Updated user");
        self.events.publish(UserEvent::Updated(updated.clone()));
        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: UserId) -> UserResult<()> {
        let Ok(user_id) = i64::try_from(id) else {
            return Err(UserError::not_found_id(id));
        };

        let result = self.collection.delete_one(doc! { "user_id": user_id }).await?;

        if result.deleted_count == 0 {
            return Err(UserError::not_found_id(id));
        }

        tracing::info!(user_id = id, "Deleted user");
        self.events.publish(UserEvent::Deleted { id });
        Ok(())
    }

    #[instrument(skip(self))]
    async fn count(&self, filter: &UserFilter) -> UserResult<u64> {
        let count = self
            .collection
            .count_documents(Self::build_filter(filter))
            .await?;
        Ok(count)
    }
}
