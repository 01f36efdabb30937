//! PostgreSQL implementation of UserRepository using raw SeaORM statements

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DbBackend, DbErr, FromQueryResult, SqlErr, Statement,
    Value,
};
use tracing::instrument;

use crate::error::{UserError, UserResult};
use crate::events::{EventBus, UserEvent};
use crate::models::{now, NewUser, User, UserFilter, UserId};
use crate::repository::UserRepository;

const CREATE_USERS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        email VARCHAR(255) NOT NULL UNIQUE,
        username VARCHAR(255) NOT NULL UNIQUE,
        password_hash VARCHAR(255) NOT NULL,
        full_name VARCHAR(255) NOT NULL DEFAULT '',
        phone VARCHAR(50) NOT NULL DEFAULT '',
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
"#;

/// PostgreSQL implementation of UserRepository
#[derive(Clone)]
pub struct PostgresUserRepository {
    db: DatabaseConnection,
    events: EventBus,
}

impl PostgresUserRepository {
    pub fn new(db: DatabaseConnection, events: EventBus) -> Self {
        Self { db, events }
    }

    /// Create the `users` table and its unique constraints if missing
    pub async fn init_schema(&self) -> UserResult<()> {
        self.db.execute_unprepared(CREATE_USERS_TABLE).await?;
        tracing::info!("Users table ready");
        Ok(())
    }
}

/// Helper struct for deserializing user rows from the database
#[derive(Debug, FromQueryResult)]
struct UserRow {
    id: i64,
    email: String,
    username: String,
    password_hash: String,
    full_name: String,
    phone: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id as UserId,
            email: row.email,
            username: row.username,
            password_hash: row.password_hash,
            full_name: row.full_name,
            phone: row.phone,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromQueryResult)]
struct CountRow {
    count: i64,
}

/// Ids above `i64::MAX` can not exist in a BIGSERIAL column
fn db_id(id: UserId) -> Option<i64> {
    i64::try_from(id).ok()
}

/// Translate a write error, turning unique violations into conflicts
fn write_error(err: DbErr) -> UserError {
    let unique_violation = match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => Some(detail),
        _ => {
            let msg = err.to_string();
            (msg.contains("duplicate key") || msg.contains("unique constraint")).then_some(msg)
        }
    };

    match unique_violation {
        Some(detail) if detail.contains("username") => UserError::username_taken(),
        Some(_) => UserError::email_taken(),
        None => err.into(),
    }
}

/// Build the WHERE clause and its bound values for a filter.
///
/// Placeholders are numbered from `$1`; the returned vector holds one value
/// per placeholder, in order.
fn where_clause(filter: &UserFilter) -> (String, Vec<Value>) {
    let mut conditions = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(ref email) = filter.email {
        values.push(email.clone().into());
        conditions.push(format!("email = ${}", values.len()));
    }
    if let Some(ref username) = filter.username {
        values.push(username.clone().into());
        conditions.push(format!("username = ${}", values.len()));
    }
    if let Some(is_active) = filter.is_active {
        values.push(is_active.into());
        conditions.push(format!("is_active = ${}", values.len()));
    }

    if conditions.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), values)
    }
}

impl PostgresUserRepository {
    async fn find_one(&self, sql: &str, value: Value) -> UserResult<Option<User>> {
        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, sql, [value]);
        let row = UserRow::find_by_statement(stmt).one(&self.db).await?;
        Ok(row.map(Into::into))
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    #[instrument(skip(self, user), fields(username = %user.username))]
    async fn create(&self, user: NewUser) -> UserResult<User> {
        let sql = r#"
            INSERT INTO users (email, username, password_hash, full_name, phone, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *
        "#;

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            sql,
            [
                user.email.into(),
                user.username.into(),
                user.password_hash.into(),
                user.full_name.into(),
                user.phone.into(),
                user.is_active.into(),
                now().into(),
            ],
        );

        let created: User = UserRow::find_by_statement(stmt)
            .one(&self.db)
            .await
            .map_err(write_error)?
            .ok_or_else(|| UserError::Storage("insert returned no row".to_string()))?
            .into();

        tracing::info!(user_id = created.id, "Created user");
        self.events.publish(UserEvent::Created(created.clone()));
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: UserId) -> UserResult<User> {
        let Some(db_id) = db_id(id) else {
            return Err(UserError::not_found_id(id));
        };

        self.find_one("SELECT * FROM users WHERE id = $1", db_id.into())
            .await?
            .ok_or_else(|| UserError::not_found_id(id))
    }

    #[instrument(skip(self))]
    async fn get_by_email(&self, email: &str) -> UserResult<User> {
        self.find_one("SELECT * FROM users WHERE email = $1", email.into())
            .await?
            .ok_or_else(|| UserError::not_found_email(email))
    }

    #[instrument(skip(self))]
    async fn get_by_username(&self, username: &str) -> UserResult<User> {
        self.find_one("SELECT * FROM users WHERE username = $1", username.into())
            .await?
            .ok_or_else(|| UserError::not_found_username(username))
    }

    #[instrument(skip(self))]
    async fn list(&self, filter: &UserFilter) -> UserResult<Vec<User>> {
        let (where_sql, mut values) = where_clause(filter);
        let mut sql = format!("SELECT * FROM users{} ORDER BY id", where_sql);

        if let Some(limit) = filter.limit {
            values.push((limit.min(i64::MAX as u64) as i64).into());
            sql.push_str(&format!(" LIMIT ${}", values.len()));
        }
        if let Some(offset) = filter.offset {
            values.push((offset.min(i64::MAX as u64) as i64).into());
            sql.push_str(&format!(" OFFSET ${}", values.len()));
        }

        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, sql, values);
        let rows = UserRow::find_by_statement(stmt).all(&self.db).await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, user), fields(user_id = user.id))]
    async fn update(&self, user: User) -> UserResult<User> {
        let Some(db_id) = db_id(user.id) else {
            return Err(UserError::not_found_id(user.id));
        };

        let sql = r#"
            UPDATE users
            SET email = $2, username = $3, password_hash = $4, full_name = $5,
                phone = $6, is_active = $7, updated_at = GREATEST($8, created_at)
            WHERE id = $1
            RETURNING *
        "#;

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            sql,
            [
                db_id.into(),
                user.email.into(),
                user.username.into(),
                user.password_hash.into(),
                user.full_name.into(),
                user.phone.into(),
                user.is_active.into(),
                now().into(),
            ],
        );

        let updated: User = UserRow::find_by_statement(stmt)
            .one(&self.db)
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
        let Some(db_id) = db_id(id) else {
            return Err(UserError::not_found_id(id));
        };

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "DELETE FROM users WHERE id = $1",
            [db_id.into()],
        );
        let result = self.db.execute_raw(stmt).await?;

        if result.rows_affected() == 0 {
            return Err(UserError::not_found_id(id));
        }

        tracing::info!(user_id = id, "Deleted user");
        self.events.publish(UserEvent::Deleted { id });
        Ok(())
    }

    #[instrument(skip(self))]
    async fn count(&self, filter: &UserFilter) -> UserResult<u64> {
        let (where_sql, values) = where_clause(filter);
        let sql = format!("SELECT COUNT(*) AS count FROM users{}", where_sql);

        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, sql, values);
        let row = CountRow::find_by_statement(stmt).one(&self.db).await?;

        Ok(row.map(|r| r.count.max(0) as u64).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_where_clause_empty() {
        let (sql, values) = where_clause(&UserFilter::default());
        assert!(sql.is_empty());
        assert!(values.is_empty());
    }

    #[test]
    fn test_where_clause_numbers_placeholders_in_order() {
        let filter = UserFilter {
            email: Some("a@b.com".into()),
            is_active: Some(true),
            ..UserFilter::default()
        };
        let (sql, values) = where_clause(&filter);
        assert_eq!(sql, " WHERE email = $1 AND is_active = $2");
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_where_clause_ignores_pagination() {
        let filter = UserFilter {
            username: Some("bob".into()),
            limit: Some(10),
            offset: Some(5),
            ..UserFilter::default()
        };
        let (sql, values) = where_clause(&filter);
        assert_eq!(sql, " WHERE username = $1");
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn test_write_error_maps_unique_violations() {
        let email = DbErr::Custom(
            "duplicate key value violates unique constraint \"users_email_key\"".into(),
        );
        assert_eq!(
            write_error(email).to_string(),
            "user with this email already exists"
        );

        let username = DbErr::Custom(
            "duplicate key value violates unique constraint \"users_username_key\"".into(),
        );
        assert_eq!(
            write_error(username).to_string(),
            "user with this username already exists"
        );
    }

    #[test]
    fn test_write_error_passes_other_errors_through() {
        let err = write_error(DbErr::Custom("connection reset".into()));
        assert!(matches!(err, UserError::Storage(_)));
    }

    #[test]
    fn test_db_id_bounds() {
        assert_eq!(db_id(1), Some(1));
        assert_eq!(db_id(u64::MAX), None);
    }
}
