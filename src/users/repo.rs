use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use super::repo_types::{DeletedUser, NewUser, User, UserChanges};

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    #[error("no matching row")]
    NotFound,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;

impl From<sqlx::Error> for RepoError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                RepoError::Conflict(db_err.constraint().unwrap_or("unique").to_string())
            }
            other => RepoError::Other(other.into()),
        }
    }
}

/// Statement-level access to the users table. Every method is a single statement.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn count(&self) -> RepoResult<i64>;

    /// Page of users ordered by id ascending.
    async fn list(&self, limit: i64, offset: i64) -> RepoResult<Vec<User>>;

    async fn find(&self, id: i32) -> RepoResult<User>;

    async fn insert(&self, user: NewUser) -> RepoResult<User>;

    /// Overwrites supplied fields only; fails with `NotFound` when no row has `id`.
    async fn update(&self, id: i32, changes: UserChanges) -> RepoResult<User>;

    async fn delete(&self, id: i32) -> RepoResult<DeletedUser>;
}

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn count(&self) -> RepoResult<i64> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await?;
        Ok(total)
    }

    async fn list(&self, limit: i64, offset: i64) -> RepoResult<Vec<User>> {
        let rows = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, phone, address, country, created_at
            FROM users
            ORDER BY id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn find(&self, id: i32) -> RepoResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, phone, address, country, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        user.ok_or(RepoError::NotFound)
    }

    async fn insert(&self, user: NewUser) -> RepoResult<User> {
        let row = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, phone, address, country, password)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, email, phone, address, country, created_at
            "#,
        )
        .bind(user.name)
        .bind(user.email)
        .bind(user.phone)
        .bind(user.address)
        .bind(user.country)
        .bind(user.password_hash)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn update(&self, id: i32, changes: UserChanges) -> RepoResult<User> {
        let row = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = COALESCE($1, name),
                email = COALESCE($2, email),
                phone = COALESCE($3, phone),
                address = COALESCE($4, address),
                country = COALESCE($5, country),
                password = COALESCE($6, password)
            WHERE id = $7
            RETURNING id, name, email, phone, address, country, created_at
            "#,
        )
        .bind(changes.name)
        .bind(changes.email)
        .bind(changes.phone)
        .bind(changes.address)
        .bind(changes.country)
        .bind(changes.password_hash)
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.ok_or(RepoError::NotFound)
    }

    async fn delete(&self, id: i32) -> RepoResult<DeletedUser> {
        let row = sqlx::query_as::<_, DeletedUser>(
            "DELETE FROM users WHERE id = $1 RETURNING id, name, email",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.ok_or(RepoError::NotFound)
    }
}
