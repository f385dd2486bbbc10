//! In-memory `UserRepo` used by the handler tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::repo::{RepoError, RepoResult, UserRepo};
use super::repo_types::{DeletedUser, NewUser, User, UserChanges};

struct StoredUser {
    user: User,
    password_hash: String,
}

#[derive(Default)]
struct Table {
    next_id: i32,
    rows: BTreeMap<i32, StoredUser>,
}

impl Table {
    fn email_taken(&self, email: &str, except: Option<i32>) -> bool {
        self.rows
            .values()
            .any(|r| r.user.email == email && Some(r.user.id) != except)
    }
}

#[derive(Default)]
pub struct InMemoryUserRepo {
    table: RwLock<Table>,
    broken: AtomicBool,
}

impl InMemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail like a lost connection.
    pub fn break_connection(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    pub async fn password_hash(&self, id: i32) -> Option<String> {
        let table = self.table.read().await;
        table.rows.get(&id).map(|r| r.password_hash.clone())
    }

    fn check(&self) -> RepoResult<()> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(RepoError::Other(anyhow::anyhow!("connection refused")));
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepo for InMemoryUserRepo {
    async fn count(&self) -> RepoResult<i64> {
        self.check()?;
        Ok(self.table.read().await.rows.len() as i64)
    }

    async fn list(&self, limit: i64, offset: i64) -> RepoResult<Vec<User>> {
        self.check()?;
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|r| r.user.clone())
            .collect())
    }

    async fn find(&self, id: i32) -> RepoResult<User> {
        self.check()?;
        let table = self.table.read().await;
        table
            .rows
            .get(&id)
            .map(|r| r.user.clone())
            .ok_or(RepoError::NotFound)
    }

    async fn insert(&self, new: NewUser) -> RepoResult<User> {
        self.check()?;
        let mut table = self.table.write().await;
        if table.email_taken(&new.email, None) {
            return Err(RepoError::Conflict("users_email_key".into()));
        }
        table.next_id += 1;
        let user = User {
            id: table.next_id,
            name: new.name,
            email: new.email,
            phone: new.phone,
            address: new.address,
            country: new.country,
            created_at: OffsetDateTime::now_utc(),
        };
        table.rows.insert(
            user.id,
            StoredUser {
                user: user.clone(),
                password_hash: new.password_hash,
            },
        );
        Ok(user)
    }

    async fn update(&self, id: i32, changes: UserChanges) -> RepoResult<User> {
        self.check()?;
        let mut table = self.table.write().await;
        if !table.rows.contains_key(&id) {
            return Err(RepoError::NotFound);
        }
        if let Some(email) = &changes.email {
            if table.email_taken(email, Some(id)) {
                return Err(RepoError::Conflict("users_email_key".into()));
            }
        }
        let row = table.rows.get_mut(&id).ok_or(RepoError::NotFound)?;
        let u = &mut row.user;
        if let Some(v) = changes.name {
            u.name = v;
        }
        if let Some(v) = changes.email {
            u.email = v;
        }
        if changes.phone.is_some() {
            u.phone = changes.phone;
        }
        if changes.address.is_some() {
            u.address = changes.address;
        }
        if changes.country.is_some() {
            u.country = changes.country;
        }
        if let Some(v) = changes.password_hash {
            row.password_hash = v;
        }
        Ok(row.user.clone())
    }

    async fn delete(&self, id: i32) -> RepoResult<DeletedUser> {
        self.check()?;
        let mut table = self.table.write().await;
        let row = table.rows.remove(&id).ok_or(RepoError::NotFound)?;
        Ok(DeletedUser {
            id: row.user.id,
            name: row.user.name,
            email: row.user.email,
        })
    }
}
