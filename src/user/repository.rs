//! Handle persistence-store requests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use tokio::sync::RwLock;

use crate::user::{NewUser, OwnedContent, User, UserStatus};

const USER_COLUMNS: &str =
    "id, names, surnames, email, password, reset_password, role, status, created_at";

/// Errors surfaced by a [`UserStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Uniqueness constraint on `email` was violated.
    #[error("email already registered")]
    DuplicateEmail,
    #[error("user not found")]
    NotFound,
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
}

/// Persistence boundary for [`User`] records and their ownership index.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user. The store assigns `id` and `created_at`; the
    /// record starts in [`UserStatus::Pending`] with `reset_password`
    /// cleared.
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn list(&self) -> Result<Vec<User>, StoreError>;

    /// Overwrite the mutable fields (`names`, `surnames`, `email`, `role`).
    async fn update(&self, user: &User) -> Result<(), StoreError>;

    /// Unconditionally overwrite `status`.
    async fn set_status(&self, id: i32, status: UserStatus) -> Result<(), StoreError>;

    /// Replace the stored password hash and overwrite the reset flag.
    async fn set_password(
        &self,
        id: i32,
        hash: &str,
        reset_password: bool,
    ) -> Result<(), StoreError>;

    async fn set_reset_flag(&self, id: i32, flag: bool) -> Result<(), StoreError>;

    /// Hard delete. Owned articles and comments follow the store cascade.
    async fn delete(&self, id: i32) -> Result<(), StoreError>;

    /// Ids of the articles and comments owned by a user.
    async fn owned_content(&self, id: i32) -> Result<OwnedContent, StoreError>;
}

/// PostgreSQL-backed [`UserStore`].
#[derive(Clone)]
pub struct PgUserStore {
    pool: Pool<Postgres>,
}

impl PgUserStore {
    /// Create a new [`PgUserStore`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn map_sql(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db) = err {
        if db.is_unique_violation() {
            return StoreError::DuplicateEmail;
        }
    }
    StoreError::Sql(err)
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let query = format!(
            "INSERT INTO users (names, surnames, email, password, role, status, reset_password)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<_, User>(&query)
            .bind(&user.names)
            .bind(&user.surnames)
            .bind(&user.email)
            .bind(&user.password)
            .bind(user.role)
            .bind(UserStatus::Pending)
            .bind(false)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sql)
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");

        Ok(sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");

        Ok(sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id");

        Ok(sqlx::query_as::<_, User>(&query)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE users SET names = $1, surnames = $2, email = $3, role = $4 WHERE id = $5",
        )
        .bind(&user.names)
        .bind(&user.surnames)
        .bind(&user.email)
        .bind(user.role)
        .bind(user.id)
        .execute(&self.pool)
        .await
        .map_err(map_sql)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn set_status(&self, id: i32, status: UserStatus) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET status = $1 WHERE id = $2")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn set_password(
        &self,
        id: i32,
        hash: &str,
        reset_password: bool,
    ) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE users SET password = $1, reset_password = $2 WHERE id = $3")
                .bind(hash)
                .bind(reset_password)
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn set_reset_flag(&self, id: i32, flag: bool) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET reset_password = $1 WHERE id = $2")
            .bind(flag)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: i32) -> Result<(), StoreError> {
        // Articles and comments are removed by `ON DELETE CASCADE`.
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn owned_content(&self, id: i32) -> Result<OwnedContent, StoreError> {
        let article_ids =
            sqlx::query_scalar::<_, i32>("SELECT id FROM articles WHERE user_id = $1 ORDER BY id")
                .bind(id)
                .fetch_all(&self.pool)
                .await?;
        let comment_ids =
            sqlx::query_scalar::<_, i32>("SELECT id FROM comments WHERE user_id = $1 ORDER BY id")
                .bind(id)
                .fetch_all(&self.pool)
                .await?;

        Ok(OwnedContent {
            article_ids,
            comment_ids,
        })
    }
}

/// In-memory [`UserStore`] used by tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryUserStore {
    inner: Arc<RwLock<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    users: HashMap<i32, User>,
    articles: HashMap<i32, Vec<i32>>,
    comments: HashMap<i32, Vec<i32>>,
    next_id: i32,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an article id to a user's ownership index.
    pub async fn add_article(&self, user_id: i32, article_id: i32) {
        let mut inner = self.inner.write().await;
        inner.articles.entry(user_id).or_default().push(article_id);
    }

    /// Attach a comment id to a user's ownership index.
    pub async fn add_comment(&self, user_id: i32, comment_id: i32) {
        let mut inner = self.inner.write().await;
        inner.comments.entry(user_id).or_default().push(comment_id);
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;

        let duplicate = inner
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email));
        if duplicate {
            return Err(StoreError::DuplicateEmail);
        }

        inner.next_id += 1;
        let user = User {
            id: inner.next_id,
            names: user.names,
            surnames: user.surnames,
            email: user.email,
            password: user.password,
            reset_password: false,
            role: user.role,
            status: UserStatus::Pending,
            created_at: chrono::Utc::now(),
        };
        inner.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let inner = self.inner.read().await;
        let mut users: Vec<User> = inner.users.values().cloned().collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;

        let duplicate = inner
            .users
            .values()
            .any(|u| u.id != user.id && u.email.eq_ignore_ascii_case(&user.email));
        if duplicate {
            return Err(StoreError::DuplicateEmail);
        }

        let stored = inner.users.get_mut(&user.id).ok_or(StoreError::NotFound)?;
        stored.names = user.names.clone();
        stored.surnames = user.surnames.clone();
        stored.email = user.email.clone();
        stored.role = user.role;
        Ok(())
    }

    async fn set_status(&self, id: i32, status: UserStatus) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let stored = inner.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        stored.status = status;
        Ok(())
    }

    async fn set_password(
        &self,
        id: i32,
        hash: &str,
        reset_password: bool,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let stored = inner.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        stored.password = hash.to_owned();
        stored.reset_password = reset_password;
        Ok(())
    }

    async fn set_reset_flag(&self, id: i32, flag: bool) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let stored = inner.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        stored.reset_password = flag;
        Ok(())
    }

    async fn delete(&self, id: i32) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.users.remove(&id).is_none() {
            return Err(StoreError::NotFound);
        }
        inner.articles.remove(&id);
        inner.comments.remove(&id);
        Ok(())
    }

    async fn owned_content(&self, id: i32) -> Result<OwnedContent, StoreError> {
        let inner = self.inner.read().await;
        Ok(OwnedContent {
            article_ids: inner.articles.get(&id).cloned().unwrap_or_default(),
            comment_ids: inner.comments.get(&id).cloned().unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            names: "Ada".into(),
            surnames: "Lovelace".into(),
            email: email.into(),
            password: "$argon2id$fake".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_assigns_id_and_pending_status() {
        let store = MemoryUserStore::new();
        let user = store.create(new_user("ada@example.com")).await.unwrap();

        assert_eq!(user.status, UserStatus::Pending);
        assert!(!user.reset_password);
        assert!(user.id > 0);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_email() {
        let store = MemoryUserStore::new();
        store.create(new_user("ada@example.com")).await.unwrap();

        let err = store
            .create(new_user("Ada@Example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
    }

    #[tokio::test]
    async fn update_rejects_email_held_by_another_user() {
        let store = MemoryUserStore::new();
        store.create(new_user("ada@example.com")).await.unwrap();
        let mut other =
            store.create(new_user("grace@example.com")).await.unwrap();

        other.email = "Ada@Example.com".into();
        let err = store.update(&other).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));

        // The record keeps its own email.
        other.email = "grace@example.com".into();
        store.update(&other).await.unwrap();
    }

    #[tokio::test]
    async fn update_unknown_user_is_not_found() {
        let store = MemoryUserStore::new();
        let ghost = User {
            id: 999,
            ..Default::default()
        };

        let err = store.update(&ghost).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn delete_removes_ownership_index() {
        let store = MemoryUserStore::new();
        let user = store.create(new_user("ada@example.com")).await.unwrap();
        store.add_article(user.id, 7).await;
        store.add_comment(user.id, 3).await;

        let owned = store.owned_content(user.id).await.unwrap();
        assert_eq!(owned.article_ids, vec![7]);
        assert_eq!(owned.comment_ids, vec![3]);

        store.delete(user.id).await.unwrap();
        let owned = store.owned_content(user.id).await.unwrap();
        assert_eq!(owned, OwnedContent::default());

        let err = store.delete(user.id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }
}
