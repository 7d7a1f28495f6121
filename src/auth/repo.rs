use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::{auth::repo_types::User, db::StoreError};

/// Persistence port for user credentials.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Exact, case-sensitive lookup.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Inserts a new user. `StoreError::Conflict` if the email is taken.
    async fn create(&self, email: &str, password_hash: &str) -> Result<User, StoreError>;
}

pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("select user by email")?;
        Ok(user)
    }

    async fn create(&self, email: &str, password_hash: &str) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash)
            VALUES ($1, $2)
            RETURNING id, email, password_hash, created_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }
}

/// Process-local user table, used by tests and `DATABASE_URL=memory`.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<Vec<User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn count(&self) -> usize {
        self.users.read().await.len()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn create(&self, email: &str, password_hash: &str) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == email) {
            return Err(StoreError::Conflict);
        }
        let user = User {
            id: users.len() as i64 + 1,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(user.clone());
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_store_assigns_ids_and_enforces_unique_email() {
        let store = InMemoryUserStore::new();
        let a = store.create("a@x.com", "h1").await.unwrap();
        let b = store.create("b@x.com", "h2").await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));

        let dup = store.create("a@x.com", "h3").await;
        assert!(matches!(dup, Err(StoreError::Conflict)));
        assert_eq!(store.count().await, 2);
    }

    #[tokio::test]
    async fn in_memory_lookup_is_case_sensitive() {
        let store = InMemoryUserStore::new();
        store.create("a@x.com", "h").await.unwrap();
        assert!(store.find_by_email("a@x.com").await.unwrap().is_some());
        assert!(store.find_by_email("A@X.com").await.unwrap().is_none());
    }
}
