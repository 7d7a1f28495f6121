use std::collections::BTreeMap;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::{db::StoreError, todos::repo_types::Todo};

/// Persistence port for todos. Every method is scoped by owner.
#[async_trait]
pub trait TodoStore: Send + Sync {
    async fn list_by_owner(&self, owner: i64) -> Result<Vec<Todo>, StoreError>;

    async fn find(&self, owner: i64, id: i64) -> Result<Option<Todo>, StoreError>;

    async fn insert(&self, owner: i64, title: &str) -> Result<Todo, StoreError>;

    /// `None` when no row matches both `id` and `owner`.
    async fn update(
        &self,
        owner: i64,
        id: i64,
        title: &str,
        done: bool,
    ) -> Result<Option<Todo>, StoreError>;

    /// `false` when no row matches both `id` and `owner`.
    async fn delete(&self, owner: i64, id: i64) -> Result<bool, StoreError>;
}

pub struct PgTodoStore {
    db: PgPool,
}

impl PgTodoStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TodoStore for PgTodoStore {
    async fn list_by_owner(&self, owner: i64) -> Result<Vec<Todo>, StoreError> {
        let rows = sqlx::query_as::<_, Todo>(
            r#"
            SELECT id, user_id, title, done, created_at, updated_at
            FROM todos
            WHERE user_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.db)
        .await
        .context("list todos by owner")?;
        Ok(rows)
    }

    async fn find(&self, owner: i64, id: i64) -> Result<Option<Todo>, StoreError> {
        let row = sqlx::query_as::<_, Todo>(
            r#"
            SELECT id, user_id, title, done, created_at, updated_at
            FROM todos
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.db)
        .await
        .context("select todo")?;
        Ok(row)
    }

    async fn insert(&self, owner: i64, title: &str) -> Result<Todo, StoreError> {
        let row = sqlx::query_as::<_, Todo>(
            r#"
            INSERT INTO todos (user_id, title, done)
            VALUES ($1, $2, FALSE)
            RETURNING id, user_id, title, done, created_at, updated_at
            "#,
        )
        .bind(owner)
        .bind(title)
        .fetch_one(&self.db)
        .await
        .context("insert todo")?;
        Ok(row)
    }

    async fn update(
        &self,
        owner: i64,
        id: i64,
        title: &str,
        done: bool,
    ) -> Result<Option<Todo>, StoreError> {
        let row = sqlx::query_as::<_, Todo>(
            r#"
            UPDATE todos
               SET title = $3, done = $4, updated_at = now()
             WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, title, done, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(title)
        .bind(done)
        .fetch_optional(&self.db)
        .await
        .context("update todo")?;
        Ok(row)
    }

    async fn delete(&self, owner: i64, id: i64) -> Result<bool, StoreError> {
        let res = sqlx::query(r#"DELETE FROM todos WHERE id = $1 AND user_id = $2"#)
            .bind(id)
            .bind(owner)
            .execute(&self.db)
            .await
            .context("delete todo")?;
        Ok(res.rows_affected() > 0)
    }
}

#[derive(Default)]
struct TodoTable {
    last_id: i64,
    rows: BTreeMap<i64, Todo>,
}

/// Process-local todo table, used by tests and `DATABASE_URL=memory`.
#[derive(Default)]
pub struct InMemoryTodoStore {
    table: RwLock<TodoTable>,
}

impl InMemoryTodoStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TodoStore for InMemoryTodoStore {
    async fn list_by_owner(&self, owner: i64) -> Result<Vec<Todo>, StoreError> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .filter(|t| t.user_id == owner)
            .cloned()
            .collect())
    }

    async fn find(&self, owner: i64, id: i64) -> Result<Option<Todo>, StoreError> {
        let table = self.table.read().await;
        Ok(table.rows.get(&id).filter(|t| t.user_id == owner).cloned())
    }

    async fn insert(&self, owner: i64, title: &str) -> Result<Todo, StoreError> {
        let mut table = self.table.write().await;
        table.last_id += 1;
        let now = OffsetDateTime::now_utc();
        let todo = Todo {
            id: table.last_id,
            user_id: owner,
            title: title.to_string(),
            done: false,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(todo.id, todo.clone());
        Ok(todo)
    }

    async fn update(
        &self,
        owner: i64,
        id: i64,
        title: &str,
        done: bool,
    ) -> Result<Option<Todo>, StoreError> {
        let mut table = self.table.write().await;
        let Some(todo) = table.rows.get_mut(&id).filter(|t| t.user_id == owner) else {
            return Ok(None);
        };
        todo.title = title.to_string();
        todo.done = done;
        todo.updated_at = OffsetDateTime::now_utc();
        Ok(Some(todo.clone()))
    }

    async fn delete(&self, owner: i64, id: i64) -> Result<bool, StoreError> {
        let mut table = self.table.write().await;
        let owned = table.rows.get(&id).is_some_and(|t| t.user_id == owner);
        if owned {
            table.rows.remove(&id);
        }
        Ok(owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_store_never_crosses_owners() {
        let store = InMemoryTodoStore::new();
        let mine = store.insert(1, "mine").await.unwrap();
        store.insert(2, "theirs").await.unwrap();

        assert_eq!(store.list_by_owner(1).await.unwrap(), vec![mine.clone()]);
        assert!(store.find(2, mine.id).await.unwrap().is_none());
        assert!(store.update(2, mine.id, "hijack", true).await.unwrap().is_none());
        assert!(!store.delete(2, mine.id).await.unwrap());

        let still_mine = store.find(1, mine.id).await.unwrap().unwrap();
        assert_eq!(still_mine.title, "mine");
        assert!(!still_mine.done);
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_delete() {
        let store = InMemoryTodoStore::new();
        let first = store.insert(1, "a").await.unwrap();
        assert!(store.delete(1, first.id).await.unwrap());
        let second = store.insert(1, "b").await.unwrap();
        assert!(second.id > first.id);
    }
}
