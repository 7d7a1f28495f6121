use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::{
    error::AppError,
    todos::{repo::TodoStore, repo_types::Todo},
};

pub const TITLE_MAX_CHARS: usize = 100;

pub(crate) fn validate_title(title: &str) -> Result<(), AppError> {
    if !(1..=TITLE_MAX_CHARS).contains(&title.chars().count()) {
        return Err(AppError::Validation(format!(
            "title is required and must be 1-{TITLE_MAX_CHARS} characters"
        )));
    }
    Ok(())
}

/// Todo CRUD for a single authenticated owner.
///
/// A todo owned by someone else is reported as `NotFound`, exactly like an
/// id that does not exist.
#[derive(Clone)]
pub struct TodoService {
    store: Arc<dyn TodoStore>,
}

impl TodoService {
    pub fn new(store: Arc<dyn TodoStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, owner: i64) -> Result<Vec<Todo>, AppError> {
        let todos = self.store.list_by_owner(owner).await?;
        info!(count = todos.len(), "get todos success");
        Ok(todos)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, owner: i64, id: i64) -> Result<Todo, AppError> {
        self.store.find(owner, id).await?.ok_or_else(|| {
            warn!("todo not found");
            AppError::NotFound
        })
    }

    #[instrument(skip(self, title))]
    pub async fn create(&self, owner: i64, title: &str) -> Result<Todo, AppError> {
        validate_title(title)?;
        let todo = self.store.insert(owner, title).await?;
        info!(todo_id = todo.id, "create todo success");
        Ok(todo)
    }

    /// Replaces both title and done; there are no partial updates.
    #[instrument(skip(self, title))]
    pub async fn update(
        &self,
        owner: i64,
        id: i64,
        title: &str,
        done: bool,
    ) -> Result<Todo, AppError> {
        validate_title(title)?;
        self.get(owner, id).await?;

        // the row may have been deleted since the lookup
        let todo = self
            .store
            .update(owner, id, title, done)
            .await?
            .ok_or(AppError::NotFound)?;
        info!("update todo success");
        Ok(todo)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, owner: i64, id: i64) -> Result<(), AppError> {
        if !self.store.delete(owner, id).await? {
            warn!("todo not found");
            return Err(AppError::NotFound);
        }
        info!("delete todo success");
        Ok(())
    }
}
