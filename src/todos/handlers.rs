use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::{header, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::dto::{CreateTodoRequest, MessageResponse, UpdateTodoRequest};
use crate::{
    auth::extractors::AuthUser, error::AppError, state::AppState, todos::repo_types::Todo,
};

pub fn todo_routes() -> Router<AppState> {
    Router::new()
        .route("/todos", get(list_todos).post(create_todo))
        .route(
            "/todos/:id",
            get(get_todo).put(update_todo).delete(delete_todo),
        )
}

#[instrument(skip(state))]
pub async fn list_todos(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Todo>>, AppError> {
    Ok(Json(state.todos.list(user_id).await?))
}

#[instrument(skip(state, id))]
pub async fn get_todo(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Todo>, AppError> {
    let Path(id) = id?;
    Ok(Json(state.todos.get(user_id, id).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_todo(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<CreateTodoRequest>, JsonRejection>,
) -> Result<(StatusCode, [(header::HeaderName, String); 1], Json<Todo>), AppError> {
    let Json(body) = payload?;
    let todo = state.todos.create(user_id, &body.title).await?;
    let location = format!("/todos/{}", todo.id);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(todo)))
}

#[instrument(skip(state, id, payload))]
pub async fn update_todo(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateTodoRequest>, JsonRejection>,
) -> Result<Json<Todo>, AppError> {
    let Path(id) = id?;
    let Json(body) = payload?;
    Ok(Json(
        state
            .todos
            .update(user_id, id, &body.title, body.done)
            .await?,
    ))
}

#[instrument(skip(state, id))]
pub async fn delete_todo(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Path(id) = id?;
    state.todos.delete(user_id, id).await?;
    Ok(Json(MessageResponse { message: "deleted" }))
}
