use serde::{Deserialize, Serialize};

/// Owner comes from the token; any `user_id` in the body is ignored.
#[derive(Debug, Deserialize)]
pub struct CreateTodoRequest {
    pub title: String,
}

/// Full replacement, both fields required.
#[derive(Debug, Deserialize)]
pub struct UpdateTodoRequest {
    pub title: String,
    pub done: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
