use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::dto::{Credentials, LoginResponse, SignupResponse},
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<SignupResponse>, AppError> {
    let Json(creds) = payload?;
    if let Err(e) = creds.validate() {
        warn!(reason = %e, "signup validation failed");
        return Err(e);
    }

    let user = state.auth.signup(&creds.email, &creds.password).await?;

    Ok(Json(SignupResponse {
        message: "signup success",
        user: user.into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(creds) = payload?;
    if let Err(e) = creds.validate() {
        warn!(reason = %e, "login validation failed");
        return Err(AppError::Validation("invalid email or password".into()));
    }

    let user = state.auth.login(&creds.email, &creds.password).await?;

    let token = state.tokens.issue(user.id).map_err(|e| {
        error!(error = %e, user_id = user.id, "jwt sign failed");
        AppError::Internal(e.into())
    })?;

    info!(user_id = user.id, "login success");
    Ok(Json(LoginResponse {
        message: "login success",
        token,
        user: user.into(),
    }))
}
