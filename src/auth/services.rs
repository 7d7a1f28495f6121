use std::sync::Arc;

use lazy_static::lazy_static;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        password::{hash_password, verify_password},
        repo::UserStore,
        repo_types::User,
    },
    db::StoreError,
    error::AppError,
};

lazy_static! {
    // Verified against when the email is unknown, so both login failures cost one argon2 run.
    static ref DUMMY_HASH: String = hash_password("timing-equalizer").unwrap_or_default();
}

/// Signup and login over a credential store.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Creates a user. Email and password shape are validated by the caller.
    #[instrument(skip(self, password))]
    pub async fn signup(&self, email: &str, password: &str) -> Result<User, AppError> {
        if self.users.find_by_email(email).await?.is_some() {
            warn!("email already registered");
            return Err(AppError::DuplicateEmail);
        }

        let hash = hash_blocking(password.to_owned()).await?;

        match self.users.create(email, &hash).await {
            Ok(user) => {
                info!(user_id = user.id, "user registered");
                Ok(user)
            }
            // lost a race with a concurrent signup for the same email
            Err(StoreError::Conflict) => {
                warn!("email already registered");
                Err(AppError::DuplicateEmail)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Unknown email and wrong password both fail with `InvalidCredentials`.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AppError> {
        let Some(user) = self.users.find_by_email(email).await? else {
            verify_blocking(password.to_owned(), None).await?;
            warn!("login unknown email");
            return Err(AppError::InvalidCredentials);
        };

        if !verify_blocking(password.to_owned(), Some(user.password_hash.clone())).await? {
            warn!(user_id = user.id, "login invalid password");
            return Err(AppError::InvalidCredentials);
        }

        info!(user_id = user.id, "user logged in");
        Ok(user)
    }
}

async fn hash_blocking(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(anyhow::Error::new(e).context("hash task panicked")))?
        .map_err(|e| AppError::Internal(e.into()))
}

/// `None` checks against the dummy digest and always reports a mismatch.
async fn verify_blocking(password: String, hash: Option<String>) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || match hash {
        Some(hash) => verify_password(&password, &hash),
        None => {
            verify_password(&password, &DUMMY_HASH);
            false
        }
    })
    .await
    .map_err(|e| AppError::Internal(anyhow::Error::new(e).context("verify task panicked")))
}
