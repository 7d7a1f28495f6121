mod app;
mod auth;
mod clock;
mod config;
mod db;
mod error;
mod state;
mod todos;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_tracing();

    let app_state = AppState::init().await?;
    let addr = app_state.config.bind_addr()?;

    let app = app::build_app(app_state);
    app::serve(app, addr).await
}

/// Plain text by default, one JSON object per line with `LOG_FORMAT=json`.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "todo_service=debug,axum=info,tower_http=info".into());
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => subscriber.with_target(false).json().init(),
        _ => subscriber.init(),
    }
}
