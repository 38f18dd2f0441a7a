use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use study_planner::api::router;
use study_planner::config::Config;
use study_planner::notify::ChangeHub;
use study_planner::session::SessionContext;
use study_planner::state::AppState;
use study_planner::store::Backend;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "study_planner=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let backend = Backend::connect(&config.backend).await?;
    let sessions = Arc::new(SessionContext::new(
        backend,
        ChangeHub::new(config.change_buffer),
    ));

    if let Some(session) = config.session.clone() {
        sessions.sign_in(session).await;
    }

    let app = router(AppState {
        sessions: sessions.clone(),
    });

    info!("listening on http://{}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sessions.sign_out().await;
    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {}", e);
    }
}
