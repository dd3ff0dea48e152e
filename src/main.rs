use std::sync::Arc;

use anyhow::Context;
use theater::{
    AppState,
    config::Config,
    db::Db,
    routes,
    seeder::{CsvSeeder, SeedOutcome},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,theater=debug,sqlx=warn".to_string()),
        )
        .init();

    let config = Config::from_env()?;

    let db = Db::connect(&config.database_url, config.db_max_connections)
        .await
        .context("connecting to database")?;

    if let Some(path) = &config.movies_csv_path {
        match CsvSeeder::new(path).seed_if_empty(&db).await? {
            SeedOutcome::AlreadyPopulated => tracing::info!("movies table already populated"),
            SeedOutcome::Inserted(count) => tracing::info!(count, "movies table seeded"),
        }
    }

    let state = Arc::new(AppState { db: db.clone() });

    let app = routes::router(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    db.close().await?;
    tracing::info!("shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            },
            Err(err) => {
                tracing::warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
