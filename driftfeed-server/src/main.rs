//! driftfeed-server - personalized feed microservice
//!
//! Serves cursor-paginated, relevance-ranked content pages with per-visitor
//! deduplication, records view history and interest events, and migrates
//! session history to authenticated users.

use anyhow::Result;
use clap::Parser;
use driftfeed_common::db::init_database;
use driftfeed_common::params::FeedParams;
use driftfeed_server::{build_router, config, AppState};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "driftfeed-server", version, about = "Personalized feed service")]
struct Args {
    /// Database file path
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Bind address (host:port)
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting driftfeed-server v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let config = config::resolve(args.db_path.as_deref(), args.bind.as_deref());
    info!("Database path: {}", config.db_path.display());

    let pool = init_database(&config.db_path).await?;
    let params = FeedParams::load(&pool).await?;
    info!(
        "Feed parameters: page_size={} diversity_interval={} profile_window_days={}",
        params.page_size, params.diversity_interval, params.profile_window_days
    );

    let state = AppState::new(pool, params);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!("driftfeed-server listening on http://{}", config.bind);
    info!("Health check: http://{}/health", config.bind);

    axum::serve(listener, app).await?;

    Ok(())
}
