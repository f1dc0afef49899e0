use std::env;

use anyhow::Result;
use commute_api::build_app;
use commute_observability::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("commute_api");

    let bind = env::var("COMMUTE_BIND").unwrap_or_else(|_| "0.0.0.0:5001".to_string());

    let app = build_app()?;

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(bind = %bind, "commute nlu api started");

    axum::serve(listener, app).await?;
    Ok(())
}
