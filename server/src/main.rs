mod config;
mod error;
mod voting;
mod web;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("approval_polls=debug,warp=info")),
        )
        .init();

    let config = config::Config::load()?;
    web::setup(config).await
}
