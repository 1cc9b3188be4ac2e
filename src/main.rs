use dotenvy::dotenv;
use tracing::info;

mod config;
mod error;
mod handlers;
mod llm;
mod models;
mod server;
mod state;
mod utils;

use config::Config;
use utils::logging::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let config = Config::load()?;
    let _guards = init_logging(&config);

    info!(
        "Starting CineMatch backend (model={}, tmdb={})",
        config.gemini_model, config.tmdb_base_url
    );
    if config.gemini_api_key.trim().is_empty() {
        info!("GEMINI_API_KEY not set; analysis requests must carry their own apiKey");
    }

    server::run_server(config).await
}
