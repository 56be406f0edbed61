use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

mod api;
mod config;
mod render_queue;
mod websocket;

use config::ServerConfig;

#[derive(Parser, Debug)]
#[command(name = "stepwise")]
#[command(about = "Workflow command log with undo, redo and render scheduling", long_about = None)]
struct Args {
    /// TOML file with storage, session and render queue settings
    #[arg(short, long, env = "STEPWISE_CONFIG", default_value = "stepwise.toml")]
    config: PathBuf,

    /// Directory holding the redb command store
    #[arg(short, long, env = "STEPWISE_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Port for the HTTP API and viewer websockets
    #[arg(short, long, env = "STEPWISE_PORT", default_value = "8080")]
    port: u16,

    #[arg(long, env = "STEPWISE_HOST", default_value = "127.0.0.1")]
    host: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "stepwise_server=info,stepwise_core=info,tower_http=debug".into()
            }),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    let args = Args::parse();

    tracing::info!("Starting Stepwise");

    let config = ServerConfig::load(&args.config, args.data_dir)?;
    tracing::info!("Command store: {}", config.store_path().display());

    let addr = format!("{}:{}", args.host, args.port);
    api::serve(&addr, config).await?;

    Ok(())
}
