use anyhow::Result;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;

use chatpipe_local::{ClientConfig, LocalFetcher};
use chatpipe_server::build_router;

#[derive(Parser, Debug)]
#[command(name = "chatpipe")]
#[command(about = "Tool-dispatching chat backend (HTTP + SSE)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server.
    Serve(ServeCmd),
    /// Diagnose effective configuration (json; no secrets).
    Doctor,
    /// Print version info (json).
    Version,
}

#[derive(clap::Args, Debug)]
struct ServeCmd {
    /// Address to listen on.
    #[arg(long, env = "CHATPIPE_BIND", default_value = "127.0.0.1:8080")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(cmd) => serve(cmd).await,
        Commands::Doctor => doctor(),
        Commands::Version => version(),
    }
}

async fn serve(cmd: ServeCmd) -> Result<()> {
    let fetcher = LocalFetcher::new()?;
    let app = build_router(Arc::new(fetcher));

    let listener = tokio::net::TcpListener::bind(cmd.bind).await?;
    tracing::info!(addr = %cmd.bind, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

fn doctor() -> Result<()> {
    let report = serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "config": ClientConfig::from_env(),
        "notes": [
            "outbound calls are single-attempt; no retries or backoff",
            "fetched pages are never cached",
        ],
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn version() -> Result<()> {
    let v = serde_json::json!({
        "name": "chatpipe",
        "version": env!("CARGO_PKG_VERSION"),
    });
    println!("{}", serde_json::to_string_pretty(&v)?);
    Ok(())
}
