use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tokio::signal;

use minter::configure::load_config;
use minter::counter::RestCounterClient;
use minter::gateway::{create_app, AppState};
use minter::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(author, version, about = "Sequential case identifier minting service", long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long)]
    listen: Option<String>,

    /// Base URL of the atomic counter store
    #[arg(long)]
    counter_url: Option<String>,

    /// CORS allow-list origin
    #[arg(long)]
    allowed_origin: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let args = Args::parse();
    let mut config = load_config().context("Failed to load config")?;
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    if let Some(counter_url) = args.counter_url {
        config.counter_url = counter_url;
    }
    if let Some(allowed_origin) = args.allowed_origin {
        config.allowed_origin = Some(allowed_origin);
    }

    setup_logger(&config)?;

    let store = RestCounterClient::new(&config.counter_url, config.counter_token.clone())
        .context("Failed to build counter client")?;
    let state = Arc::new(AppState {
        allowed_origin: config.allowed_origin.clone(),
        store: Arc::new(store),
    });

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;

    log::info!("Case ID service listening on {}", config.listen_addr);
    log::info!("Counter store: {}", config.counter_url);

    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Service shut down");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => log::info!("Received Ctrl+C signal"),
        () = terminate => log::info!("Received SIGTERM signal"),
    }
}
