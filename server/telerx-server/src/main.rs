use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use payment_links::{ExpirySweeper, PaymentTransactionStore};
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};

use telerx_server::{create_app, ServerConfig, TelerxServer};

/// TeleRx Engine HTTP Server
#[derive(Parser, Debug)]
#[command(name = "telerx-server")]
#[command(about = "Telehealth prescription fulfillment and payment API server")]
struct Args {
    /// Server bind address
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Server port
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    init_tracing(args.verbose);

    info!("Starting TeleRx Engine HTTP Server");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env()?;

    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!()
        .run(&db_pool)
        .await
        .context("Failed to run database migrations")?;

    let sweep_interval = Duration::from_secs(config.sweep_interval_secs);
    let server = TelerxServer::new_with_pool(config, db_pool)?;

    spawn_expiry_sweeper(server.transactions.clone(), sweep_interval);

    let app = create_app(server);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", args.host, args.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!("TeleRx Engine server running on http://{addr}");
    info!("Health check available at: http://{addr}/health");
    info!("API v1 available at: http://{addr}/api/v1");

    axum::serve(listener, app).await.context("HTTP server error")?;

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "telerx_server=debug,tower_http=debug,sqlx=info"
    } else {
        "telerx_server=info,tower_http=info,sqlx=warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();
}

/// Deletes expired pending payment links on a fixed cadence.
///
/// Expiry also holds without the sweeper (reads re-check `expires_at`), so a
/// failed pass is logged and retried on the next tick rather than crashing
/// the server.
fn spawn_expiry_sweeper(transactions: Arc<dyn PaymentTransactionStore>, interval: Duration) {
    tokio::spawn(async move {
        let sweeper = ExpirySweeper::new(transactions);
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match sweeper.run_once(chrono::Utc::now()).await {
                Ok(0) => {}
                Ok(swept) => info!(swept, "expired payment links removed"),
                Err(e) => error!("expiry sweep failed: {e}"),
            }
        }
    });
}
