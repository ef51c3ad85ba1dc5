use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::network::Server;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "5555")]
    port: u16,

    /// Idle time in milliseconds before a session is pinged
    #[arg(long, default_value = "1000")]
    recv_timeout_ms: u64,

    /// Limit in milliseconds for any single send to a client
    #[arg(long, default_value = "1000")]
    send_timeout_ms: u64,

    /// Number of balls in the world
    #[arg(short, long, default_value = "10")]
    items: usize,

    /// Seed for reproducible spawn positions
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = ServerConfig {
        addr: format!("{}:{}", args.host, args.port),
        recv_timeout: Duration::from_millis(args.recv_timeout_ms),
        send_timeout: Duration::from_millis(args.send_timeout_ms),
        item_count: args.items,
        seed: args.seed,
    };
    info!(
        "Starting server with {} balls, ping after {:?} idle",
        config.item_count, config.recv_timeout
    );

    let server = Server::bind(config).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down gracefully...");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
                // Dropping the sender would stop the server, so keep it alive.
                std::future::pending::<()>().await;
            }
        }
    });

    server.run(shutdown_rx).await;

    Ok(())
}
