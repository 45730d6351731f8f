use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::network::Server;
use std::time::Duration;

// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Lifecycle tick interval in milliseconds
    #[clap(short, long, default_value = "1000", value_parser = clap::value_parser!(u64).range(1..))]
    tick_ms: u64,
    /// Seconds a disconnected player has before resigning
    #[clap(long, default_value = "60")]
    disconnect_grace: u64,
    /// Seconds a new game waits for its first player
    #[clap(long, default_value = "600")]
    join_timeout: u64,
    /// Hours after which a game is swept regardless of state
    #[clap(long, default_value = "24")]
    stale_hours: u64,
    /// Seconds between stale-game sweeps
    #[clap(long, default_value = "3600", value_parser = clap::value_parser!(u64).range(1..))]
    sweep_interval: u64,
    /// Maximum number of attached game streams
    #[clap(short, long, default_value = "256")]
    max_connections: usize,
}

/// Main-method of the application.
/// Parses command-line arguments, then runs the server until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Parse command line arguments
    let args = Args::parse();

    let config = ServerConfig {
        addr: format!("{}:{}", args.host, args.port),
        tick_interval: Duration::from_millis(args.tick_ms),
        disconnect_grace: Duration::from_secs(args.disconnect_grace),
        join_timeout: Duration::from_secs(args.join_timeout),
        stale_after: Duration::from_secs(args.stale_hours * 60 * 60),
        sweep_interval: Duration::from_secs(args.sweep_interval),
        max_connections: args.max_connections,
    };

    let server = Server::new(config).await?;
    let shutdown = server.shutdown_handle();
    let mut server_handle = tokio::spawn(server.run());

    // Handle shutdown gracefully
    tokio::select! {
        result = &mut server_handle => {
            match result {
                Ok(Err(e)) => error!("Server stopped: {}", e),
                Err(e) => error!("Server task panicked: {}", e),
                Ok(Ok(())) => {}
            }
            return Ok(());
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    shutdown.shutdown();
    server_handle.await??;

    Ok(())
}
