use std::path::PathBuf;

use clap::Parser;

use xo_server::ServerConfig;
use xo_store::Database;
use xo_telemetry::{data_dir, init_telemetry, TelemetryConfig};

/// Tic-tac-toe coordination server.
#[derive(Parser, Debug)]
#[command(name = "xo", version, about)]
struct Cli {
    /// Port to listen on.
    #[arg(long, default_value_t = 9090)]
    port: u16,

    /// Path to the games database. Defaults to ~/.xo/games.db.
    #[arg(long)]
    database: Option<PathBuf>,

    /// Emit JSON-formatted log lines.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let _telemetry = init_telemetry(TelemetryConfig {
        json_logs: cli.json_logs,
        ..Default::default()
    });

    tracing::info!("starting xo server");

    let db_path = cli.database.unwrap_or_else(|| data_dir().join("games.db"));
    let db = Database::open(&db_path).expect("failed to open database");

    let config = ServerConfig {
        port: cli.port,
        ..Default::default()
    };
    let handle = xo_server::start(config, db)
        .await
        .expect("failed to start server");

    tracing::info!(port = handle.port, "xo server ready");

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for ctrl+c");

    tracing::info!("shutting down");
}
